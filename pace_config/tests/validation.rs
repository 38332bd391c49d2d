use pace_config::{load_file, load_toml};
use rstest::rstest;

fn rejects(toml: &str, needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error `{err}` does not mention `{needle}`"
    );
}

#[rstest]
#[case("[experiment]\nvessel_count = 0\n", "experiment.vessel_count")]
#[case("[experiment]\nvessel_count = 25\n", "experiment.vessel_count")]
#[case("[experiment]\nreader_plates = 0\n", "experiment.reader_plates")]
#[case("[experiment]\nturb_cycles_per_hour = 0\n", "experiment.turb_cycles_per_hour")]
#[case("[experiment]\nmax_transfer_vol_ul = 1200.0\n", "experiment.max_transfer_vol_ul")]
#[case("[experiment]\nread_sample_vol_ul = 600.0\n", "experiment.read_sample_vol_ul")]
#[case("[experiment]\nvessel_count = 8\ncontrol_vessels = [0, 8]\n", "experiment.control_vessels")]
#[case("[controller]\ntarget_od = 0.9\n", "min_od < target_od < max_od")]
#[case("[controller]\nmargin = -0.1\n", "controller.margin")]
#[case("[controller]\nod_slope = 0.0\n", "controller.od_slope")]
#[case("[schedule]\npoll_ms = 0\n", "schedule.poll_ms")]
#[case("[shaker]\nnormal_rpm = 59\n", "shaker.normal_rpm")]
#[case("[shaker]\nvortex_rpm = 3571\n", "shaker.vortex_rpm")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    rejects(toml, needle);
}

#[rstest]
fn accepts_full_document() {
    let toml = r#"
[experiment]
name = "180703_24_personal_turbs"
vessel_count = 24
reader_plates = 7
turb_vol_ul = 1000.0
turb_cycles_per_hour = 6
generation_time_s = 1800
read_sample_vol_ul = 100.0
max_transfer_vol_ul = 985.0
cycle_replace_vol_ul = 187.5

[controller]
target_od = 0.45
margin = 0.05

[schedule]
poll_ms = 200
sim_period_ms = 1000

[shaker]
normal_rpm = 400
vortex_rpm = 800
vortex_ms = 3500

[pumps]
program = "plink"
args = ["lbpumps", "-m", "{file}"]

[measurements]
path = "runs/measurements.jsonl"

[logging]
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.pumps.args[0], "lbpumps");
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[rstest]
fn unknown_shapes_fail_to_parse() {
    assert!(load_toml("[experiment]\nvessel_count = \"many\"\n").is_err());
}

#[rstest]
fn load_file_reports_path_on_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[experiment\n").unwrap();
    let err = load_file(&path).unwrap_err();
    assert!(format!("{err}").contains("bad.toml"));
}

#[rstest]
fn load_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    std::fs::write(&path, "[schedule]\nsim_period_ms = 0\n").unwrap();
    let err = load_file(&path).unwrap_err();
    assert!(format!("{err}").contains("schedule.sim_period_ms"));
}
