#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate must reject bad documents without panicking.
    let Ok(cfg) = pace_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A config that validates must also build the deck layout and reader pool.
    let exp = pace_core::ExperimentParams::from(&cfg.experiment);
    let deck = pace_core::Deck::new(exp.vessel_count);
    let slots = pace_core::ReaderSlots::new(exp.reader_plates, exp.vessel_count);
    assert!(deck.is_ok() && slots.is_ok());
    let _ = pace_core::ScheduleParams::from(&cfg);
});
