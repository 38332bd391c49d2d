#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions)]

mod cli;
mod error_fmt;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::RunOptions;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match real_main(cli) {
        Ok(()) => {}
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "exiting with error");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            std::process::exit(exit_code_for_error(&err));
        }
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = run::load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);

    match cli.cmd {
        Commands::Validate => {
            tracing::info!(config = %cli.config.display(), "config valid");
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "ok": true, "vessels": cfg.experiment.vessel_count })
                );
            } else {
                println!("config OK: {}", cli.config.display());
            }
            Ok(())
        }
        Commands::SelfCheck => {
            run::self_check(&cfg)?;
            println!("OK");
            Ok(())
        }
        Commands::Run {
            simulate,
            sim_deck,
            no_pumps,
            no_equilibrate,
            max_firings,
        } => {
            for line in log_banner(&format!("Begin execution of {}", cfg.experiment.name)) {
                tracing::info!("{line}");
            }
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = shutdown.clone();
                if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                    tracing::warn!(error = %e, "failed to install Ctrl-C handler");
                }
            }
            let opts = RunOptions {
                simulate,
                sim_deck,
                no_pumps,
                no_equilibrate,
                max_firings,
            };
            let summary = run::run(&cfg, opts, &shutdown)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "firings": summary.firings,
                        "reason": format!("{:?}", summary.reason),
                    })
                );
            } else {
                println!(
                    "run finished after {} firings ({:?})",
                    summary.firings, summary.reason
                );
            }
            Ok(())
        }
    }
}

/// Frame `text` in a box of `#` for the start of a log.
fn log_banner(text: &str) -> Vec<String> {
    const MARGIN: usize = 5;
    let width = text.chars().count() + 2 * MARGIN + 2;
    let pad = " ".repeat(MARGIN);
    vec![
        "#".repeat(width),
        format!("#{}#", " ".repeat(width - 2)),
        format!("#{pad}{text}{pad}#"),
        format!("#{}#", " ".repeat(width - 2)),
        "#".repeat(width),
    ]
}

fn init_tracing(json: bool, level: &str, logging: &pace_config::Logging) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.as_deref().unwrap_or(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "pace.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_frames_text() {
        let lines = log_banner("hi");
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.len() == 14));
        assert_eq!(lines[2], "#     hi     #");
    }
}
