use log::LevelFilter;
use env_logger::{Builder, Target};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use chrono::Local;

/// Installs the global logger. With `log_file` set, lines are appended to
/// that file instead of stderr. `RUST_LOG` overrides the default Info level.
pub fn init(log_file: Option<&Path>) {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env();

    let mut file_error = None;
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => file_error = Some(e),
        }
    }

    builder.init();

    match (log_file, file_error) {
        (Some(path), Some(e)) => log::warn!("Could not open log file {:?}: {}. Logging to stderr.", path, e),
        (Some(path), None) => log::info!("Logger initialized, writing to {:?}.", path),
        _ => log::info!("Logger initialized."),
    }
}
