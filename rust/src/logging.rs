use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "roster_core.log";

static INIT: Once = Once::new();

/// Installs the global subscriber once per process: stderr plus an append-only file in `data_dir`.
///
/// Hosts that already installed their own subscriber keep it; we never panic over logging.
pub fn init_logging(data_dir: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let file_layer = match open_log_file(data_dir) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            ),
            Err(e) => {
                eprintln!("roster_core: file logging disabled: {e}");
                None
            }
        };

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .try_init();
    });
}

fn open_log_file(data_dir: &str) -> anyhow::Result<std::fs::File> {
    let dir = Path::new(data_dir);
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;
    Ok(file)
}
