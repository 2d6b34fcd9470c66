use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Maps `-v` repetitions to a level; `-q` keeps errors only so worker faults still surface.
fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber for a `cootbridge` run.
///
/// stdout belongs to the message protocol, so the console layer writes to stderr. Lines
/// carry the thread name, which tells host-side events apart from `cootbridge-worker` ones.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_thread_names(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(level_for(verbosity, quiet))
        .with(console);

    let installed = match log_file {
        Some(path) => {
            let sink = File::create(&path).map_err(CliError::Io)?;
            let transcript = fmt::layer()
                .with_writer(sink)
                .with_ansi(false)
                .with_thread_names(true)
                .with_target(true);
            registry.with(transcript).try_init()
        }
        None => registry.try_init(),
    };

    installed.map_err(|e| CliError::Other(anyhow::anyhow!("Could not install the logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use std::thread;
    use tracing::{debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn install_once() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("logger installs");
        });
    }

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(level_for(0, false), LevelFilter::WARN);
        assert_eq!(level_for(2, false), LevelFilter::DEBUG);
        assert_eq!(level_for(9, false), LevelFilter::TRACE);
        assert_eq!(level_for(3, true), LevelFilter::ERROR);
    }

    #[test]
    #[serial]
    fn worker_events_reach_the_installed_logger() {
        install_once();

        error!(message_id = 7, "Reply lost");
        warn!(module = "ccp4", "Module unavailable");
        info!("Worker started");
        debug!(command = "get_symmetry", "Calling engine operation");
        trace!("Released native handle");
    }

    #[test]
    #[serial]
    fn transcript_names_the_worker_thread() {
        let tmp = tempfile::tempdir().unwrap();
        let transcript_path = tmp.path().join("worker.log");

        let sink = File::create(&transcript_path).unwrap();
        let transcript = fmt::layer()
            .with_writer(sink)
            .with_ansi(false)
            .with_thread_names(true);
        let subscriber = tracing_subscriber::registry().with(transcript);

        thread::Builder::new()
            .name("cootbridge-worker".into())
            .spawn(move || {
                tracing::subscriber::with_default(subscriber, || {
                    debug!(operation = "read_pdb", "Calling engine operation");
                });
            })
            .unwrap()
            .join()
            .unwrap();

        let content = std::fs::read_to_string(transcript_path).unwrap();
        assert!(content.contains("Calling engine operation"));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("cootbridge-worker"));
    }

    #[test]
    #[serial]
    fn unwritable_transcript_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory cannot be opened as the transcript file.
        let result = setup_logging(0, false, Some(tmp.path().to_path_buf()));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
