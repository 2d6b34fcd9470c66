use crate::cli::ServeArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use cootbridge::engine::memory::{EngineFixture, MemoryEngineLoader};
use cootbridge::workflows::worker::Worker;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

pub async fn run(args: ServeArgs) -> Result<()> {
    info!("Building worker configuration...");
    let app = build_config(&args)?;

    let fixture = match &app.fixture {
        Some(path) => {
            info!("Loading engine fixture from {:?}", path);
            load_fixture(path)?
        }
        None => EngineFixture::default(),
    };

    let worker = Worker::spawn(
        Box::new(MemoryEngineLoader::with_fixture(fixture)),
        app.worker,
    )?;
    info!("Worker started; reading messages from standard input.");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let (worker, answered) = serve(worker, stdin, stdout).await?;
    info!("Input closed after {} message(s); stopping worker.", answered);

    stop(worker).await
}

pub fn load_fixture(path: &Path) -> Result<EngineFixture> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Forwards every non-blank input line to the worker and writes each reply as one line,
/// until the input ends and every posted message has been answered.
pub async fn serve<R, W>(mut worker: Worker, input: R, mut output: W) -> Result<(Worker, usize)>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut input_open = true;
    let mut pending = 0usize;
    let mut answered = 0usize;

    while input_open || pending > 0 {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        worker.post(line)?;
                        pending += 1;
                    }
                    None => input_open = false,
                }
            }
            reply = worker.recv(), if pending > 0 => {
                let reply = reply.ok_or(cootbridge::workflows::worker::WorkerError::Disconnected)?;
                let mut encoded = serde_json::to_string(&reply)?;
                encoded.push('\n');
                output.write_all(encoded.as_bytes()).await?;
                output.flush().await?;
                pending -= 1;
                answered += 1;
                debug!(pending, "Reply written");
            }
        }
    }
    Ok((worker, answered))
}

async fn stop(mut worker: Worker) -> Result<()> {
    tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .map_err(|e| CliError::Other(anyhow::anyhow!("Worker shutdown task failed: {}", e)))??;
    Ok(())
}
