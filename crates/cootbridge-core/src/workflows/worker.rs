use super::protocol::{Dispatcher, Reply, epoch_ms};
use crate::engine::config::WorkerConfig;
use crate::engine::context::WorkerContext;
use crate::engine::error::BridgeError;
use crate::engine::module::EngineLoader;
use crate::engine::router::CommandRouter;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

const WORKER_THREAD_NAME: &str = "cootbridge-worker";

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn the worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("The worker thread is no longer receiving messages")]
    Disconnected,

    #[error("The worker thread panicked")]
    Panicked,

    #[error("Worker registries are invalid: {0}")]
    Registry(#[source] BridgeError),
}

enum Envelope {
    Message { raw: String, received_at: f64 },
    Shutdown,
}

/// Host-side handle to a dedicated worker thread that owns the engine modules.
///
/// Messages are answered strictly in the order they were posted. A message posted while
/// another is executing waits in the channel; the worker never runs two at once.
pub struct Worker {
    requests: UnboundedSender<Envelope>,
    replies: UnboundedReceiver<Reply>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Validates the dispatch tables, then starts the worker thread, which loads every
    /// engine module before reading its first message.
    pub fn spawn(loader: Box<dyn EngineLoader>, config: WorkerConfig) -> Result<Self, WorkerError> {
        let router = CommandRouter::new().map_err(WorkerError::Registry)?;
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, replies) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                let ctx = WorkerContext::initialize(loader.as_ref(), config);
                Self::thread_loop(Dispatcher::new(router, ctx), request_rx, reply_tx);
            })?;

        Ok(Self {
            requests,
            replies,
            thread: Some(thread),
        })
    }

    /// Queues one JSON message for the worker.
    pub fn post(&self, raw: impl Into<String>) -> Result<(), WorkerError> {
        self.requests
            .send(Envelope::Message {
                raw: raw.into(),
                received_at: epoch_ms(),
            })
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Waits for the next reply. `None` once the worker has stopped and every reply was read.
    pub async fn recv(&mut self) -> Option<Reply> {
        self.replies.recv().await
    }

    /// Blocking variant of [`Worker::recv`] for callers outside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<Reply> {
        self.replies.blocking_recv()
    }

    /// Stops the worker after the messages already queued and waits for the thread to exit.
    pub fn shutdown(&mut self) -> Result<(), WorkerError> {
        let _ = self.requests.send(Envelope::Shutdown);
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }

    fn thread_loop(
        mut dispatcher: Dispatcher,
        mut requests: UnboundedReceiver<Envelope>,
        replies: UnboundedSender<Reply>,
    ) {
        info!(
            modules = ?dispatcher.context().availability(),
            "Worker ready"
        );
        while let Some(envelope) = requests.blocking_recv() {
            match envelope {
                Envelope::Shutdown => break,
                Envelope::Message { raw, received_at } => {
                    let reply = dispatcher.handle_raw(&raw, received_at);
                    if replies.send(reply).is_err() {
                        warn!("Reply receiver dropped; stopping worker");
                        break;
                    }
                }
            }
        }
        info!("Worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}
