use cootbridge::engine::config::WorkerConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub fixture: Option<PathBuf>,
    pub worker: WorkerConfig,
}
