use thiserror::Error;

pub const DEFAULT_MAP_SAMPLING_RATE: f64 = 1.7;
pub const DEFAULT_BACKUP_DIR: &str = "COOT_BACKUP";
pub const DEFAULT_STAGING_DIR: &str = ".";
pub const DEFAULT_BOND_LENGTH_CEILING: f32 = 5.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Fixed configuration applied to the engine once, when the worker starts.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub map_sampling_rate: f64,
    pub show_timings: bool,
    pub fill_rotamer_tables: bool,
    /// Private working directory created in the engine filesystem at startup.
    pub backup_dir: String,
    /// Directory staged payloads and scratch outputs are placed in.
    pub staging_dir: String,
    /// Oriented instances whose third size component reaches this value are dropped by the
    /// `instanced_mesh` preset.
    pub bond_length_ceiling: f32,
    pub heap_journal: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            map_sampling_rate: DEFAULT_MAP_SAMPLING_RATE,
            show_timings: false,
            fill_rotamer_tables: true,
            backup_dir: DEFAULT_BACKUP_DIR.to_string(),
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
            bond_length_ceiling: DEFAULT_BOND_LENGTH_CEILING,
            heap_journal: false,
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }
}

#[derive(Default)]
pub struct WorkerConfigBuilder {
    map_sampling_rate: Option<f64>,
    show_timings: Option<bool>,
    fill_rotamer_tables: Option<bool>,
    backup_dir: Option<String>,
    staging_dir: Option<String>,
    bond_length_ceiling: Option<f32>,
    heap_journal: Option<bool>,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_sampling_rate(mut self, rate: f64) -> Self {
        self.map_sampling_rate = Some(rate);
        self
    }

    pub fn show_timings(mut self, show: bool) -> Self {
        self.show_timings = Some(show);
        self
    }

    pub fn fill_rotamer_tables(mut self, fill: bool) -> Self {
        self.fill_rotamer_tables = Some(fill);
        self
    }

    pub fn backup_dir(mut self, dir: impl Into<String>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<String>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn bond_length_ceiling(mut self, ceiling: f32) -> Self {
        self.bond_length_ceiling = Some(ceiling);
        self
    }

    pub fn heap_journal(mut self, enabled: bool) -> Self {
        self.heap_journal = Some(enabled);
        self
    }

    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        let defaults = WorkerConfig::default();

        let map_sampling_rate = self.map_sampling_rate.unwrap_or(defaults.map_sampling_rate);
        if !(map_sampling_rate.is_finite() && map_sampling_rate > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "map_sampling_rate",
                reason: format!("must be a positive number, got {}", map_sampling_rate),
            });
        }

        let bond_length_ceiling = self
            .bond_length_ceiling
            .unwrap_or(defaults.bond_length_ceiling);
        if bond_length_ceiling.is_nan() || bond_length_ceiling <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "bond_length_ceiling",
                reason: format!("must be greater than zero, got {}", bond_length_ceiling),
            });
        }

        let backup_dir = self.backup_dir.unwrap_or(defaults.backup_dir);
        if backup_dir.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "backup_dir",
                reason: "must not be empty".to_string(),
            });
        }

        let staging_dir = self.staging_dir.unwrap_or(defaults.staging_dir);
        if staging_dir.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "staging_dir",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(WorkerConfig {
            map_sampling_rate,
            show_timings: self.show_timings.unwrap_or(defaults.show_timings),
            fill_rotamer_tables: self
                .fill_rotamer_tables
                .unwrap_or(defaults.fill_rotamer_tables),
            backup_dir,
            staging_dir,
            bond_length_ceiling,
            heap_journal: self.heap_journal.unwrap_or(defaults.heap_journal),
        })
    }
}
