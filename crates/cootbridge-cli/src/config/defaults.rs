use cootbridge::engine::config as core_config;

pub struct DefaultsConfig {
    pub map_sampling_rate: f64,
    pub show_timings: bool,
    pub fill_rotamer_tables: bool,
    pub backup_dir: String,
    pub staging_dir: String,
    pub bond_length_ceiling: f32,
    pub heap_journal: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            map_sampling_rate: core_config::DEFAULT_MAP_SAMPLING_RATE,
            show_timings: false,
            fill_rotamer_tables: true,
            backup_dir: core_config::DEFAULT_BACKUP_DIR.to_string(),
            staging_dir: core_config::DEFAULT_STAGING_DIR.to_string(),
            bond_length_ceiling: core_config::DEFAULT_BOND_LENGTH_CEILING,
            heap_journal: false,
        }
    }
}
