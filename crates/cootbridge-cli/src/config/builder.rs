use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::ServeArgs;
use crate::error::{CliError, Result};
use cootbridge::engine::config as core_config;
use std::path::PathBuf;
use std::str::FromStr;

pub fn build_config(args: &ServeArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        let mut file_config = FileConfig::from_file(config_path)?;
        // A fixture named in a config file is relative to that file.
        if let (Some(fixture), Some(dir)) = (&file_config.fixture, config_path.parent()) {
            if fixture.is_relative() {
                file_config.fixture = Some(dir.join(fixture));
            }
        }
        file_config
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let engine_file = file_config.engine.take().unwrap_or_default();
    let staging_file = file_config.staging.take().unwrap_or_default();
    let geometry_file = file_config.geometry.take().unwrap_or_default();
    let diagnostics_file = file_config.diagnostics.take().unwrap_or_default();

    let map_sampling_rate = args
        .map_sampling_rate
        .or(engine_file.map_sampling_rate)
        .unwrap_or(defaults.map_sampling_rate);
    let bond_length_ceiling = args
        .bond_length_ceiling
        .or(geometry_file.bond_length_ceiling)
        .unwrap_or(defaults.bond_length_ceiling);
    let heap_journal = args.heap_journal
        || diagnostics_file
            .heap_journal
            .unwrap_or(defaults.heap_journal);

    let worker = core_config::WorkerConfigBuilder::new()
        .map_sampling_rate(map_sampling_rate)
        .show_timings(engine_file.show_timings.unwrap_or(defaults.show_timings))
        .fill_rotamer_tables(
            engine_file
                .fill_rotamer_tables
                .unwrap_or(defaults.fill_rotamer_tables),
        )
        .backup_dir(engine_file.backup_dir.unwrap_or(defaults.backup_dir))
        .staging_dir(staging_file.directory.unwrap_or(defaults.staging_dir))
        .bond_length_ceiling(bond_length_ceiling)
        .heap_journal(heap_journal)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        fixture: args.fixture.clone().or(file_config.fixture),
        worker,
    })
}

fn parse_value<T: FromStr>(key: &str, value_str: &str, expected: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            expected, key, value_str
        ))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
        if parts.len() != 2 {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        }
        let key = parts[0];
        let value_str = parts[1];

        match key {
            "fixture" => {
                config.fixture = Some(PathBuf::from(value_str));
            }
            "engine.map-sampling-rate" => {
                config
                    .engine
                    .get_or_insert_with(Default::default)
                    .map_sampling_rate = Some(parse_value(key, value_str, "float")?);
            }
            "engine.show-timings" => {
                config.engine.get_or_insert_with(Default::default).show_timings =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "engine.fill-rotamer-tables" => {
                config
                    .engine
                    .get_or_insert_with(Default::default)
                    .fill_rotamer_tables = Some(parse_value(key, value_str, "boolean")?);
            }
            "engine.backup-dir" => {
                config.engine.get_or_insert_with(Default::default).backup_dir =
                    Some(value_str.to_string());
            }
            "staging.directory" => {
                config.staging.get_or_insert_with(Default::default).directory =
                    Some(value_str.to_string());
            }
            "geometry.bond-length-ceiling" => {
                config
                    .geometry
                    .get_or_insert_with(Default::default)
                    .bond_length_ceiling = Some(parse_value(key, value_str, "float")?);
            }
            "diagnostics.heap-journal" => {
                config
                    .diagnostics
                    .get_or_insert_with(Default::default)
                    .heap_journal = Some(parse_value(key, value_str, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unknown or unsupported key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
