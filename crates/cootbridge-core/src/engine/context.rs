use super::config::WorkerConfig;
use crate::core::native::HeapEvent;
use super::error::BridgeError;
use super::module::{Engine, EngineLoader, ModuleKind};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error, info};

enum ModuleSlot {
    Available(Box<dyn Engine>),
    Unavailable(String),
}

/// Whether a module came up at worker start, and why not if it did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStatus {
    pub module: ModuleKind,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Everything a worker holds for its whole lifetime: the configuration it was started
/// with and one instance of every engine module.
///
/// Modules are constructed and configured exactly once, in [`WorkerContext::initialize`].
/// A module that fails to load or to accept its startup configuration stays unavailable;
/// commands addressed to it fail on their own while the rest of the worker keeps running.
pub struct WorkerContext {
    config: WorkerConfig,
    modules: HashMap<ModuleKind, ModuleSlot>,
}

impl WorkerContext {
    pub fn initialize(loader: &dyn EngineLoader, config: WorkerConfig) -> Self {
        let mut modules = HashMap::new();
        for kind in ModuleKind::ALL {
            let slot = match Self::bring_up(loader, kind, &config) {
                Ok(engine) => {
                    info!(module = %kind, "Engine module ready");
                    ModuleSlot::Available(engine)
                }
                Err(e) => {
                    error!(module = %kind, error = %e, "Engine module failed to start");
                    ModuleSlot::Unavailable(e.to_string())
                }
            };
            modules.insert(kind, slot);
        }
        Self { config, modules }
    }

    fn bring_up(
        loader: &dyn EngineLoader,
        kind: ModuleKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn Engine>, BridgeError> {
        let mut engine = loader.load(kind, config)?;
        if kind == ModuleKind::Coot {
            apply_startup_settings(engine.as_mut(), config)?;
        }
        ensure_dir(&*engine, &config.staging_dir)?;
        Ok(engine)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn availability(&self) -> Vec<ModuleStatus> {
        ModuleKind::ALL
            .iter()
            .map(|&module| match self.modules.get(&module) {
                Some(ModuleSlot::Available(_)) => ModuleStatus {
                    module,
                    available: true,
                    reason: None,
                },
                Some(ModuleSlot::Unavailable(reason)) => ModuleStatus {
                    module,
                    available: false,
                    reason: Some(reason.clone()),
                },
                None => ModuleStatus {
                    module,
                    available: false,
                    reason: Some("never loaded".to_string()),
                },
            })
            .collect()
    }

    /// Empties the heap journal of every available module, logging one summary line per
    /// module, and returns how many events were drained. Does nothing unless journaling
    /// is enabled.
    pub fn flush_heap_journals(&self) -> usize {
        if !self.config.heap_journal {
            return 0;
        }
        let mut drained = 0;
        for kind in ModuleKind::ALL {
            let Some(ModuleSlot::Available(engine)) = self.modules.get(&kind) else {
                continue;
            };
            let heap = engine.heap();
            let events = heap.take_journal();
            if events.is_empty() {
                continue;
            }
            let released = events
                .iter()
                .filter(|event| matches!(event, HeapEvent::Released { .. }))
                .count();
            debug!(
                module = %kind,
                acquired = events.len() - released,
                released,
                live = heap.live_count(),
                "Heap journal"
            );
            drained += events.len();
        }
        drained
    }

    pub fn engine_mut(&mut self, module: ModuleKind) -> Result<&mut dyn Engine, BridgeError> {
        self.engine_and_config(module).map(|(engine, _)| engine)
    }

    /// The module's engine together with the worker configuration, borrowed at once.
    pub fn engine_and_config(
        &mut self,
        module: ModuleKind,
    ) -> Result<(&mut dyn Engine, &WorkerConfig), BridgeError> {
        match self.modules.get_mut(&module) {
            Some(ModuleSlot::Available(engine)) => {
                let engine: &mut dyn Engine = engine.as_mut();
                Ok((engine, &self.config))
            }
            Some(ModuleSlot::Unavailable(reason)) => Err(BridgeError::ModuleUnavailable {
                module,
                reason: reason.clone(),
            }),
            None => Err(BridgeError::ModuleUnavailable {
                module,
                reason: "never loaded".to_string(),
            }),
        }
    }
}

fn apply_startup_settings(engine: &mut dyn Engine, config: &WorkerConfig) -> Result<(), BridgeError> {
    engine
        .call("set_show_timings", &[json!(config.show_timings)])?
        .release();
    if config.fill_rotamer_tables {
        engine.call("fill_rotamer_probability_tables", &[])?.release();
    }
    engine
        .call("set_map_sampling_rate", &[json!(config.map_sampling_rate)])?
        .release();

    ensure_dir(engine, &config.backup_dir)
}

/// Creates `dir` in the module's filesystem unless it is already there (`.` always is).
fn ensure_dir(engine: &dyn Engine, dir: &str) -> Result<(), BridgeError> {
    let fs = engine.fs();
    if !fs.exists(dir) {
        fs.mkdir(dir)
            .map_err(|source| BridgeError::staging(dir, source))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::EngineFault;
    use crate::engine::memory::{EngineFixture, MemoryEngine, MemoryEngineLoader, ModuleFixture};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[test]
    fn both_modules_come_up_with_the_default_loader() {
        let mut ctx = WorkerContext::initialize(&MemoryEngineLoader::new(), WorkerConfig::default());
        assert!(ctx.availability().iter().all(|status| status.available));

        let engine = ctx.engine_mut(ModuleKind::Coot).unwrap();
        assert!(engine.fs().exists("COOT_BACKUP"));
        assert!(engine.heap().stats().is_balanced());
        assert_eq!(engine.heap().live_count(), 0);
    }

    #[test]
    fn startup_settings_reach_the_engine_in_order() {
        let seen: Arc<Mutex<Vec<(String, Vec<Value>)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let loader = move |kind: ModuleKind, _: &WorkerConfig| -> Result<Box<dyn Engine>, EngineFault> {
            let mut engine = MemoryEngine::new(kind);
            for operation in [
                "set_show_timings",
                "fill_rotamer_probability_tables",
                "set_map_sampling_rate",
            ] {
                let sink = Arc::clone(&sink);
                engine.register(operation, move |args, _| {
                    if let Ok(mut calls) = sink.lock() {
                        calls.push((operation.to_string(), args.to_vec()));
                    }
                    Ok(crate::core::native::NativeNode::Void)
                });
            }
            Ok(Box::new(engine))
        };
        let config = WorkerConfig::builder()
            .map_sampling_rate(2.5)
            .build()
            .unwrap();
        WorkerContext::initialize(&loader, config);

        let calls = seen.lock().unwrap();
        // Only the main module is configured; the companion gets no settings.
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], ("set_show_timings".to_string(), vec![json!(false)]));
        assert_eq!(calls[1].0, "fill_rotamer_probability_tables");
        assert_eq!(calls[2], ("set_map_sampling_rate".to_string(), vec![json!(2.5)]));
    }

    #[test]
    fn failed_configuration_marks_only_that_module_unavailable() {
        let mut coot = ModuleFixture::default();
        coot.failures
            .insert("set_map_sampling_rate".to_string(), "bad rate".to_string());
        let loader = MemoryEngineLoader::with_fixture(EngineFixture {
            coot,
            ..EngineFixture::default()
        });
        let mut ctx = WorkerContext::initialize(&loader, WorkerConfig::default());

        let statuses = ctx.availability();
        assert!(!statuses[0].available);
        assert!(statuses[0].reason.as_deref().unwrap().contains("bad rate"));
        assert!(statuses[1].available);
        assert!(matches!(
            ctx.engine_mut(ModuleKind::Coot),
            Err(BridgeError::ModuleUnavailable { module: ModuleKind::Coot, .. })
        ));
        assert!(ctx.engine_mut(ModuleKind::Ccp4).is_ok());
    }

    #[test]
    fn unloadable_companion_keeps_the_worker_alive() {
        let loader = MemoryEngineLoader::with_fixture(EngineFixture {
            unavailable: vec![ModuleKind::Ccp4],
            ..EngineFixture::default()
        });
        let mut ctx = WorkerContext::initialize(&loader, WorkerConfig::default());
        assert!(ctx.engine_mut(ModuleKind::Coot).is_ok());
        let err = ctx.engine_mut(ModuleKind::Ccp4).err().unwrap();
        assert!(err.to_string().contains("ccp4"));
        assert_eq!(
            serde_json::to_value(ctx.availability()).unwrap()[1],
            json!({
                "module": "ccp4",
                "available": false,
                "reason": "Engine operation 'load ccp4' failed: module marked unavailable by fixture"
            })
        );
    }

    #[test]
    fn staging_directory_is_created_in_every_module() {
        let config = WorkerConfig::builder().staging_dir("scratch").build().unwrap();
        let mut ctx = WorkerContext::initialize(&MemoryEngineLoader::new(), config);
        assert!(ctx.availability().iter().all(|status| status.available));
        for kind in ModuleKind::ALL {
            assert!(ctx.engine_mut(kind).unwrap().fs().exists("scratch"));
        }
    }

    #[test]
    fn backup_directory_under_a_missing_parent_disables_only_the_main_module() {
        let config = WorkerConfig::builder().backup_dir("a/b").build().unwrap();
        let mut ctx = WorkerContext::initialize(&MemoryEngineLoader::new(), config);

        let statuses = ctx.availability();
        assert!(!statuses[0].available);
        assert!(statuses[0].reason.as_deref().unwrap().contains("a/b"));
        assert!(statuses[1].available);
        assert!(matches!(
            ctx.engine_mut(ModuleKind::Coot),
            Err(BridgeError::ModuleUnavailable { module: ModuleKind::Coot, .. })
        ));
    }

    #[test]
    fn flushing_drains_every_journal() {
        let config = WorkerConfig::builder().heap_journal(true).build().unwrap();
        let mut ctx = WorkerContext::initialize(&MemoryEngineLoader::new(), config);
        // Startup settings leave three acquire/release pairs behind.
        assert_eq!(ctx.flush_heap_journals(), 6);
        assert_eq!(ctx.flush_heap_journals(), 0);

        let engine = ctx.engine_mut(ModuleKind::Coot).unwrap();
        drop(engine.call("set_show_timings", &[json!(true)]).unwrap());
        assert_eq!(ctx.flush_heap_journals(), 2);
        assert!(ctx.engine_mut(ModuleKind::Coot).unwrap().heap().journal().is_empty());
    }

    #[test]
    fn flushing_is_a_no_op_without_journaling() {
        let ctx = WorkerContext::initialize(&MemoryEngineLoader::new(), WorkerConfig::default());
        assert_eq!(ctx.flush_heap_journals(), 0);
    }
}
