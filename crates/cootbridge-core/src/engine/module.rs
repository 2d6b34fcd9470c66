use super::config::WorkerConfig;
use super::error::EngineFault;
use crate::core::native::{NativeHeap, Owned};
use crate::core::vfs::VirtualFs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// The engine modules a worker hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// The molecular-modeling engine instance.
    #[default]
    Coot,
    /// The companion crystallography module.
    Ccp4,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 2] = [ModuleKind::Coot, ModuleKind::Ccp4];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Coot => "coot",
            ModuleKind::Ccp4 => "ccp4",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coot" => Ok(ModuleKind::Coot),
            "ccp4" => Ok(ModuleKind::Ccp4),
            other => Err(format!("unknown module '{}'", other)),
        }
    }
}

/// The named-operation surface of a loaded engine module.
///
/// Arguments are passed positionally and unchecked: an operation that cannot use them
/// answers with an [`EngineFault`]. Every successful call hands back the single owner of
/// a freshly allocated result on the module's heap.
pub trait Engine {
    fn kind(&self) -> ModuleKind;

    fn heap(&self) -> &Rc<NativeHeap>;

    fn fs(&self) -> Rc<dyn VirtualFs>;

    fn call(&mut self, operation: &str, args: &[Value]) -> Result<Owned, EngineFault>;
}

/// Constructs engine modules on the worker thread.
///
/// Loaders cross into the worker thread, so they must be `Send`; the modules they build
/// never leave it.
pub trait EngineLoader: Send {
    fn load(&self, module: ModuleKind, config: &WorkerConfig)
    -> Result<Box<dyn Engine>, EngineFault>;
}

impl<F> EngineLoader for F
where
    F: Fn(ModuleKind, &WorkerConfig) -> Result<Box<dyn Engine>, EngineFault> + Send,
{
    fn load(
        &self,
        module: ModuleKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn Engine>, EngineFault> {
        self(module, config)
    }
}
