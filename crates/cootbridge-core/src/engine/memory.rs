use super::config::WorkerConfig;
use super::error::EngineFault;
use super::module::{Engine, EngineLoader, ModuleKind};
use crate::core::native::{NativeHeap, NativeNode, Owned};
use crate::core::vfs::{MemoryFs, VirtualFs};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::debug;

/// An engine operation: positional arguments in, a native result tree out.
pub type OperationFn = Box<dyn FnMut(&[Value], &mut EngineState) -> Result<NativeNode, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeKind {
    Model,
    Map,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub kind: MoleculeKind,
    pub name: String,
    pub contents: Vec<u8>,
    pub is_difference_map: bool,
    pub associated_data: Option<String>,
}

impl Molecule {
    fn new(kind: MoleculeKind, name: &str, contents: Vec<u8>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            contents,
            is_difference_map: false,
            associated_data: None,
        }
    }
}

/// The mutable model behind a [`MemoryEngine`]: its molecule table, its settings and the
/// ordered log of every operation it was asked to run.
pub struct EngineState {
    fs: Rc<MemoryFs>,
    molecules: BTreeMap<i64, Molecule>,
    next_imol: i64,
    settings: BTreeMap<String, Value>,
    calls: Vec<String>,
}

impl EngineState {
    fn new(fs: Rc<MemoryFs>) -> Self {
        Self {
            fs,
            molecules: BTreeMap::new(),
            next_imol: 0,
            settings: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn fs(&self) -> &MemoryFs {
        &self.fs
    }

    pub fn molecule(&self, imol: i64) -> Option<&Molecule> {
        self.molecules.get(&imol)
    }

    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    pub fn add_molecule(&mut self, molecule: Molecule) -> i64 {
        let imol = self.next_imol;
        self.next_imol += 1;
        self.molecules.insert(imol, molecule);
        imol
    }

    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    fn record_setting(&mut self, operation: &str, args: &[Value]) {
        self.settings
            .insert(operation.to_string(), Value::Array(args.to_vec()));
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    fn model_mut(&mut self, imol: i64) -> Result<&mut Molecule, String> {
        match self.molecules.get_mut(&imol) {
            Some(molecule) if molecule.kind == MoleculeKind::Model => Ok(molecule),
            _ => Err(format!("{} is not a valid model molecule", imol)),
        }
    }

    fn map_mut(&mut self, imol: i64) -> Result<&mut Molecule, String> {
        match self.molecules.get_mut(&imol) {
            Some(molecule) if molecule.kind == MoleculeKind::Map => Ok(molecule),
            _ => Err(format!("{} is not a valid map molecule", imol)),
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, String> {
        self.fs.read_file(path).map_err(|e| e.to_string())
    }
}

/// A fully in-memory engine module.
///
/// The `coot` flavour ships with the molecule-table operations the worker itself relies on
/// (reading and writing coordinates, maps and reflection data, closing and copying
/// molecules, startup settings). Anything else is registered by the caller, either as a
/// closure or as a canned result.
pub struct MemoryEngine {
    kind: ModuleKind,
    heap: Rc<NativeHeap>,
    fs: Rc<MemoryFs>,
    state: EngineState,
    operations: HashMap<String, OperationFn>,
}

impl MemoryEngine {
    pub fn new(kind: ModuleKind) -> Self {
        Self::with_heap(kind, NativeHeap::new())
    }

    pub fn with_heap(kind: ModuleKind, heap: Rc<NativeHeap>) -> Self {
        let fs = Rc::new(MemoryFs::new());
        let mut engine = Self {
            kind,
            heap,
            fs: Rc::clone(&fs),
            state: EngineState::new(fs),
            operations: HashMap::new(),
        };
        if kind == ModuleKind::Coot {
            for (name, operation) in BUILTIN_OPERATIONS {
                engine.operations.insert(name.to_string(), Box::new(*operation));
            }
            for &name in SETTING_OPERATIONS {
                engine.register(name, move |args, state| {
                    state.record_setting(name, args);
                    Ok(NativeNode::Void)
                });
            }
        }
        engine
    }

    pub fn register<F>(&mut self, operation: &str, implementation: F)
    where
        F: FnMut(&[Value], &mut EngineState) -> Result<NativeNode, String> + 'static,
    {
        self.operations
            .insert(operation.to_string(), Box::new(implementation));
    }

    /// Makes `operation` answer every call with a copy of `result`.
    pub fn set_result(&mut self, operation: &str, result: NativeNode) {
        self.register(operation, move |_, _| Ok(result.clone()));
    }

    /// Makes `operation` reject every call with `message`.
    pub fn set_failure(&mut self, operation: &str, message: &str) {
        let message = message.to_string();
        self.register(operation, move |_, _| Err(message.clone()));
    }

    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn memory_fs(&self) -> &Rc<MemoryFs> {
        &self.fs
    }

    pub fn apply_fixture(&mut self, fixture: &ModuleFixture) -> Result<(), EngineFault> {
        for (operation, raw) in &fixture.results {
            let node: NativeNode = serde_json::from_value(raw.clone()).map_err(|e| {
                EngineFault::new(operation, format!("invalid fixture result: {}", e))
            })?;
            self.set_result(operation, node);
        }
        for (operation, message) in &fixture.failures {
            self.set_failure(operation, message);
        }
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn heap(&self) -> &Rc<NativeHeap> {
        &self.heap
    }

    fn fs(&self) -> Rc<dyn VirtualFs> {
        self.fs.clone()
    }

    fn call(&mut self, operation: &str, args: &[Value]) -> Result<Owned, EngineFault> {
        debug!(module = %self.kind, operation, args = args.len(), "Calling engine operation");
        self.state.calls.push(operation.to_string());
        let implementation = self
            .operations
            .get_mut(operation)
            .ok_or_else(|| EngineFault::new(operation, "no such operation"))?;
        let node = implementation(args, &mut self.state)
            .map_err(|message| EngineFault::new(operation, message))?;
        Ok(self.heap.allocate(node))
    }
}

/// Canned results and failures for one module, keyed by operation name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFixture {
    #[serde(default)]
    pub results: BTreeMap<String, Value>,
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineFixture {
    #[serde(default)]
    pub coot: ModuleFixture,
    #[serde(default)]
    pub ccp4: ModuleFixture,
    /// Modules that should fail to construct.
    #[serde(default)]
    pub unavailable: Vec<ModuleKind>,
}

/// Builds [`MemoryEngine`]s, optionally primed from an [`EngineFixture`].
#[derive(Debug, Clone, Default)]
pub struct MemoryEngineLoader {
    fixture: EngineFixture,
}

impl MemoryEngineLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(fixture: EngineFixture) -> Self {
        Self { fixture }
    }
}

impl EngineLoader for MemoryEngineLoader {
    fn load(
        &self,
        module: ModuleKind,
        config: &WorkerConfig,
    ) -> Result<Box<dyn Engine>, EngineFault> {
        if self.fixture.unavailable.contains(&module) {
            return Err(EngineFault::new(
                format!("load {}", module),
                "module marked unavailable by fixture",
            ));
        }
        let heap = if config.heap_journal {
            NativeHeap::with_journal()
        } else {
            NativeHeap::new()
        };
        let mut engine = MemoryEngine::with_heap(module, heap);
        let fixture = match module {
            ModuleKind::Coot => &self.fixture.coot,
            ModuleKind::Ccp4 => &self.fixture.ccp4,
        };
        engine.apply_fixture(fixture)?;
        Ok(Box::new(engine))
    }
}

type Builtin = fn(&[Value], &mut EngineState) -> Result<NativeNode, String>;

const BUILTIN_OPERATIONS: &[(&str, Builtin)] = &[
    ("read_pdb", read_pdb),
    ("read_mtz", read_mtz),
    ("auto_read_mtz", auto_read_mtz),
    ("read_ccp4_map", read_ccp4_map),
    ("import_cif_dictionary", import_cif_dictionary),
    ("replace_molecule_by_model_from_file", replace_molecule_by_model_from_file),
    ("replace_map_by_mtz_from_file", replace_map_by_mtz_from_file),
    ("associate_data_mtz_file_with_map", associate_data_mtz_file_with_map),
    ("writePDBASCII", write_coordinates),
    ("writeCIFASCII", write_coordinates),
    ("writeCCP4Map", write_ccp4_map),
    ("close_molecule", close_molecule),
    ("copy_fragment_using_residue_range", copy_fragment_using_residue_range),
    ("is_valid_model_molecule", is_valid_model_molecule),
    ("is_valid_map_molecule", is_valid_map_molecule),
    ("new_positions_for_atoms_in_residues", new_positions_for_atoms_in_residues),
];

/// Operations that only store their arguments, keyed by operation name.
const SETTING_OPERATIONS: &[&str] = &[
    "set_show_timings",
    "fill_rotamer_probability_tables",
    "set_map_sampling_rate",
    "set_user_defined_bond_colours",
    "set_user_defined_atom_colour_by_selection",
];

fn arg(args: &[Value], index: usize) -> Result<&Value, String> {
    args.get(index)
        .ok_or_else(|| format!("missing argument {}", index))
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, String> {
    arg(args, index)?
        .as_i64()
        .ok_or_else(|| format!("argument {} is not an integer", index))
}

fn str_arg(args: &[Value], index: usize) -> Result<&str, String> {
    arg(args, index)?
        .as_str()
        .ok_or_else(|| format!("argument {} is not a string", index))
}

fn bool_arg_or(args: &[Value], index: usize, default: bool) -> Result<bool, String> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => other
            .as_i64()
            .map(|flag| flag != 0)
            .ok_or_else(|| format!("argument {} is not a boolean", index)),
    }
}

fn read_pdb(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let path = str_arg(args, 0)?;
    let contents = state.read(path)?;
    if contents.is_empty() {
        return Err(format!("no coordinates in {}", path));
    }
    let molecule = Molecule::new(MoleculeKind::Model, path, contents);
    Ok(NativeNode::Int(state.add_molecule(molecule)))
}

fn read_mtz(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let path = str_arg(args, 0)?;
    str_arg(args, 1)?;
    str_arg(args, 2)?;
    let contents = state.read(path)?;
    let mut molecule = Molecule::new(MoleculeKind::Map, path, contents);
    molecule.is_difference_map = bool_arg_or(args, 5, false)?;
    Ok(NativeNode::Int(state.add_molecule(molecule)))
}

fn auto_read_mtz(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let path = str_arg(args, 0)?;
    let contents = state.read(path)?;
    let imol = state.add_molecule(Molecule::new(MoleculeKind::Map, path, contents));
    let info = NativeNode::object("auto_read_mtz_info_t")
        .field("idx", imol)
        .field("F", "FWT")
        .field("phi", "PHWT")
        .field("w", "")
        .field("F_obs", "")
        .field("sigF_obs", "")
        .field("Rfree", "")
        .field("weights_used", false);
    Ok(NativeNode::vector(vec![info]))
}

fn read_ccp4_map(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let path = str_arg(args, 0)?;
    let contents = state.read(path)?;
    let mut molecule = Molecule::new(MoleculeKind::Map, path, contents);
    molecule.is_difference_map = bool_arg_or(args, 1, false)?;
    Ok(NativeNode::Int(state.add_molecule(molecule)))
}

fn import_cif_dictionary(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let path = str_arg(args, 0)?;
    let imol_enc = int_arg(args, 1)?;
    state.read(path)?;
    state
        .settings
        .insert(format!("dictionary:{}", imol_enc), Value::from(path));
    Ok(NativeNode::Int(1))
}

fn replace_molecule_by_model_from_file(
    args: &[Value],
    state: &mut EngineState,
) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let path = str_arg(args, 1)?;
    let contents = state.read(path)?;
    state.model_mut(imol)?.contents = contents;
    Ok(NativeNode::Void)
}

fn replace_map_by_mtz_from_file(
    args: &[Value],
    state: &mut EngineState,
) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let path = str_arg(args, 1)?;
    let contents = state.read(path)?;
    state.map_mut(imol)?.contents = contents;
    Ok(NativeNode::Bool(true))
}

fn associate_data_mtz_file_with_map(
    args: &[Value],
    state: &mut EngineState,
) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let path = str_arg(args, 1)?.to_string();
    if !state.fs.exists(&path) {
        return Err(format!("no reflection data at {}", path));
    }
    state.map_mut(imol)?.associated_data = Some(path);
    Ok(NativeNode::Void)
}

fn write_coordinates(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let path = str_arg(args, 1)?;
    let contents = state.model_mut(imol)?.contents.clone();
    state
        .fs
        .write_file(path, &contents)
        .map_err(|e| e.to_string())?;
    Ok(NativeNode::Int(1))
}

fn write_ccp4_map(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let path = str_arg(args, 1)?;
    let contents = state.map_mut(imol)?.contents.clone();
    state
        .fs
        .write_file(path, &contents)
        .map_err(|e| e.to_string())?;
    Ok(NativeNode::Int(1))
}

fn close_molecule(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    match state.molecules.remove(&imol) {
        Some(_) => Ok(NativeNode::Int(1)),
        None => Err(format!("no molecule {}", imol)),
    }
}

fn copy_fragment_using_residue_range(
    args: &[Value],
    state: &mut EngineState,
) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    let chain = str_arg(args, 1)?;
    let start = int_arg(args, 2)?;
    let end = int_arg(args, 3)?;
    if end < start {
        return Err(format!("empty residue range {}-{}", start, end));
    }
    let source = state.model_mut(imol)?;
    let name = format!("{} {}/{}-{}", source.name, chain, start, end);
    let fragment = Molecule::new(MoleculeKind::Model, &name, source.contents.clone());
    Ok(NativeNode::Int(state.add_molecule(fragment)))
}

fn is_valid_model_molecule(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    Ok(NativeNode::Bool(state.model_mut(imol).is_ok()))
}

fn is_valid_map_molecule(args: &[Value], state: &mut EngineState) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    Ok(NativeNode::Bool(state.map_mut(imol).is_ok()))
}

fn new_positions_for_atoms_in_residues(
    args: &[Value],
    state: &mut EngineState,
) -> Result<NativeNode, String> {
    let imol = int_arg(args, 0)?;
    state.model_mut(imol)?;
    let residues = arg(args, 1)?
        .as_array()
        .ok_or("argument 1 is not a list of moved residues")?;
    let moved_atoms: usize = residues
        .iter()
        .map(|residue| {
            residue
                .get("moved_atoms")
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        })
        .sum();
    Ok(NativeNode::Int(moved_atoms as i64))
}
