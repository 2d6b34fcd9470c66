//! # Shims Module
//!
//! Commands that cannot be forwarded to the engine as-is. A shim name is accepted in place
//! of an engine operation name and runs in front of one or more engine calls.
//!
//! ## Kinds
//!
//! - **Staging shims** receive a raw payload (coordinates, reflections, maps, dictionaries)
//!   where the engine operation expects a file path. The payload is staged into the
//!   engine's filesystem under a generated name, the operation is called with the staged
//!   path, and the file is removed on every exit path.
//! - **Composite shims** reshape host-side arguments into the nested structures an engine
//!   operation expects, or chain several calls.

use super::config::WorkerConfig;
use super::error::{BridgeError, ProtocolFault};
use super::module::Engine;
use super::staging::{PayloadKind, StagedFile, payload_bytes};
use crate::core::native::Owned;
use phf::{Map, phf_map};
use serde_json::{Map as JsonMap, Value, json};
use tracing::debug;

/// User-defined colour indices handed out by `shim_set_bond_colours` start here, above
/// the engine's built-in palette.
pub const FIRST_USER_COLOUR_INDEX: i64 = 51;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimKind {
    Staging,
    Composite,
}

type ShimFn = fn(&mut dyn Engine, &WorkerConfig, &ShimArgs<'_>) -> Result<Owned, BridgeError>;

/// A named adapter in front of an engine operation.
pub struct Shim {
    pub name: &'static str,
    /// The engine operation the shim ends in.
    pub operation: &'static str,
    pub kind: ShimKind,
    run: ShimFn,
}

impl Shim {
    pub fn run(
        &self,
        engine: &mut dyn Engine,
        config: &WorkerConfig,
        args: &[Value],
    ) -> Result<Owned, BridgeError> {
        debug!(shim = self.name, operation = self.operation, "Running shim");
        (self.run)(engine, config, &ShimArgs::new(self.name, args))
    }
}

static SHIMS: Map<&'static str, Shim> = phf_map! {
    "shim_read_pdb" => Shim {
        name: "shim_read_pdb",
        operation: "read_pdb",
        kind: ShimKind::Staging,
        run: read_pdb,
    },
    "shim_read_mtz" => Shim {
        name: "shim_read_mtz",
        operation: "read_mtz",
        kind: ShimKind::Staging,
        run: read_mtz,
    },
    "shim_auto_open_mtz" => Shim {
        name: "shim_auto_open_mtz",
        operation: "auto_read_mtz",
        kind: ShimKind::Staging,
        run: auto_open_mtz,
    },
    "shim_read_ccp4_map" => Shim {
        name: "shim_read_ccp4_map",
        operation: "read_ccp4_map",
        kind: ShimKind::Staging,
        run: read_ccp4_map,
    },
    "shim_read_dictionary" => Shim {
        name: "shim_read_dictionary",
        operation: "import_cif_dictionary",
        kind: ShimKind::Staging,
        run: read_dictionary,
    },
    "shim_replace_molecule_by_model_from_file" => Shim {
        name: "shim_replace_molecule_by_model_from_file",
        operation: "replace_molecule_by_model_from_file",
        kind: ShimKind::Staging,
        run: replace_molecule_by_model,
    },
    "shim_replace_map_by_mtz_from_file" => Shim {
        name: "shim_replace_map_by_mtz_from_file",
        operation: "replace_map_by_mtz_from_file",
        kind: ShimKind::Staging,
        run: replace_map_by_mtz,
    },
    "shim_associate_data_mtz_file_with_map" => Shim {
        name: "shim_associate_data_mtz_file_with_map",
        operation: "associate_data_mtz_file_with_map",
        kind: ShimKind::Staging,
        run: associate_data_mtz,
    },
    "shim_new_positions_for_residue_atoms" => Shim {
        name: "shim_new_positions_for_residue_atoms",
        operation: "new_positions_for_atoms_in_residues",
        kind: ShimKind::Composite,
        run: new_positions_for_residue_atoms,
    },
    "shim_set_bond_colours" => Shim {
        name: "shim_set_bond_colours",
        operation: "set_user_defined_atom_colour_by_selection",
        kind: ShimKind::Composite,
        run: set_bond_colours,
    },
    "shim_smiles_to_pdb" => Shim {
        name: "shim_smiles_to_pdb",
        operation: "SmilesToPDB",
        kind: ShimKind::Composite,
        run: smiles_to_pdb,
    },
};

pub fn lookup(name: &str) -> Option<&'static Shim> {
    SHIMS.get(name)
}

/// All registered shims, sorted by name.
pub fn all() -> Vec<&'static Shim> {
    let mut shims: Vec<&'static Shim> = SHIMS.values().collect();
    shims.sort_by_key(|shim| shim.name);
    shims
}

/// Fails if a shim is registered under a different name or targets no operation.
pub fn validate() -> Result<(), BridgeError> {
    for (key, shim) in SHIMS.entries() {
        if shim.name != *key {
            return Err(BridgeError::Registry(format!(
                "shim registered as '{}' calls itself '{}'",
                key, shim.name
            )));
        }
        if shim.operation.trim().is_empty() {
            return Err(BridgeError::Registry(format!(
                "shim '{}' targets an empty operation name",
                key
            )));
        }
    }
    Ok(())
}

/// Positional shim arguments, with errors that name the shim and the argument.
pub struct ShimArgs<'a> {
    shim: &'static str,
    values: &'a [Value],
}

impl<'a> ShimArgs<'a> {
    fn new(shim: &'static str, values: &'a [Value]) -> Self {
        Self { shim, values }
    }

    fn fault(&self, name: &str, reason: &str) -> ProtocolFault {
        ProtocolFault::invalid_argument(format!("{} argument '{}'", self.shim, name), reason)
    }

    fn value(&self, index: usize, name: &str) -> Result<&'a Value, ProtocolFault> {
        self.values
            .get(index)
            .ok_or_else(|| self.fault(name, "missing"))
    }

    fn text(&self, index: usize, name: &str) -> Result<&'a str, ProtocolFault> {
        self.value(index, name)?
            .as_str()
            .ok_or_else(|| self.fault(name, "expected a string"))
    }

    fn int(&self, index: usize, name: &str) -> Result<i64, ProtocolFault> {
        self.value(index, name)?
            .as_i64()
            .ok_or_else(|| self.fault(name, "expected an integer"))
    }

    fn flag_or(&self, index: usize, name: &str, default: bool) -> Result<bool, ProtocolFault> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::Number(number)) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
            Some(_) => Err(self.fault(name, "expected a boolean")),
        }
    }

    fn list(&self, index: usize, name: &str) -> Result<&'a [Value], ProtocolFault> {
        self.value(index, name)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| self.fault(name, "expected a list"))
    }

    fn payload(&self, index: usize, name: &str) -> Result<Vec<u8>, ProtocolFault> {
        payload_bytes(self.value(index, name)?, &format!("{} argument '{}'", self.shim, name))
    }

    /// A string member of an object argument.
    fn member(&self, index: usize, name: &str, key: &str) -> Result<&'a str, ProtocolFault> {
        self.value(index, name)?
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| self.fault(name, &format!("expected a string member '{}'", key)))
    }

    fn member_flag_or(&self, index: usize, name: &str, key: &str, default: bool) -> bool {
        self.values
            .get(index)
            .and_then(|value| value.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }
}

fn stage(
    engine: &dyn Engine,
    config: &WorkerConfig,
    kind: PayloadKind,
    source_name: Option<&str>,
    bytes: &[u8],
) -> Result<StagedFile, BridgeError> {
    StagedFile::with_generated_name(
        engine.fs(),
        &config.staging_dir,
        kind.staged_extension(source_name),
        bytes,
    )
}

fn read_pdb(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let bytes = args.payload(0, "data")?;
    let name = args.text(1, "name")?;
    let staged = stage(engine, config, PayloadKind::Coordinates, Some(name), &bytes)?;
    Ok(engine.call("read_pdb", &[json!(staged.path()), json!(name)])?)
}

fn read_mtz(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let bytes = args.payload(0, "data")?;
    let name = args.text(1, "name")?;
    let f = args.member(2, "selectedColumns", "F")?;
    let phi = args.member(2, "selectedColumns", "PHI")?;
    let is_difference = args.member_flag_or(2, "selectedColumns", "isDifference", false);
    let staged = stage(engine, config, PayloadKind::Reflections, Some(name), &bytes)?;
    Ok(engine.call(
        "read_mtz",
        &[
            json!(staged.path()),
            json!(f),
            json!(phi),
            json!(""),
            json!(false),
            json!(is_difference),
        ],
    )?)
}

fn auto_open_mtz(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let bytes = args.payload(0, "data")?;
    let staged = stage(engine, config, PayloadKind::Reflections, None, &bytes)?;
    Ok(engine.call("auto_read_mtz", &[json!(staged.path())])?)
}

fn read_ccp4_map(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let bytes = args.payload(0, "data")?;
    let name = args.text(1, "name")?;
    let is_difference = args.flag_or(2, "isDiffMap", false)?;
    let staged = stage(engine, config, PayloadKind::Map, Some(name), &bytes)?;
    Ok(engine.call(
        "read_ccp4_map",
        &[json!(staged.path()), json!(is_difference)],
    )?)
}

fn read_dictionary(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let bytes = args.payload(0, "data")?;
    let imol_enc = args.int(1, "associatedMolNo")?;
    let staged = stage(engine, config, PayloadKind::Dictionary, None, &bytes)?;
    Ok(engine.call(
        "import_cif_dictionary",
        &[json!(staged.path()), json!(imol_enc)],
    )?)
}

fn replace_molecule_by_model(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let imol = args.int(0, "molNo")?;
    let bytes = args.payload(1, "data")?;
    let staged = stage(engine, config, PayloadKind::Coordinates, None, &bytes)?;
    Ok(engine.call(
        "replace_molecule_by_model_from_file",
        &[json!(imol), json!(staged.path())],
    )?)
}

fn replace_map_by_mtz(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let imol = args.int(0, "molNo")?;
    let bytes = args.payload(1, "data")?;
    let f = args.member(2, "selectedColumns", "F")?;
    let phi = args.member(2, "selectedColumns", "PHI")?;
    let staged = stage(engine, config, PayloadKind::Reflections, None, &bytes)?;
    Ok(engine.call(
        "replace_map_by_mtz_from_file",
        &[
            json!(imol),
            json!(staged.path()),
            json!(f),
            json!(phi),
            json!(""),
            json!(false),
        ],
    )?)
}

/// Stages reflection data under the host's own file name and leaves it in place after a
/// successful call; the engine reads it lazily. Answers with the staged path.
fn associate_data_mtz(
    engine: &mut dyn Engine,
    config: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let imol = args.int(0, "molNo")?;
    let file_name = args.member(1, "reflectionData", "fileName")?;
    let data = args
        .value(1, "reflectionData")?
        .get("data")
        .ok_or_else(|| args.fault("reflectionData", "expected a 'data' member"))?;
    let bytes = payload_bytes(data, "reflectionData.data")?;
    let f = args.text(2, "F")?;
    let sig_f = args.text(3, "SIGF")?;
    let free_r = args.text(4, "FREE")?;

    let staged = StagedFile::create(
        engine.fs(),
        &config.staging_dir,
        &format!("{}.mtz", file_name),
        &bytes,
    )?;
    engine
        .call(
            "associate_data_mtz_file_with_map",
            &[json!(imol), json!(staged.path()), json!(f), json!(sig_f), json!(free_r)],
        )?
        .release();
    let path = staged.keep();
    Ok(engine.heap().allocate(path))
}

/// Splits a `//chain/resno[.ins]/atom` label into chain, residue number and insertion code.
fn parse_residue_cid(cid: &str) -> Option<(String, i64, String)> {
    let fields: Vec<&str> = cid.split('/').collect();
    let chain = *fields.get(2)?;
    let residue = *fields.get(3)?;
    let (number, ins_code) = residue.split_once('.').unwrap_or((residue, ""));
    let digits_end = number
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(number.len(), |(i, _)| i);
    let res_no = number[..digits_end].parse().ok()?;
    Some((chain.to_string(), res_no, ins_code.to_string()))
}

fn atom_member<'a>(
    args: &ShimArgs<'_>,
    atom: &'a Value,
    key: &str,
) -> Result<&'a Value, ProtocolFault> {
    atom.get(key)
        .ok_or_else(|| args.fault("atoms", &format!("atom is missing '{}'", key)))
}

fn new_positions_for_residue_atoms(
    engine: &mut dyn Engine,
    _: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let imol = args.int(0, "molNo")?;
    let mut moved_residues = Vec::new();
    for residue in args.list(1, "atoms")? {
        let atoms = residue
            .as_array()
            .ok_or_else(|| args.fault("atoms", "expected a list of atoms per residue"))?;
        let Some(first) = atoms.first() else {
            continue;
        };
        let label = atom_member(args, first, "label")?
            .as_str()
            .ok_or_else(|| args.fault("atoms", "atom label is not a string"))?;
        let (chain_id, res_no, ins_code) = parse_residue_cid(label)
            .ok_or_else(|| args.fault("atoms", &format!("cannot parse residue from '{}'", label)))?;

        let moved_atoms = atoms
            .iter()
            .map(|atom| {
                Ok(json!({
                    "atom_name": atom_member(args, atom, "name")?,
                    "alt_conf": atom.get("alt_loc").cloned().unwrap_or_else(|| json!("")),
                    "x": atom_member(args, atom, "x")?,
                    "y": atom_member(args, atom, "y")?,
                    "z": atom_member(args, atom, "z")?,
                    "index": -1,
                }))
            })
            .collect::<Result<Vec<Value>, ProtocolFault>>()?;
        moved_residues.push(json!({
            "chain_id": chain_id,
            "res_no": res_no,
            "ins_code": ins_code,
            "moved_atoms": moved_atoms,
        }));
    }
    Ok(engine.call(
        "new_positions_for_atoms_in_residues",
        &[json!(imol), Value::Array(moved_residues)],
    )?)
}

fn set_bond_colours(
    engine: &mut dyn Engine,
    _: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let imol = args.int(0, "molNo")?;
    let rules = args.list(1, "colours")?;
    let apply_to_non_carbon = args.flag_or(2, "applyColourToNonCarbonAtoms", false)?;

    let mut colours = JsonMap::new();
    let mut selections = Vec::with_capacity(rules.len());
    for (offset, rule) in rules.iter().enumerate() {
        let index = FIRST_USER_COLOUR_INDEX + offset as i64;
        let cid = rule
            .get("cid")
            .and_then(Value::as_str)
            .ok_or_else(|| args.fault("colours", "rule is missing a 'cid'"))?;
        let rgb = rule
            .get("rgb")
            .ok_or_else(|| args.fault("colours", "rule is missing an 'rgb'"))?;
        colours.insert(index.to_string(), rgb.clone());
        selections.push(json!([cid, index]));
    }

    engine
        .call(
            "set_user_defined_bond_colours",
            &[json!(imol), Value::Object(colours)],
        )?
        .release();
    Ok(engine.call(
        "set_user_defined_atom_colour_by_selection",
        &[json!(imol), Value::Array(selections), json!(apply_to_non_carbon)],
    )?)
}

fn smiles_to_pdb(
    engine: &mut dyn Engine,
    _: &WorkerConfig,
    args: &ShimArgs<'_>,
) -> Result<Owned, BridgeError> {
    let smiles = args.text(0, "smiles")?;
    let tlc = args.text(1, "TLC")?;
    let conformers = args.int(2, "nConformers")?;
    let iterations = args.int(3, "nIterations")?;
    Ok(engine.call(
        "SmilesToPDB",
        &[json!(smiles), json!(tlc), json!(conformers), json!(iterations)],
    )?)
}
