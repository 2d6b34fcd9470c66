//! Turning opaque engine results into plain, transfer-safe values.
//!
//! A materializer takes the owning guard of a top-level engine result and returns a
//! [`ResultPayload`]. It acquires a sub-handle for every composite node it inspects and
//! lets each one go before its container: element guards are scoped to the loop body that
//! reads them, containers to the function that walks them. The same scoping applies when a
//! filtered branch skips an element and when a shape error aborts the walk halfway.

mod geometry;
mod primitives;
mod records;

pub use geometry::{
    InstancedPreset, flatten_instanced_mesh, flatten_line_mesh, flatten_simple_mesh,
};

use crate::core::models::geometry::MeshData;
use crate::core::models::records::{
    AtomSpecRecord, AutoReadMtzInfo, ColourRule, HBond, HistogramInfo, InterestingPlace,
    LineSegment, MapCentreInfo, MmrrccStats, RamachandranRecord, ResidueSpecRecord,
    SuperposeResults, SymmetryOperator, ValidationRecord,
};
use crate::core::native::{NativeError, Owned};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::config::DEFAULT_BOND_LENGTH_CEILING;
use super::error::{BridgeError, ProtocolFault};

/// The result type tag a command carries, selecting its materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Status,
    Void,
    IntArray,
    FloatArray,
    StringArray,
    ResidueSpecs,
    AtomSpecs,
    ColourRules,
    MapMoleculeCentreInfo,
    HistogramInfo,
    AutoReadMtzInfoArray,
    Symmetry,
    MmrrccStats,
    RamachandranData,
    ValidationData,
    InterestingPlacesData,
    SuperposeResults,
    Generic3dLinesBondsBox,
    VectorHbond,
    Mesh,
    MeshPerm,
    LinesMesh,
    LitLinesMesh,
    InstancedMesh,
    InstancedMeshPerm,
    InstancedMeshPerfectSpheres,
    StatusInstancedMeshPair,
}

impl ReturnType {
    pub const ALL: [ReturnType; 27] = [
        ReturnType::Status,
        ReturnType::Void,
        ReturnType::IntArray,
        ReturnType::FloatArray,
        ReturnType::StringArray,
        ReturnType::ResidueSpecs,
        ReturnType::AtomSpecs,
        ReturnType::ColourRules,
        ReturnType::MapMoleculeCentreInfo,
        ReturnType::HistogramInfo,
        ReturnType::AutoReadMtzInfoArray,
        ReturnType::Symmetry,
        ReturnType::MmrrccStats,
        ReturnType::RamachandranData,
        ReturnType::ValidationData,
        ReturnType::InterestingPlacesData,
        ReturnType::SuperposeResults,
        ReturnType::Generic3dLinesBondsBox,
        ReturnType::VectorHbond,
        ReturnType::Mesh,
        ReturnType::MeshPerm,
        ReturnType::LinesMesh,
        ReturnType::LitLinesMesh,
        ReturnType::InstancedMesh,
        ReturnType::InstancedMeshPerm,
        ReturnType::InstancedMeshPerfectSpheres,
        ReturnType::StatusInstancedMeshPair,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnType::Status => "status",
            ReturnType::Void => "void",
            ReturnType::IntArray => "int_array",
            ReturnType::FloatArray => "float_array",
            ReturnType::StringArray => "string_array",
            ReturnType::ResidueSpecs => "residue_specs",
            ReturnType::AtomSpecs => "atom_specs",
            ReturnType::ColourRules => "colour_rules",
            ReturnType::MapMoleculeCentreInfo => "map_molecule_centre_info_t",
            ReturnType::HistogramInfo => "histogram_info_t",
            ReturnType::AutoReadMtzInfoArray => "auto_read_mtz_info_array",
            ReturnType::Symmetry => "symmetry",
            ReturnType::MmrrccStats => "mmrrcc_stats",
            ReturnType::RamachandranData => "ramachandran_data",
            ReturnType::ValidationData => "validation_data",
            ReturnType::InterestingPlacesData => "interesting_places_data",
            ReturnType::SuperposeResults => "superpose_results",
            ReturnType::Generic3dLinesBondsBox => "generic_3d_lines_bonds_box",
            ReturnType::VectorHbond => "vector_hbond",
            ReturnType::Mesh => "mesh",
            ReturnType::MeshPerm => "mesh_perm",
            ReturnType::LinesMesh => "lines_mesh",
            ReturnType::LitLinesMesh => "lit_lines_mesh",
            ReturnType::InstancedMesh => "instanced_mesh",
            ReturnType::InstancedMeshPerm => "instanced_mesh_perm",
            ReturnType::InstancedMeshPerfectSpheres => "instanced_mesh_perfect_spheres",
            ReturnType::StatusInstancedMeshPair => "status_instanced_mesh_pair",
        }
    }

    pub fn is_geometry(self) -> bool {
        matches!(
            self,
            ReturnType::Mesh
                | ReturnType::MeshPerm
                | ReturnType::LinesMesh
                | ReturnType::LitLinesMesh
                | ReturnType::InstancedMesh
                | ReturnType::InstancedMeshPerm
                | ReturnType::InstancedMeshPerfectSpheres
                | ReturnType::StatusInstancedMeshPair
        )
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnType {
    type Err = ProtocolFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReturnType::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ProtocolFault::UnknownReturnType(s.to_string()))
    }
}

/// The plain value produced for one command, shaped by its return type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    /// `status` pass-through and `void` (as `null`).
    Plain(Value),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
    ResidueSpecs(Vec<ResidueSpecRecord>),
    AtomSpecs(Vec<AtomSpecRecord>),
    ColourRules(Vec<ColourRule>),
    MapCentre(MapCentreInfo),
    Histogram(HistogramInfo),
    AutoReadMtz(Vec<AutoReadMtzInfo>),
    Symmetry(Vec<SymmetryOperator>),
    Mmrrcc(MmrrccStats),
    Ramachandran(Vec<RamachandranRecord>),
    Validation(Vec<ValidationRecord>),
    InterestingPlaces(Vec<InterestingPlace>),
    Superpose(SuperposeResults),
    LineBoxes(Vec<Vec<LineSegment>>),
    HBonds(Vec<HBond>),
    Mesh(MeshData),
    StatusMesh { status: Value, mesh: MeshData },
}

/// Per-command inputs a materializer may need besides the result itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializeOptions {
    /// Restricts chain-organized results to one chain.
    pub chain_id: Option<String>,
    /// Ceiling applied by the `instanced_mesh` preset.
    pub bond_length_ceiling: f32,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            chain_id: None,
            bond_length_ceiling: DEFAULT_BOND_LENGTH_CEILING,
        }
    }
}

impl MaterializeOptions {
    pub fn for_chain(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: Some(chain_id.into()),
            ..Self::default()
        }
    }

    pub(crate) fn chain_matches(&self, chain_id: &str) -> bool {
        self.chain_id.as_deref().is_none_or(|wanted| wanted == chain_id)
    }
}

/// Consumes a top-level result guard; the guard is released before the call returns.
pub type Materializer = fn(Owned, &MaterializeOptions) -> Result<ResultPayload, NativeError>;

/// The table mapping every return type tag to its materializer.
pub struct MaterializerRegistry {
    entries: HashMap<ReturnType, Materializer>,
}

impl MaterializerRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(ReturnType::Status, primitives::status);
        registry.register(ReturnType::Void, primitives::void);
        registry.register(ReturnType::IntArray, primitives::int_array);
        registry.register(ReturnType::FloatArray, primitives::float_array);
        registry.register(ReturnType::StringArray, primitives::string_array);
        registry.register(ReturnType::ColourRules, primitives::colour_rules);
        registry.register(ReturnType::ResidueSpecs, records::residue_specs);
        registry.register(ReturnType::AtomSpecs, records::atom_specs);
        registry.register(ReturnType::MapMoleculeCentreInfo, records::map_centre_info);
        registry.register(ReturnType::HistogramInfo, records::histogram_info);
        registry.register(ReturnType::AutoReadMtzInfoArray, records::auto_read_mtz_info);
        registry.register(ReturnType::Symmetry, records::symmetry);
        registry.register(ReturnType::MmrrccStats, records::mmrrcc_stats);
        registry.register(ReturnType::RamachandranData, records::ramachandran_data);
        registry.register(ReturnType::ValidationData, records::validation_data);
        registry.register(ReturnType::InterestingPlacesData, records::interesting_places);
        registry.register(ReturnType::SuperposeResults, records::superpose_results);
        registry.register(ReturnType::Generic3dLinesBondsBox, records::lines_bonds_box);
        registry.register(ReturnType::VectorHbond, records::hbonds);
        registry.register(ReturnType::Mesh, geometry::mesh);
        registry.register(ReturnType::MeshPerm, geometry::mesh_perm);
        registry.register(ReturnType::LinesMesh, geometry::lines_mesh);
        registry.register(ReturnType::LitLinesMesh, geometry::lit_lines_mesh);
        registry.register(ReturnType::InstancedMesh, geometry::instanced_mesh);
        registry.register(ReturnType::InstancedMeshPerm, geometry::instanced_mesh_perm);
        registry.register(
            ReturnType::InstancedMeshPerfectSpheres,
            geometry::instanced_mesh_perfect_spheres,
        );
        registry.register(
            ReturnType::StatusInstancedMeshPair,
            geometry::status_instanced_mesh_pair,
        );
        registry
    }

    pub fn register(&mut self, tag: ReturnType, materializer: Materializer) {
        self.entries.insert(tag, materializer);
    }

    pub fn get(&self, tag: ReturnType) -> Option<Materializer> {
        self.entries.get(&tag).copied()
    }

    /// Fails if any return type tag has no materializer.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let missing: Vec<&str> = ReturnType::ALL
            .iter()
            .filter(|tag| !self.entries.contains_key(tag))
            .map(|tag| tag.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Registry(format!(
                "no materializer for return type(s): {}",
                missing.join(", ")
            )))
        }
    }

    pub fn materialize(
        &self,
        tag: ReturnType,
        result: Owned,
        options: &MaterializeOptions,
    ) -> Result<ResultPayload, BridgeError> {
        let materializer = self.get(tag).ok_or_else(|| {
            BridgeError::Registry(format!("no materializer for return type '{}'", tag))
        })?;
        Ok(materializer(result, options)?)
    }
}

/// Copies every element of a native vector, releasing each element before the next one is
/// acquired.
pub(crate) fn collect_sequence<T>(
    sequence: &Owned,
    mut convert: impl FnMut(&Owned) -> Result<T, NativeError>,
) -> Result<Vec<T>, NativeError> {
    let len = sequence.len()?;
    let mut values = Vec::with_capacity(len);
    for index in 0..len {
        let element = sequence.get(index)?;
        values.push(convert(&element)?);
        element.release();
    }
    Ok(values)
}
