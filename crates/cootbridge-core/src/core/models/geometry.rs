use crate::core::native::NativeError;
use serde::{Deserialize, Serialize};

pub const POSITION_COMPONENTS: usize = 3;
pub const COLOR_COMPONENTS: usize = 4;
pub const ORIENTATION_COMPONENTS: usize = 16;

pub const IDENTITY_ORIENTATION: [f32; ORIENTATION_COMPONENTS] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    #[serde(rename = "TRIANGLES")]
    Triangles,
    #[serde(rename = "PERFECT_SPHERES")]
    PerfectSpheres,
    #[serde(rename = "LINES")]
    Lines,
    #[serde(rename = "NORMALLINES")]
    NormalLines,
}

impl PrimitiveKind {
    /// Number of indices that make up one primitive.
    pub fn indices_per_primitive(self) -> usize {
        match self {
            PrimitiveKind::Triangles | PrimitiveKind::PerfectSpheres => 3,
            PrimitiveKind::Lines | PrimitiveKind::NormalLines => 2,
        }
    }
}

/// Per-instance data of an instanced geometry group, one entry per kept instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceData {
    pub origins: Vec<f32>,
    pub sizes: Vec<f32>,
    /// Row-major 4x4 matrices, 16 values per instance.
    pub orientations: Vec<f32>,
    pub use_color: bool,
}

impl InstanceData {
    pub fn count(&self) -> usize {
        self.origins.len() / POSITION_COMPONENTS
    }

    pub fn push(&mut self, origin: [f32; 3], size: [f32; 3], orientation: &[f32]) {
        self.origins.extend_from_slice(&origin);
        self.sizes.extend_from_slice(&size);
        self.orientations.extend_from_slice(orientation);
    }
}

/// The pointer-free, renderer-ready representation of one mesh or instance set.
///
/// `colors` carries one RGBA entry per vertex for plain meshes and one per instance for
/// instanced groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatGeometryBuffer {
    pub primitive_kind: PrimitiveKind,
    pub indices: Vec<u32>,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<InstanceData>,
}

impl FlatGeometryBuffer {
    pub fn new(primitive_kind: PrimitiveKind) -> Self {
        Self {
            primitive_kind,
            indices: Vec::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            instances: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_COMPONENTS
    }

    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.primitive_kind.indices_per_primitive()
    }

    /// Checks that indices address existing vertices and that sibling buffers agree on
    /// their element counts.
    pub fn validate(&self) -> Result<(), NativeError> {
        let invalid = |message: String| Err(NativeError::InvalidGeometry(message));

        if self.positions.len() % POSITION_COMPONENTS != 0 {
            return invalid(format!(
                "{} position values is not a multiple of {}",
                self.positions.len(),
                POSITION_COMPONENTS
            ));
        }
        if self.normals.len() != self.positions.len() {
            return invalid(format!(
                "{} normal values for {} position values",
                self.normals.len(),
                self.positions.len()
            ));
        }
        if self.indices.len() % self.primitive_kind.indices_per_primitive() != 0 {
            return invalid(format!(
                "{} indices do not form whole {:?} primitives",
                self.indices.len(),
                self.primitive_kind
            ));
        }
        let vertex_count = self.vertex_count();
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return invalid(format!(
                "index {} is out of range for {} vertices",
                bad, vertex_count
            ));
        }

        let colored_elements = match &self.instances {
            Some(instances) => {
                let count = instances.count();
                if instances.origins.len() % POSITION_COMPONENTS != 0
                    || instances.sizes.len() != instances.origins.len()
                    || instances.orientations.len() != count * ORIENTATION_COMPONENTS
                {
                    return invalid(format!(
                        "inconsistent instance buffers: {} origins, {} sizes, {} orientations",
                        instances.origins.len(),
                        instances.sizes.len(),
                        instances.orientations.len()
                    ));
                }
                count
            }
            None => vertex_count,
        };
        if self.colors.len() != colored_elements * COLOR_COMPONENTS {
            return invalid(format!(
                "{} colour values for {} coloured elements",
                self.colors.len(),
                colored_elements
            ));
        }
        Ok(())
    }
}

/// A layered geometry result. Layer 0 holds the main buffers (one per instanced group, or
/// the single flattened mesh); an optional layer 1 holds the supplementary markup mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub layers: Vec<Vec<FlatGeometryBuffer>>,
}

impl MeshData {
    pub fn single(buffer: FlatGeometryBuffer) -> Self {
        Self {
            layers: vec![vec![buffer]],
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
