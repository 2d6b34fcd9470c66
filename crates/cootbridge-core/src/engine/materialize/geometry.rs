//! # Geometry Assembler
//!
//! Flattens the engine's mesh results into [`FlatGeometryBuffer`]s a renderer can upload
//! directly.
//!
//! ## Paths
//!
//! - **Plain meshes** copy vertex positions, normals and colours and the triangle index
//!   triples. The `flip` flag reverses winding by swapping the second and third index of
//!   every triangle and negates every normal, so the two always change together.
//! - **Line meshes** turn each triangle into its three edges and tag the buffer `LINES` or
//!   `NORMALLINES`.
//! - **Instanced meshes** produce one buffer per named geometry group, carrying the group's
//!   base shape plus its merged instance lists, and an optional second layer holding the
//!   supplementary markup mesh.
//!
//! Every vertex, triangle, group and instance handle is released before the collection it
//! was taken from.

use super::{MaterializeOptions, ResultPayload};
use crate::core::models::geometry::{
    FlatGeometryBuffer, IDENTITY_ORIENTATION, InstanceData, MeshData, ORIENTATION_COMPONENTS,
    PrimitiveKind,
};
use crate::core::native::{NativeError, Owned};

/// Geometry groups with this name are always rendered as point instances.
pub const SPHERICAL_ATOMS_GROUP: &str = "spherical-atoms";

/// How an instanced mesh is flattened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstancedPreset {
    pub flip: bool,
    /// Render every group as point instances.
    pub spheres: bool,
    /// Oriented instances whose third size component reaches the ceiling are dropped.
    pub size_ceiling: Option<f32>,
}

impl InstancedPreset {
    pub fn standard(size_ceiling: f32) -> Self {
        Self {
            flip: false,
            spheres: false,
            size_ceiling: Some(size_ceiling),
        }
    }

    pub fn permuted() -> Self {
        Self {
            flip: true,
            spheres: false,
            size_ceiling: None,
        }
    }

    pub fn perfect_spheres() -> Self {
        Self {
            flip: false,
            spheres: true,
            size_ceiling: None,
        }
    }

    fn keeps(&self, third_size: f32) -> bool {
        self.size_ceiling.is_none_or(|ceiling| third_size < ceiling)
    }
}

fn to_f32<const N: usize>(values: [f64; N]) -> [f32; N] {
    values.map(|value| value as f32)
}

fn vertex_index(point: i64) -> Result<u32, NativeError> {
    u32::try_from(point)
        .map_err(|_| NativeError::InvalidGeometry(format!("vertex index {} is not addressable", point)))
}

fn copy_vertices(
    source: &Owned,
    flip: bool,
    with_colors: bool,
    buffer: &mut FlatGeometryBuffer,
) -> Result<(), NativeError> {
    let vertices = source.field("vertices")?;
    let len = vertices.len()?;
    buffer.positions.reserve(len * 3);
    buffer.normals.reserve(len * 3);
    for index in 0..len {
        let vertex = vertices.get(index)?;
        let position = to_f32(vertex.floats_n::<3>("pos")?);
        let mut normal = to_f32(vertex.floats_n::<3>("normal")?);
        if flip {
            normal = normal.map(|component| -component);
        }
        buffer.positions.extend_from_slice(&position);
        buffer.normals.extend_from_slice(&normal);
        if with_colors {
            buffer
                .colors
                .extend_from_slice(&to_f32(vertex.floats_n::<4>("color")?));
        }
    }
    Ok(())
}

fn copy_triangles(source: &Owned, flip: bool, indices: &mut Vec<u32>) -> Result<(), NativeError> {
    let triangles = source.field("triangles")?;
    for index in 0..triangles.len()? {
        let triangle = triangles.get(index)?;
        let [a, b, c] = triangle.ints_n::<3>("point_id")?;
        let ordered = if flip { [a, c, b] } else { [a, b, c] };
        for point in ordered {
            indices.push(vertex_index(point)?);
        }
    }
    Ok(())
}

fn copy_edges(source: &Owned, indices: &mut Vec<u32>) -> Result<(), NativeError> {
    let triangles = source.field("triangles")?;
    for index in 0..triangles.len()? {
        let triangle = triangles.get(index)?;
        let [a, b, c] = triangle.ints_n::<3>("point_id")?;
        for point in [a, b, a, c, b, c] {
            indices.push(vertex_index(point)?);
        }
    }
    Ok(())
}

/// Flattens a plain triangle mesh (`vertices` plus `triangles`).
pub fn flatten_simple_mesh(mesh: &Owned, flip: bool) -> Result<FlatGeometryBuffer, NativeError> {
    let mut buffer = FlatGeometryBuffer::new(PrimitiveKind::Triangles);
    copy_vertices(mesh, flip, true, &mut buffer)?;
    copy_triangles(mesh, flip, &mut buffer.indices)?;
    buffer.validate()?;
    Ok(buffer)
}

/// Flattens a triangle mesh into its edges. `lit` selects the normal-shaded line kind.
pub fn flatten_line_mesh(mesh: &Owned, lit: bool) -> Result<FlatGeometryBuffer, NativeError> {
    let kind = if lit {
        PrimitiveKind::NormalLines
    } else {
        PrimitiveKind::Lines
    };
    let mut buffer = FlatGeometryBuffer::new(kind);
    copy_vertices(mesh, false, true, &mut buffer)?;
    copy_edges(mesh, &mut buffer.indices)?;
    buffer.validate()?;
    Ok(buffer)
}

fn orientation_values(rows: &[Vec<f64>]) -> Result<Vec<f32>, NativeError> {
    let values: Vec<f32> = rows.iter().flatten().map(|&value| value as f32).collect();
    if rows.len() != 4 || values.len() != ORIENTATION_COMPONENTS {
        return Err(NativeError::Arity {
            field: "orientation".to_string(),
            expected: ORIENTATION_COMPONENTS,
            found: values.len(),
        });
    }
    Ok(values)
}

fn flatten_group(group: &Owned, preset: InstancedPreset) -> Result<FlatGeometryBuffer, NativeError> {
    let name = group.string("name")?;
    let kind = if preset.spheres || name == SPHERICAL_ATOMS_GROUP {
        PrimitiveKind::PerfectSpheres
    } else {
        PrimitiveKind::Triangles
    };

    let mut buffer = FlatGeometryBuffer::new(kind);
    copy_vertices(group, preset.flip, false, &mut buffer)?;
    copy_triangles(group, preset.flip, &mut buffer.indices)?;

    let mut instances = InstanceData {
        use_color: true,
        ..InstanceData::default()
    };

    {
        let simple = group.field("instancing_data_A")?;
        for index in 0..simple.len()? {
            let instance = simple.get(index)?;
            instances.push(
                to_f32(instance.floats_n::<3>("position")?),
                to_f32(instance.floats_n::<3>("size")?),
                &IDENTITY_ORIENTATION,
            );
            buffer
                .colors
                .extend_from_slice(&to_f32(instance.floats_n::<4>("colour")?));
        }
    }

    let oriented = group.field("instancing_data_B")?;
    for index in 0..oriented.len()? {
        let instance = oriented.get(index)?;
        let size = to_f32(instance.floats_n::<3>("size")?);
        if !preset.keeps(size[2]) {
            continue;
        }
        let orientation = orientation_values(&instance.matrix("orientation")?)?;
        instances.push(
            to_f32(instance.floats_n::<3>("position")?),
            size,
            &orientation,
        );
        buffer
            .colors
            .extend_from_slice(&to_f32(instance.floats_n::<4>("colour")?));
    }

    buffer.instances = Some(instances);
    buffer.validate()?;
    Ok(buffer)
}

/// Flattens an instanced mesh: one buffer per geometry group in layer 0, and the markup
/// mesh in layer 1 when it has at least one triangle.
pub fn flatten_instanced_mesh(
    mesh: &Owned,
    preset: InstancedPreset,
) -> Result<MeshData, NativeError> {
    let groups = mesh.field("geom")?;
    let mut buffers = Vec::with_capacity(groups.len()?);
    for index in 0..groups.len()? {
        let group = groups.get(index)?;
        buffers.push(flatten_group(&group, preset)?);
    }
    groups.release();

    let mut layers = vec![buffers];
    let markup = mesh.field("markup")?;
    let has_triangles = !markup.field("triangles")?.is_empty()?;
    if has_triangles {
        layers.push(vec![flatten_simple_mesh(&markup, preset.flip)?]);
    }
    Ok(MeshData { layers })
}

pub(super) fn mesh(result: Owned, _: &MaterializeOptions) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(MeshData::single(flatten_simple_mesh(&result, false)?)))
}

pub(super) fn mesh_perm(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(MeshData::single(flatten_simple_mesh(&result, true)?)))
}

pub(super) fn lines_mesh(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(MeshData::single(flatten_line_mesh(&result, false)?)))
}

pub(super) fn lit_lines_mesh(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(MeshData::single(flatten_line_mesh(&result, true)?)))
}

pub(super) fn instanced_mesh(
    result: Owned,
    options: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let preset = InstancedPreset::standard(options.bond_length_ceiling);
    Ok(ResultPayload::Mesh(flatten_instanced_mesh(&result, preset)?))
}

pub(super) fn instanced_mesh_perm(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(flatten_instanced_mesh(
        &result,
        InstancedPreset::permuted(),
    )?))
}

pub(super) fn instanced_mesh_perfect_spheres(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::Mesh(flatten_instanced_mesh(
        &result,
        InstancedPreset::perfect_spheres(),
    )?))
}

pub(super) fn status_instanced_mesh_pair(
    result: Owned,
    options: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let status = result.first()?.to_plain_value()?;
    let mesh = {
        let mesh = result.second()?;
        flatten_instanced_mesh(&mesh, InstancedPreset::standard(options.bond_length_ceiling))?
    };
    Ok(ResultPayload::StatusMesh { status, mesh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::native::fixtures;
    use crate::core::native::{NativeHeap, NativeNode};
    use serde_json::json;

    fn sized_b_instances(third_sizes: &[f64]) -> Vec<NativeNode> {
        third_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| fixtures::instance_b([i as f64, 0.0, 0.0], [0.2, 0.2, size]))
            .collect()
    }

    fn single_group_mesh(instances_b: Vec<NativeNode>, markup: NativeNode) -> NativeNode {
        fixtures::instanced_mesh(
            vec![fixtures::geom_group(
                "bonds",
                fixtures::quad_mesh(),
                Vec::new(),
                instances_b,
            )],
            markup,
        )
    }

    #[test]
    fn flip_swaps_winding_and_negates_normals() {
        let heap = NativeHeap::new();
        let mesh = heap.allocate(fixtures::quad_mesh());
        let plain = flatten_simple_mesh(&mesh, false).unwrap();
        let flipped = flatten_simple_mesh(&mesh, true).unwrap();

        assert_eq!(plain.indices.len(), flipped.indices.len());
        for (original, reversed) in plain.indices.chunks(3).zip(flipped.indices.chunks(3)) {
            assert_eq!(original[0], reversed[0]);
            assert_eq!(original[1], reversed[2]);
            assert_eq!(original[2], reversed[1]);
        }
        for (normal, negated) in plain.normals.iter().zip(&flipped.normals) {
            assert_eq!(*normal, -*negated);
        }
        assert_eq!(plain.positions, flipped.positions);
        assert_eq!(plain.colors, flipped.colors);
        drop(mesh);
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn plain_mesh_copies_vertex_data() {
        let heap = NativeHeap::new();
        let buffer = flatten_simple_mesh(&heap.allocate(fixtures::quad_mesh()), false).unwrap();
        assert_eq!(buffer.primitive_kind, PrimitiveKind::Triangles);
        assert_eq!(buffer.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(buffer.vertex_count(), 4);
        assert_eq!(&buffer.positions[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(buffer.colors.len(), 16);
        // Mesh, two collections, four vertices, two triangles.
        assert_eq!(heap.stats().acquired, 9);
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn line_mesh_emits_three_edges_per_triangle() {
        let heap = NativeHeap::new();
        let mesh = heap.allocate(fixtures::quad_mesh());
        let lines = flatten_line_mesh(&mesh, false).unwrap();
        assert_eq!(lines.primitive_kind, PrimitiveKind::Lines);
        assert_eq!(lines.indices[..6], [0, 1, 0, 2, 1, 2]);
        assert_eq!(lines.primitive_count(), 6);

        let lit = flatten_line_mesh(&mesh, true).unwrap();
        assert_eq!(lit.primitive_kind, PrimitiveKind::NormalLines);
        assert_eq!(lit.normals, lines.normals);
    }

    #[test]
    fn out_of_range_triangle_index_is_rejected_and_released() {
        let heap = NativeHeap::new();
        let broken = fixtures::simple_mesh(
            vec![fixtures::vertex([0.0; 3], [0.0, 0.0, 1.0], [1.0; 4])],
            vec![fixtures::triangle(0, 1, 2)],
        );
        let err = flatten_simple_mesh(&heap.allocate(broken), false).unwrap_err();
        assert!(matches!(err, NativeError::InvalidGeometry(_)));
        assert!(heap.stats().is_balanced());

        let negative = fixtures::simple_mesh(
            vec![fixtures::vertex([0.0; 3], [0.0, 0.0, 1.0], [1.0; 4])],
            vec![fixtures::triangle(0, -1, 0)],
        );
        assert!(flatten_simple_mesh(&heap.allocate(negative), false).is_err());
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn oriented_instances_at_or_above_the_ceiling_are_dropped() {
        let heap = NativeHeap::new();
        let node = single_group_mesh(
            sized_b_instances(&[1.0, 4.9, 5.0, 5.1, 20.0]),
            fixtures::empty_mesh(),
        );
        let mesh = flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::standard(5.0))
            .unwrap();

        let instances = mesh.layers[0][0].instances.as_ref().unwrap();
        assert_eq!(instances.count(), 2);
        let third_sizes: Vec<f32> = instances.sizes.chunks(3).map(|size| size[2]).collect();
        assert_eq!(third_sizes, vec![1.0, 4.9]);
        assert_eq!(mesh.layers[0][0].colors.len(), 8);
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn unbounded_presets_keep_every_oriented_instance() {
        let heap = NativeHeap::new();
        let node = single_group_mesh(
            sized_b_instances(&[1.0, 4.9, 5.0, 5.1, 20.0]),
            fixtures::empty_mesh(),
        );
        let mesh =
            flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::permuted()).unwrap();
        assert_eq!(mesh.layers[0][0].instances.as_ref().unwrap().count(), 5);
    }

    #[test]
    fn empty_markup_yields_a_single_layer() {
        let heap = NativeHeap::new();
        let node = single_group_mesh(sized_b_instances(&[1.0]), fixtures::empty_mesh());
        let mesh = flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::standard(5.0))
            .unwrap();
        assert_eq!(mesh.layer_count(), 1);
        assert!(heap.stats().is_balanced());

        let node = single_group_mesh(sized_b_instances(&[1.0]), fixtures::quad_mesh());
        let mesh = flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::standard(5.0))
            .unwrap();
        assert_eq!(mesh.layer_count(), 2);
        assert_eq!(mesh.layers[1][0].primitive_kind, PrimitiveKind::Triangles);
        assert_eq!(mesh.layers[1][0].colors.len(), 16);
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn simple_instances_get_the_identity_orientation_and_oriented_ones_keep_theirs() {
        let heap = NativeHeap::new();
        let node = fixtures::instanced_mesh(
            vec![fixtures::geom_group(
                "bonds",
                fixtures::quad_mesh(),
                vec![fixtures::instance_a([1.0, 2.0, 3.0], [0.5, 0.5, 0.5])],
                vec![fixtures::instance_b([0.0, 0.0, 0.0], [0.2, 0.2, 1.5])],
            )],
            fixtures::empty_mesh(),
        );
        let mesh =
            flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::standard(5.0)).unwrap();
        let group = &mesh.layers[0][0];
        let instances = group.instances.as_ref().unwrap();
        assert_eq!(instances.origins[..3], [1.0, 2.0, 3.0]);
        assert_eq!(instances.orientations[..16], IDENTITY_ORIENTATION);
        // Row-major: the second value of the first row of the rotation.
        assert_eq!(instances.orientations[17], -1.0);
        assert_eq!(instances.orientations[20], 1.0);
        assert_eq!(group.colors, vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert!(group.normals.len() == group.positions.len());
    }

    #[test]
    fn spherical_atoms_group_is_always_point_instanced() {
        let heap = NativeHeap::new();
        let node = fixtures::instanced_mesh(
            vec![
                fixtures::geom_group(
                    SPHERICAL_ATOMS_GROUP,
                    fixtures::quad_mesh(),
                    vec![fixtures::instance_a([0.0; 3], [1.7; 3])],
                    Vec::new(),
                ),
                fixtures::geom_group("bonds", fixtures::quad_mesh(), Vec::new(), Vec::new()),
            ],
            fixtures::empty_mesh(),
        );
        let mesh =
            flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::standard(5.0)).unwrap();
        assert_eq!(mesh.layers[0][0].primitive_kind, PrimitiveKind::PerfectSpheres);
        assert_eq!(mesh.layers[0][1].primitive_kind, PrimitiveKind::Triangles);
    }

    #[test]
    fn sphere_preset_marks_every_group() {
        let heap = NativeHeap::new();
        let node = single_group_mesh(Vec::new(), fixtures::empty_mesh());
        let mesh =
            flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::perfect_spheres())
                .unwrap();
        assert_eq!(mesh.layers[0][0].primitive_kind, PrimitiveKind::PerfectSpheres);
    }

    #[test]
    fn malformed_orientation_is_an_arity_error() {
        let heap = NativeHeap::new();
        let bad_instance = NativeNode::object("instancing_data_type_B_t")
            .field("position", [0.0, 0.0, 0.0])
            .field("colour", [1.0, 1.0, 1.0, 1.0])
            .field("size", [0.2, 0.2, 1.0])
            .field("orientation", NativeNode::Matrix(vec![vec![1.0, 0.0, 0.0]; 3]))
            .build();
        let node = single_group_mesh(vec![bad_instance], fixtures::empty_mesh());
        let err = flatten_instanced_mesh(&heap.allocate(node), InstancedPreset::permuted())
            .unwrap_err();
        assert!(matches!(err, NativeError::Arity { expected: 16, found: 9, .. }));
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn status_pair_carries_status_and_mesh() {
        let heap = NativeHeap::new();
        let node = NativeNode::pair(
            1,
            single_group_mesh(sized_b_instances(&[1.0, 7.0]), fixtures::empty_mesh()),
        );
        let payload = status_instanced_mesh_pair(
            heap.allocate(node),
            &MaterializeOptions::default(),
        )
        .unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["status"], json!(1));
        let origins = &value["mesh"]["layers"][0][0]["instances"]["origins"];
        assert_eq!(origins.as_array().map(Vec::len), Some(3));
        assert!(heap.stats().is_balanced());
    }
}
