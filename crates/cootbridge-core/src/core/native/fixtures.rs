//! Builders for engine-shaped native graphs used across the test suites.

use super::NativeNode;

pub fn residue_spec(chain: &str, res_no: i64) -> NativeNode {
    NativeNode::object("residue_spec_t")
        .field("chain_id", chain)
        .field("res_no", res_no)
        .field("ins_code", "")
        .field("model_number", 1)
        .build()
}

pub fn atom_spec(chain: &str, res_no: i64, atom_name: &str) -> NativeNode {
    NativeNode::object("atom_spec_t")
        .field("chain_id", chain)
        .field("res_no", res_no)
        .field("ins_code", "")
        .field("atom_name", atom_name)
        .field("alt_conf", "")
        .field("int_user_data", 0)
        .field("float_user_data", 0.0)
        .field("string_user_data", "")
        .field("model_number", 1)
        .build()
}

pub fn vertex(pos: [f64; 3], normal: [f64; 3], color: [f64; 4]) -> NativeNode {
    NativeNode::object("vn_vertex")
        .field("pos", pos)
        .field("normal", normal)
        .field("color", color)
        .build()
}

pub fn triangle(a: i64, b: i64, c: i64) -> NativeNode {
    NativeNode::object("g_triangle")
        .field("point_id", [a, b, c])
        .build()
}

pub fn simple_mesh(vertices: Vec<NativeNode>, triangles: Vec<NativeNode>) -> NativeNode {
    NativeNode::object("simple_mesh_t")
        .field("vertices", NativeNode::vector(vertices))
        .field("triangles", NativeNode::vector(triangles))
        .build()
}

/// A unit quad made of two triangles with distinct, non-zero normals.
pub fn quad_mesh() -> NativeNode {
    let grey = [0.5, 0.5, 0.5, 1.0];
    simple_mesh(
        vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], grey),
            vertex([1.0, 0.0, 0.0], [0.0, 0.2, 0.9], grey),
            vertex([1.0, 1.0, 0.0], [0.1, 0.0, 0.9], grey),
            vertex([0.0, 1.0, 0.0], [-0.3, 0.4, 0.8], grey),
        ],
        vec![triangle(0, 1, 2), triangle(0, 2, 3)],
    )
}

pub fn empty_mesh() -> NativeNode {
    simple_mesh(Vec::new(), Vec::new())
}

pub fn instance_a(position: [f64; 3], size: [f64; 3]) -> NativeNode {
    NativeNode::object("instancing_data_type_A_t")
        .field("position", position)
        .field("colour", [1.0, 0.0, 0.0, 1.0])
        .field("size", size)
        .build()
}

pub fn instance_b(position: [f64; 3], size: [f64; 3]) -> NativeNode {
    let orientation = vec![
        vec![0.0, -1.0, 0.0, 0.0],
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 0.0, 1.0],
    ];
    NativeNode::object("instancing_data_type_B_t")
        .field("position", position)
        .field("colour", [0.0, 1.0, 0.0, 1.0])
        .field("size", size)
        .field("orientation", NativeNode::Matrix(orientation))
        .build()
}

pub fn geom_group(
    name: &str,
    mesh: NativeNode,
    instances_a: Vec<NativeNode>,
    instances_b: Vec<NativeNode>,
) -> NativeNode {
    let part = |name: &str| match &mesh {
        NativeNode::Object { fields, .. } => fields
            .get(name)
            .map(|node| (**node).clone())
            .unwrap_or_else(|| NativeNode::Vector(Vec::new())),
        _ => NativeNode::Vector(Vec::new()),
    };
    NativeNode::object("instanced_geometry_t")
        .field("name", name)
        .field("vertices", part("vertices"))
        .field("triangles", part("triangles"))
        .field("instancing_data_A", NativeNode::vector(instances_a))
        .field("instancing_data_B", NativeNode::vector(instances_b))
        .build()
}

pub fn instanced_mesh(groups: Vec<NativeNode>, markup: NativeNode) -> NativeNode {
    NativeNode::object("instanced_mesh_t")
        .field("geom", NativeNode::vector(groups))
        .field("markup", markup)
        .build()
}

pub fn rama_residue(chain: &str, res_no: i64, name: &str, allowed: bool) -> NativeNode {
    NativeNode::object("phi_psi_prob_t")
        .field(
            "phi_psi",
            NativeNode::object("phi_psi_t")
                .field("chain_id", chain)
                .field("ins_code", "")
                .field("residue_number", res_no)
                .field("phi", -60.0 - res_no as f64)
                .field("psi", -45.0 + res_no as f64),
        )
        .field("residue_name", name)
        .field("is_allowed_flag", allowed)
        .build()
}

/// Ramachandran data for a two-chain structure: A1 (ALA), A2 (PRO, outlier), B1 (GLY).
pub fn two_chain_rama() -> NativeNode {
    NativeNode::vector(vec![
        rama_residue("A", 1, "ALA", true),
        rama_residue("A", 2, "PRO", false),
        rama_residue("B", 1, "GLY", true),
    ])
}

pub fn validation_information(chains: &[(&str, &[(i64, f64)])]) -> NativeNode {
    let cviv = chains.iter().map(|(chain, residues)| {
        let rviv = residues.iter().map(|&(res_no, value)| {
            NativeNode::object("residue_validation_information_t")
                .field("residue_spec", residue_spec(chain, res_no))
                .field("function_value", value)
                .field("label", format!("{}{}", chain, res_no))
                .build()
        });
        NativeNode::object("chain_validation_information_t")
            .field("chain_id", *chain)
            .field("rviv", NativeNode::vector(rviv))
            .build()
    });
    NativeNode::object("validation_information_t")
        .field("name", "density fit")
        .field("cviv", NativeNode::vector(cviv))
        .build()
}
