use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidueSpecRecord {
    pub res_num: i64,
    pub ins_code: String,
    pub model_number: i64,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomSpecRecord {
    pub chain_id: String,
    pub res_no: i64,
    pub ins_code: String,
    pub atom_name: String,
    pub alt_conf: String,
    pub int_user_data: i64,
    pub float_user_data: f64,
    pub string_user_data: String,
    pub model_number: i64,
}

/// A selection/colour pair as produced by the engine's colour rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourRule {
    #[serde(rename = "first")]
    pub selection: String,
    #[serde(rename = "second")]
    pub colour: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCentreInfo {
    pub updated_centre: [f64; 3],
    pub success: bool,
    pub suggested_radius: f64,
    pub suggested_contour_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramInfo {
    pub counts: Vec<i64>,
    pub bin_width: f64,
    pub base: f64,
}

/// Column assignment suggested by the engine when reading an MTZ file automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoReadMtzInfo {
    pub idx: i64,
    #[serde(rename = "F")]
    pub f: String,
    pub phi: String,
    pub w: String,
    #[serde(rename = "F_obs")]
    pub f_obs: String,
    #[serde(rename = "sigF_obs")]
    pub sig_f_obs: String,
    #[serde(rename = "Rfree")]
    pub r_free: String,
    pub weights_used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetryOperator {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub as_string: String,
    pub isym: i64,
    pub us: i64,
    pub ws: i64,
    pub vs: i64,
    /// Row-major 4x4 operator matrix.
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCorrelation {
    #[serde(flatten)]
    pub residue: ResidueSpecRecord,
    pub n: i64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmrrccStats {
    #[serde(rename = "All atoms")]
    pub all_atoms: Vec<DensityCorrelation>,
    #[serde(rename = "Side-chains")]
    pub side_chains: Vec<DensityCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RamachandranRecord {
    pub chain_id: String,
    pub ins_code: String,
    pub seq_num: i64,
    pub restype: String,
    pub is_outlier: bool,
    pub phi: f64,
    pub psi: f64,
    #[serde(rename = "is_pre_pro")]
    pub is_pre_pro: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub chain_id: String,
    pub ins_code: String,
    pub seq_num: i64,
    pub restype: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestingPlace {
    pub model_number: i64,
    pub chain_id: String,
    pub ins_code: String,
    pub res_num: i64,
    pub feature_type: String,
    pub feature_value: f64,
    pub button_label: String,
    pub badness: f64,
    pub coord_x: f64,
    pub coord_y: f64,
    pub coord_z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedResidue {
    pub chain_id: String,
    pub ins_code: String,
    pub seq_num: i64,
    pub restype: String,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub reference: AlignedResidue,
    pub moving: AlignedResidue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperposeResults {
    pub reference_sequence: String,
    pub moving_sequence: String,
    // The host reads this key with the double "p".
    #[serde(rename = "supperposeInfo")]
    pub superpose_info: String,
    pub aligned_pairs_data: Vec<AlignedPair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point3,
    pub end: Point3,
    pub dist: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HBondAtom {
    pub serial: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub charge: f64,
    pub occ: f64,
    pub b_iso: f64,
    pub element: String,
    pub name: String,
    pub model: i64,
    pub chain: String,
    pub res_no: i64,
    pub residue_name: String,
    #[serde(rename = "altLoc")]
    pub alt_loc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HBond {
    pub hb_hydrogen: HBondAtom,
    pub donor: HBondAtom,
    pub acceptor: HBondAtom,
    pub donor_neigh: HBondAtom,
    pub acceptor_neigh: HBondAtom,
    pub angle_1: f64,
    pub angle_2: f64,
    pub angle_3: f64,
    pub dist: f64,
    pub ligand_atom_is_donor: bool,
    pub hydrogen_is_ligand_atom: bool,
    pub bond_has_hydrogen_flag: bool,
}
