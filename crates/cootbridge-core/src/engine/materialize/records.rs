//! Materializers for structured validation and analysis results.

use super::{MaterializeOptions, ResultPayload, collect_sequence};
use crate::core::models::records::{
    AlignedPair, AlignedResidue, AtomSpecRecord, AutoReadMtzInfo, DensityCorrelation, HBond,
    HBondAtom, HistogramInfo, InterestingPlace, LineSegment, MapCentreInfo, MmrrccStats, Point3,
    RamachandranRecord, ResidueSpecRecord, SuperposeResults, SymmetryOperator, ValidationRecord,
};
use crate::core::native::{NativeError, Owned};

/// Residue type reported for records whose source carries no residue name.
const UNKNOWN_RESTYPE: &str = "UNK";

fn residue_spec(spec: &Owned) -> Result<ResidueSpecRecord, NativeError> {
    Ok(ResidueSpecRecord {
        res_num: spec.int("res_no")?,
        ins_code: spec.string("ins_code")?,
        model_number: spec.int("model_number")?,
        chain_id: spec.string("chain_id")?,
    })
}

fn point(source: &Owned) -> Result<Point3, NativeError> {
    Ok(Point3 {
        x: source.float("x")?,
        y: source.float("y")?,
        z: source.float("z")?,
    })
}

pub(super) fn residue_specs(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    Ok(ResultPayload::ResidueSpecs(collect_sequence(&result, residue_spec)?))
}

pub(super) fn atom_specs(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let specs = collect_sequence(&result, |spec| {
        Ok(AtomSpecRecord {
            chain_id: spec.string("chain_id")?,
            res_no: spec.int("res_no")?,
            ins_code: spec.string("ins_code")?,
            atom_name: spec.string("atom_name")?,
            alt_conf: spec.string("alt_conf")?,
            int_user_data: spec.int("int_user_data")?,
            float_user_data: spec.float("float_user_data")?,
            string_user_data: spec.string("string_user_data")?,
            model_number: spec.int("model_number")?,
        })
    })?;
    Ok(ResultPayload::AtomSpecs(specs))
}

pub(super) fn map_centre_info(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let centre = point(&result.field("updated_centre")?)?;
    Ok(ResultPayload::MapCentre(MapCentreInfo {
        updated_centre: [centre.x, centre.y, centre.z],
        success: result.boolean("success")?,
        suggested_radius: result.float("suggested_radius")?,
        suggested_contour_level: result.float("suggested_contour_level")?,
    }))
}

pub(super) fn histogram_info(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let counts = {
        let counts = result.field("counts")?;
        collect_sequence(&counts, Owned::as_int)?
    };
    Ok(ResultPayload::Histogram(HistogramInfo {
        counts,
        bin_width: result.float("bin_width")?,
        base: result.float("base")?,
    }))
}

pub(super) fn auto_read_mtz_info(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let infos = collect_sequence(&result, |info| {
        Ok(AutoReadMtzInfo {
            idx: info.int("idx")?,
            f: info.string("F")?,
            phi: info.string("phi")?,
            w: info.string("w")?,
            f_obs: info.string("F_obs")?,
            sig_f_obs: info.string("sigF_obs")?,
            r_free: info.string("Rfree")?,
            weights_used: info.boolean("weights_used")?,
        })
    })?;
    Ok(ResultPayload::AutoReadMtz(infos))
}

/// Symmetry results pair a list of (operator, cell shift) entries with a list of operator
/// matrices; the two lists are matched by index.
pub(super) fn symmetry(result: Owned, _: &MaterializeOptions) -> Result<ResultPayload, NativeError> {
    let info = result.first()?;
    let operators = info.field("symm_trans")?;
    let matrices = result.second()?;

    let len = operators.len()?;
    let mut records = Vec::with_capacity(len);
    for index in 0..len {
        let entry = operators.get(index)?;
        let operator = entry.first()?;
        let shift = entry.second()?;
        let matrix = matrices.get(index)?;
        records.push(SymmetryOperator {
            x: operator.float("x")?,
            y: operator.float("y")?,
            z: operator.float("z")?,
            as_string: operator.string("symm_as_string")?,
            isym: operator.int("isym")?,
            us: shift.int("us")?,
            ws: shift.int("ws")?,
            vs: shift.int("vs")?,
            matrix: matrix.as_matrix()?,
        });
    }
    Ok(ResultPayload::Symmetry(records))
}

fn density_correlations(stats: &Owned) -> Result<Vec<DensityCorrelation>, NativeError> {
    let keys = stats.keys()?;
    collect_sequence(&keys, |key| {
        let value = stats.lookup(key)?;
        Ok(DensityCorrelation {
            residue: residue_spec(key)?,
            n: value.int("n")?,
            correlation: value.float("correlation")?,
        })
    })
}

pub(super) fn mmrrcc_stats(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let all_atoms = density_correlations(&result.first()?)?;
    let side_chains = density_correlations(&result.second()?)?;
    Ok(ResultPayload::Mmrrcc(MmrrccStats {
        all_atoms,
        side_chains,
    }))
}

pub(super) fn ramachandran_data(
    result: Owned,
    options: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let len = result.len()?;
    let mut records = Vec::with_capacity(len);
    for index in 0..len {
        let residue = result.get(index)?;
        let phi_psi = residue.field("phi_psi")?;
        let chain_id = phi_psi.string("chain_id")?;
        if !options.chain_matches(&chain_id) {
            continue;
        }
        let restype = residue.string("residue_name")?;
        records.push(RamachandranRecord {
            chain_id,
            ins_code: phi_psi.string("ins_code")?,
            seq_num: phi_psi.int("residue_number")?,
            is_outlier: !residue.boolean("is_allowed_flag")?,
            phi: phi_psi.float("phi")?,
            psi: phi_psi.float("psi")?,
            is_pre_pro: restype == "PRO",
            restype,
        });
    }
    Ok(ResultPayload::Ramachandran(records))
}

pub(super) fn validation_data(
    result: Owned,
    options: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let chains = result.field("cviv")?;
    let mut records = Vec::new();
    for chain_index in 0..chains.len()? {
        let chain = chains.get(chain_index)?;
        if !options.chain_matches(&chain.string("chain_id")?) {
            continue;
        }
        let residues = chain.field("rviv")?;
        for residue_index in 0..residues.len()? {
            let residue = residues.get(residue_index)?;
            let spec = residue.field("residue_spec")?;
            records.push(ValidationRecord {
                chain_id: spec.string("chain_id")?,
                ins_code: spec.string("ins_code")?,
                seq_num: spec.int("res_no")?,
                restype: UNKNOWN_RESTYPE.to_string(),
                value: residue.float("function_value")?,
            });
        }
    }
    Ok(ResultPayload::Validation(records))
}

pub(super) fn interesting_places(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let places = collect_sequence(&result, |place| {
        let spec = residue_spec(&place.field("residue_spec")?)?;
        Ok(InterestingPlace {
            model_number: spec.model_number,
            chain_id: spec.chain_id,
            ins_code: spec.ins_code,
            res_num: spec.res_num,
            feature_type: place.string("feature_type")?,
            feature_value: place.float("feature_value")?,
            button_label: place.string("button_label")?,
            badness: place.float("badness")?,
            coord_x: place.float("x")?,
            coord_y: place.float("y")?,
            coord_z: place.float("z")?,
        })
    })?;
    Ok(ResultPayload::InterestingPlaces(places))
}

fn aligned_residue(info: &Owned) -> Result<AlignedResidue, NativeError> {
    let spec = residue_spec(&info.field("residue_spec")?)?;
    Ok(AlignedResidue {
        chain_id: spec.chain_id,
        ins_code: spec.ins_code,
        seq_num: spec.res_num,
        restype: UNKNOWN_RESTYPE.to_string(),
        value: info.float("function_value")?,
        label: info.string("label")?,
    })
}

pub(super) fn superpose_results(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let (reference_sequence, moving_sequence) = {
        let alignment = result.field("alignment")?;
        let reference = alignment.first()?.as_string()?;
        let moving = alignment.second()?.as_string()?;
        (reference, moving)
    };
    let pairs = result.field("aligned_pairs")?;
    let aligned_pairs_data = collect_sequence(&pairs, |pair| {
        let reference = aligned_residue(&pair.first()?)?;
        let moving = aligned_residue(&pair.second()?)?;
        Ok(AlignedPair { reference, moving })
    })?;
    Ok(ResultPayload::Superpose(SuperposeResults {
        reference_sequence,
        moving_sequence,
        superpose_info: result.string("superpose_info")?,
        aligned_pairs_data,
    }))
}

pub(super) fn lines_bonds_box(
    result: Owned,
    _: &MaterializeOptions,
) -> Result<ResultPayload, NativeError> {
    let groups = result.field("line_segments")?;
    let boxes = collect_sequence(&groups, |group| {
        collect_sequence(group, |segment| {
            Ok(LineSegment {
                start: point(&segment.field("start")?)?,
                end: point(&segment.field("finish")?)?,
                dist: segment.float("amplitude")?,
            })
        })
    })?;
    Ok(ResultPayload::LineBoxes(boxes))
}

fn hbond_atom(bond: &Owned, role: &str) -> Result<HBondAtom, NativeError> {
    let atom = bond.field(role)?;
    Ok(HBondAtom {
        serial: atom.int("serial")?,
        x: atom.float("x")?,
        y: atom.float("y")?,
        z: atom.float("z")?,
        charge: atom.float("charge")?,
        occ: atom.float("occ")?,
        b_iso: atom.float("b_iso")?,
        element: atom.string("element")?,
        name: atom.string("name")?,
        model: atom.int("model")?,
        chain: atom.string("chain")?,
        res_no: atom.int("res_no")?,
        residue_name: atom.string("residue_name")?,
        alt_loc: atom.string("alt_loc")?,
    })
}

pub(super) fn hbonds(result: Owned, _: &MaterializeOptions) -> Result<ResultPayload, NativeError> {
    let bonds = collect_sequence(&result, |bond| {
        Ok(HBond {
            hb_hydrogen: hbond_atom(bond, "hb_hydrogen")?,
            donor: hbond_atom(bond, "donor")?,
            acceptor: hbond_atom(bond, "acceptor")?,
            donor_neigh: hbond_atom(bond, "donor_neigh")?,
            acceptor_neigh: hbond_atom(bond, "acceptor_neigh")?,
            angle_1: bond.float("angle_1")?,
            angle_2: bond.float("angle_2")?,
            angle_3: bond.float("angle_3")?,
            dist: bond.float("dist")?,
            ligand_atom_is_donor: bond.boolean("ligand_atom_is_donor")?,
            hydrogen_is_ligand_atom: bond.boolean("hydrogen_is_ligand_atom")?,
            bond_has_hydrogen_flag: bond.boolean("bond_has_hydrogen_flag")?,
        })
    })?;
    Ok(ResultPayload::HBonds(bonds))
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::core::native::fixtures;
    use crate::core::native::{HeapEvent, NativeHeap, NativeNode};
    use crate::engine::materialize::Materializer;
    use serde_json::json;
    use std::rc::Rc;

    fn coord(x: f64, y: f64, z: f64) -> NativeNode {
        NativeNode::object("Cartesian")
            .field("x", x)
            .field("y", y)
            .field("z", z)
            .build()
    }

    pub(crate) fn map_centre_node() -> NativeNode {
        NativeNode::object("map_molecule_centre_info_t")
            .field("updated_centre", coord(10.0, 20.0, 30.0))
            .field("success", true)
            .field("suggested_radius", 18.5)
            .field("suggested_contour_level", 0.42)
            .build()
    }

    pub(crate) fn histogram_node() -> NativeNode {
        NativeNode::object("histogram_info_t")
            .field("counts", NativeNode::vector(vec![3, 9, 1]))
            .field("bin_width", 0.1)
            .field("base", -0.5)
            .build()
    }

    pub(crate) fn auto_read_mtz_node() -> NativeNode {
        NativeNode::vector(vec![
            NativeNode::object("auto_read_mtz_info_t")
                .field("idx", 0)
                .field("F", "FWT")
                .field("phi", "PHWT")
                .field("w", "")
                .field("F_obs", "FP")
                .field("sigF_obs", "SIGFP")
                .field("Rfree", "FREE")
                .field("weights_used", false)
                .build(),
        ])
    }

    fn operator_matrix(shift: f64) -> NativeNode {
        NativeNode::Matrix(vec![
            vec![1.0, 0.0, 0.0, shift],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub(crate) fn symmetry_node() -> NativeNode {
        let entry = |isym: i64, repr: &str, us: i64| {
            NativeNode::pair(
                NativeNode::object("symm_trans_t")
                    .field("x", 0)
                    .field("y", 0)
                    .field("z", 1)
                    .field("symm_as_string", repr)
                    .field("isym", isym),
                NativeNode::object("Cell_Translation")
                    .field("us", us)
                    .field("ws", 0)
                    .field("vs", -1),
            )
        };
        NativeNode::pair(
            NativeNode::object("symmetry_info_t")
                .field("cell", NativeNode::from([40.0, 50.0, 60.0, 90.0, 90.0, 90.0]))
                .field(
                    "symm_trans",
                    NativeNode::vector(vec![entry(0, "X,Y,Z", 0), entry(1, "-X,Y+1/2,-Z", 1)]),
                ),
            NativeNode::vector(vec![operator_matrix(0.0), operator_matrix(1.0)]),
        )
    }

    fn correlation(n: i64, value: f64) -> NativeNode {
        NativeNode::object("density_correlation_stats_info_t")
            .field("n", n)
            .field("correlation", value)
            .build()
    }

    pub(crate) fn mmrrcc_node() -> NativeNode {
        NativeNode::pair(
            NativeNode::map(vec![
                (fixtures::residue_spec("A", 1), correlation(8, 0.91)),
                (fixtures::residue_spec("A", 2), correlation(11, 0.83)),
            ]),
            NativeNode::map(vec![(fixtures::residue_spec("A", 2), correlation(4, 0.62))]),
        )
    }

    pub(crate) fn interesting_places_node() -> NativeNode {
        NativeNode::vector(vec![
            NativeNode::object("interesting_place_t")
                .field("residue_spec", fixtures::residue_spec("A", 7))
                .field("feature_type", "difference map peak")
                .field("feature_value", 4.2)
                .field("button_label", "Peak at A7")
                .field("badness", 1.5)
                .field("x", 1.0)
                .field("y", 2.0)
                .field("z", 3.0)
                .build(),
        ])
    }

    fn res_val_info(chain: &str, res_no: i64, label: &str) -> NativeNode {
        NativeNode::object("residue_validation_information_t")
            .field("residue_spec", fixtures::residue_spec(chain, res_no))
            .field("function_value", 0.5)
            .field("label", label)
            .build()
    }

    pub(crate) fn superpose_node() -> NativeNode {
        NativeNode::object("superpose_results_t")
            .field("alignment", NativeNode::pair("MKV-L", "MKVAL"))
            .field("superpose_info", "RMSD 0.42 over 4 residues")
            .field(
                "aligned_pairs",
                NativeNode::vector(vec![
                    NativeNode::pair(res_val_info("A", 1, "M"), res_val_info("B", 1, "M")),
                    NativeNode::pair(res_val_info("A", 2, "K"), res_val_info("B", 2, "K")),
                ]),
            )
            .build()
    }

    fn segment(start: f64, finish: f64, amplitude: f64) -> NativeNode {
        NativeNode::object("line_segment_t")
            .field("start", coord(start, 0.0, 0.0))
            .field("finish", coord(finish, 0.0, 0.0))
            .field("amplitude", amplitude)
            .build()
    }

    pub(crate) fn lines_box_node() -> NativeNode {
        NativeNode::object("generic_3d_lines_bonds_box_t")
            .field(
                "line_segments",
                NativeNode::vector(vec![
                    NativeNode::vector(vec![segment(0.0, 1.0, 0.2), segment(1.0, 2.0, 0.3)]),
                    NativeNode::vector(vec![segment(5.0, 6.0, 0.9)]),
                ]),
            )
            .build()
    }

    fn hbond_atom_node(name: &str, res_no: i64) -> NativeNode {
        NativeNode::object("hbond_atom_t")
            .field("serial", res_no * 10)
            .field("x", 1.0)
            .field("y", 2.0)
            .field("z", 3.0)
            .field("charge", 0.0)
            .field("occ", 1.0)
            .field("b_iso", 20.0)
            .field("element", &name[..1])
            .field("name", name)
            .field("model", 1)
            .field("chain", "A")
            .field("res_no", res_no)
            .field("residue_name", "SER")
            .field("alt_loc", "")
            .build()
    }

    pub(crate) fn hbonds_node() -> NativeNode {
        NativeNode::vector(vec![
            NativeNode::object("moorhen_hbond")
                .field("hb_hydrogen", hbond_atom_node("HG", 4))
                .field("donor", hbond_atom_node("OG", 4))
                .field("acceptor", hbond_atom_node("O", 9))
                .field("donor_neigh", hbond_atom_node("CB", 4))
                .field("acceptor_neigh", hbond_atom_node("C", 9))
                .field("angle_1", 120.0)
                .field("angle_2", 110.0)
                .field("angle_3", 150.0)
                .field("dist", 2.9)
                .field("ligand_atom_is_donor", false)
                .field("hydrogen_is_ligand_atom", false)
                .field("bond_has_hydrogen_flag", true)
                .build(),
        ])
    }

    fn run(
        materializer: Materializer,
        node: NativeNode,
        options: &MaterializeOptions,
    ) -> serde_json::Value {
        let heap = NativeHeap::new();
        let payload = materializer(heap.allocate(node), options).unwrap();
        assert!(heap.stats().is_balanced());
        serde_json::to_value(&payload).unwrap()
    }

    #[test]
    fn ramachandran_scenario_keeps_only_the_requested_chain() {
        let heap = NativeHeap::with_journal();
        let payload = ramachandran_data(
            heap.allocate(fixtures::two_chain_rama()),
            &MaterializeOptions::for_chain("A"),
        )
        .unwrap();

        let ResultPayload::Ramachandran(records) = payload else {
            panic!("expected ramachandran records");
        };
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.chain_id == "A"));
        assert_eq!(records[0].seq_num, 1);
        assert!(!records[0].is_outlier);
        assert!(!records[0].is_pre_pro);
        assert_eq!(records[1].restype, "PRO");
        assert!(records[1].is_outlier);
        assert!(records[1].is_pre_pro);

        let released_residues = heap
            .journal()
            .iter()
            .filter(|event| {
                matches!(event, HeapEvent::Released { class, .. } if class == "phi_psi_prob_t")
            })
            .count();
        assert_eq!(released_residues, 3);
        assert!(heap.stats().is_balanced());
        // Result, three residues, three phi/psi objects.
        assert_eq!(heap.stats().acquired, 7);
    }

    #[test]
    fn ramachandran_without_a_chain_filter_keeps_everything() {
        let value = run(
            ramachandran_data,
            fixtures::two_chain_rama(),
            &MaterializeOptions::default(),
        );
        assert_eq!(value.as_array().map(Vec::len), Some(3));
        assert_eq!(value[2]["chainId"], json!("B"));
        assert_eq!(value[2]["phi"], json!(-61.0));
    }

    #[test]
    fn filtered_validation_chain_is_released_but_absent() {
        let heap = NativeHeap::new();
        let node = fixtures::validation_information(&[
            ("A", &[(1, 0.9), (2, 0.4)]),
            ("B", &[(1, 0.7)]),
        ]);
        let payload =
            validation_data(heap.allocate(node), &MaterializeOptions::for_chain("B")).unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!([{"chainId": "B", "insCode": "", "seqNum": 1, "restype": "UNK", "value": 0.7}])
        );
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn mmrrcc_stats_walk_both_maps() {
        let value = run(mmrrcc_stats, mmrrcc_node(), &MaterializeOptions::default());
        assert_eq!(value["All atoms"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["All atoms"][1]["resNum"], json!(2));
        assert_eq!(value["All atoms"][1]["correlation"], json!(0.83));
        assert_eq!(value["Side-chains"][0]["n"], json!(4));
    }

    #[test]
    fn symmetry_pairs_operators_with_matrices_by_index() {
        let value = run(symmetry, symmetry_node(), &MaterializeOptions::default());
        assert_eq!(value[1]["asString"], json!("-X,Y+1/2,-Z"));
        assert_eq!(value[1]["us"], json!(1));
        assert_eq!(value[1]["vs"], json!(-1));
        assert_eq!(value[1]["matrix"][0][3], json!(1.0));
        assert_eq!(value[0]["matrix"][0][3], json!(0.0));
    }

    #[test]
    fn symmetry_with_too_few_matrices_is_an_error() {
        let heap = NativeHeap::new();
        let node = match symmetry_node() {
            NativeNode::Pair(first, _) => NativeNode::Pair(
                first,
                Rc::new(NativeNode::vector(vec![operator_matrix(0.0)])),
            ),
            other => other,
        };
        let err = symmetry(heap.allocate(node), &MaterializeOptions::default()).unwrap_err();
        assert!(matches!(err, NativeError::IndexOutOfRange { index: 1, len: 1, .. }));
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn superpose_results_keep_the_host_key_spelling() {
        let value = run(superpose_results, superpose_node(), &MaterializeOptions::default());
        assert_eq!(value["referenceSequence"], json!("MKV-L"));
        assert_eq!(value["movingSequence"], json!("MKVAL"));
        assert_eq!(value["supperposeInfo"], json!("RMSD 0.42 over 4 residues"));
        assert_eq!(value["alignedPairsData"][1]["moving"]["chainId"], json!("B"));
        assert_eq!(value["alignedPairsData"][1]["reference"]["label"], json!("K"));
    }

    #[test]
    fn line_boxes_keep_their_grouping() {
        let value = run(lines_bonds_box, lines_box_node(), &MaterializeOptions::default());
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0][1]["start"]["x"], json!(1.0));
        assert_eq!(value[0][1]["end"]["x"], json!(2.0));
        assert_eq!(value[1][0]["dist"], json!(0.9));
    }

    #[test]
    fn scalar_records_copy_every_field() {
        let centre = run(map_centre_info, map_centre_node(), &MaterializeOptions::default());
        assert_eq!(centre["updated_centre"], json!([10.0, 20.0, 30.0]));
        assert_eq!(centre["suggested_contour_level"], json!(0.42));

        let histogram = run(histogram_info, histogram_node(), &MaterializeOptions::default());
        assert_eq!(histogram["counts"], json!([3, 9, 1]));
        assert_eq!(histogram["base"], json!(-0.5));

        let places = run(
            interesting_places,
            interesting_places_node(),
            &MaterializeOptions::default(),
        );
        assert_eq!(places[0]["featureType"], json!("difference map peak"));
        assert_eq!(places[0]["resNum"], json!(7));
        assert_eq!(places[0]["coordZ"], json!(3.0));
    }

    #[test]
    fn hbonds_copy_all_five_atoms() {
        let value = run(hbonds, hbonds_node(), &MaterializeOptions::default());
        assert_eq!(value[0]["donor"]["name"], json!("OG"));
        assert_eq!(value[0]["acceptor_neigh"]["res_no"], json!(9));
        assert_eq!(value[0]["hb_hydrogen"]["altLoc"], json!(""));
        assert_eq!(value[0]["bond_has_hydrogen_flag"], json!(true));
    }

    #[test]
    fn atom_specs_and_mtz_info_copy_through() {
        let specs = run(
            atom_specs,
            NativeNode::vector(vec![fixtures::atom_spec("A", 3, " CA ")]),
            &MaterializeOptions::default(),
        );
        assert_eq!(specs[0]["atom_name"], json!(" CA "));
        assert_eq!(specs[0]["res_no"], json!(3));

        let mtz = run(auto_read_mtz_info, auto_read_mtz_node(), &MaterializeOptions::default());
        assert_eq!(mtz[0]["Rfree"], json!("FREE"));
    }
}
