//! Archive loading, OBJ export and AMASS binding, exercised end to end on
//! miniature models and synthetic npz files.

use approx::assert_abs_diff_eq;
use ndarray as nd;
use ndarray::prelude::*;
use ndarray_npy::NpzWriter;
use smplrig_core::common::body::Body;
use smplrig_core::common::metadata::{
    ModelConfig, SMPLH_JOINT_NAMES, SMPLH_PARENTS, SMPLX_JOINT_NAMES, SMPLX_PARENTS,
    SMPL_JOINT_NAMES, SMPL_PARENTS,
};
use smplrig_core::common::sequence::{amass, Sequence};
use smplrig_core::common::smpl_model::{HandPca, SmplModel};
use smplrig_core::common::types::{Gender, SmplVariant};
use smplrig_core::error::SmplError;
use std::fs::File;
use std::path::{Path, PathBuf};

fn chain_config() -> ModelConfig {
    ModelConfig {
        variant: SmplVariant::Smpl,
        n_verts: 4,
        n_faces: 2,
        n_explicit_joints: 3,
        n_hand_pca_joints: 0,
        n_shape_blends: 2,
        n_hand_pca: 0,
        parents: vec![0, 0, 1],
        joint_names: vec!["root", "mid", "tip"],
        path_prefix: "",
        uv_path: "",
    }
}

/// Writes the miniature chain model as an npz, using f64 and i64 entries so
/// the loader's width casting is exercised.
fn write_chain_npz(dir: &Path, skip: Option<&str>) -> PathBuf {
    let config = chain_config();
    let path = dir.join("chain.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    let verts = array![
        [0.0f64, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 2.0, 0.0],
        [1.0, 2.0, 0.0],
    ];
    let faces = array![[0i64, 1, 2], [1, 2, 3]];
    let mut joint_reg = nd::Array2::<f64>::zeros((3, 4));
    joint_reg[[0, 0]] = 1.0;
    joint_reg[[1, 1]] = 1.0;
    joint_reg[[2, 2]] = 1.0;
    let mut weights = nd::Array2::<f64>::zeros((4, 3));
    weights[[0, 0]] = 1.0;
    weights[[1, 1]] = 1.0;
    weights[[2, 2]] = 1.0;
    weights[[3, 2]] = 1.0;
    let mut shape_dirs = nd::Array3::<f64>::zeros((4, 3, 2));
    shape_dirs[[0, 0, 0]] = 1.0;
    let pose_dirs = nd::Array3::<f64>::zeros((4, 3, config.n_pose_blends()));

    if skip != Some("v_template") {
        npz.add_array("v_template", &verts).unwrap();
    }
    if skip != Some("f") {
        npz.add_array("f", &faces).unwrap();
    }
    if skip != Some("J_regressor") {
        npz.add_array("J_regressor", &joint_reg).unwrap();
    }
    if skip != Some("weights") {
        npz.add_array("weights", &weights).unwrap();
    }
    if skip != Some("shapedirs") {
        npz.add_array("shapedirs", &shape_dirs).unwrap();
    }
    if skip != Some("posedirs") {
        npz.add_array("posedirs", &pose_dirs).unwrap();
    }
    npz.finish().unwrap();
    path
}

#[test]
fn model_loads_from_wide_scalars() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chain_npz(dir.path(), None);
    let model =
        SmplModel::new_from_npz_with_config(chain_config(), &path, None, Gender::Female).unwrap();
    assert_eq!(model.gender, Gender::Female);
    assert_eq!(model.verts.dim(), (4, 3));
    assert_eq!(model.faces[[1, 2]], 3);
    assert_eq!(model.blend_shapes.dim(), (12, 2 + 18));
    assert_eq!(model.joint_reg.nnz(), 3);
    assert_eq!(model.weights.nnz(), 4);
    assert!(model.hand_mean_l.is_none());
    assert!(!model.has_uv_map());
    // Rest joints regressed from the loaded template.
    assert_abs_diff_eq!(model.joints[[2, 1]], 2.0, epsilon = 1e-6);
    // Children derived from the parent array.
    assert_eq!(model.children[0], vec![1]);
    assert_eq!(model.children[1], vec![2]);
    assert_eq!(model.joint_name(1), "mid");
    assert_eq!(model.parent(2), 1);
}

#[test]
fn model_reload_replaces_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chain_npz(dir.path(), None);
    let mut model =
        SmplModel::new_from_npz_with_config(chain_config(), &path, None, Gender::Neutral).unwrap();
    let deform = nd::Array2::<f32>::from_elem((4, 3), 0.5);
    model.set_deformations(&deform.view());
    assert_abs_diff_eq!(model.verts[[0, 0]], 0.5, epsilon = 1e-6);
    model.load_npz(&path, None).unwrap();
    assert_abs_diff_eq!(model.verts[[0, 0]], 0.0, epsilon = 1e-6);
}

#[test]
fn missing_array_is_a_missing_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chain_npz(dir.path(), Some("weights"));
    let err = SmplModel::new_from_npz_with_config(chain_config(), &path, None, Gender::Neutral)
        .unwrap_err();
    match err {
        SmplError::MissingField { name } => assert_eq!(name, "weights"),
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn wrong_array_shape_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chain_npz(dir.path(), None);
    let mut config = chain_config();
    config.n_verts = 5;
    let err =
        SmplModel::new_from_npz_with_config(config, &path, None, Gender::Neutral).unwrap_err();
    match err {
        SmplError::ShapeMismatch { name, got, .. } => {
            assert_eq!(name, "v_template");
            assert_eq!(got, vec![4, 3]);
        }
        other => panic!("expected ShapeMismatch, got {other:?}"),
    }
}

#[test]
fn absent_model_file_is_file_not_found() {
    let err = SmplModel::new_from_npz_with_config(
        chain_config(),
        Path::new("/nonexistent/chain.npz"),
        None,
        Gender::Neutral,
    )
    .unwrap_err();
    assert!(matches!(err, SmplError::FileNotFound(_)));
}

#[test]
fn uv_side_car_is_loaded_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chain_npz(dir.path(), None);
    let uv_path = dir.path().join("uv.txt");
    std::fs::write(
        &uv_path,
        "4\n0.0 0.0\n1.0 0.0\n1.0 1.0\n0.0 1.0\n1 2 3\n2 3 4\n",
    )
    .unwrap();
    let model =
        SmplModel::new_from_npz_with_config(chain_config(), &path, Some(&uv_path), Gender::Neutral)
            .unwrap();
    assert!(model.has_uv_map());
    assert_eq!(model.n_uv_verts(), 4);
    let uv_faces = model.uv_faces.as_ref().unwrap();
    assert_eq!(uv_faces[[1, 2]], 3);
}

fn parse_obj(path: &Path) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let text = std::fs::read_to_string(path).unwrap();
    let mut verts = Vec::new();
    let mut faces = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords: Vec<f32> = parts.map(|p| p.parse().unwrap()).collect();
                verts.push([coords[0], coords[1], coords[2]]);
            }
            Some("f") => {
                let indices: Vec<u32> = parts.map(|p| p.parse().unwrap()).collect();
                faces.push([indices[0], indices[1], indices[2]]);
            }
            _ => {}
        }
    }
    (verts, faces)
}

#[test]
fn obj_round_trip_preserves_the_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let npz_path = write_chain_npz(dir.path(), None);
    let model =
        SmplModel::new_from_npz_with_config(chain_config(), &npz_path, None, Gender::Neutral)
            .unwrap();
    let mut body = Body::new(&model);
    body.trans_mut().assign(&array![0.25f32, -1.0, 2.0]);
    body.pose_mut()[3] = 0.6;
    body.update();

    let obj_path = dir.path().join("posed.obj");
    body.save_obj(&obj_path).unwrap();
    let (verts, faces) = parse_obj(&obj_path);
    assert_eq!(verts.len(), model.n_verts());
    assert_eq!(faces.len(), model.n_faces());
    for (parsed, posed) in verts.iter().zip(body.verts().axis_iter(nd::Axis(0))) {
        for k in 0..3 {
            assert_abs_diff_eq!(parsed[k], posed[k], epsilon = 2e-6);
        }
    }
    // One-based faces on disk, zero-based in memory.
    for (parsed, original) in faces.iter().zip(model.faces.axis_iter(nd::Axis(0))) {
        for k in 0..3 {
            assert_eq!(parsed[k], original[k] + 1);
        }
    }
}

/// Builds a miniature model with a full-size skeleton: three vertices pinned
/// to the first three joints, every other regressor row empty.
fn tiny_model(config: ModelConfig) -> SmplModel {
    let n_joints = config.n_joints();
    let verts = array![[0.0f32, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 2.0, 0.0]];
    let faces = array![[0u32, 1, 2]];
    let mut joint_reg = nd::Array2::<f32>::zeros((n_joints, 3));
    let mut weights = nd::Array2::<f32>::zeros((3, n_joints));
    for i in 0..3 {
        joint_reg[[i, i]] = 1.0;
        weights[[i, i]] = 1.0;
    }
    let shape_dirs = nd::Array3::<f32>::zeros((3, 3, config.n_shape_blends));
    let pose_dirs = nd::Array3::<f32>::zeros((3, 3, config.n_pose_blends()));
    let hands = (config.n_hand_pca_joints > 0).then(|| {
        let n_hand = 3 * config.n_hand_pca_joints;
        HandPca {
            mean_l: nd::Array1::zeros(n_hand),
            mean_r: nd::Array1::zeros(n_hand),
            comps_l: nd::Array2::zeros((n_hand, n_hand)),
            comps_r: nd::Array2::zeros((n_hand, n_hand)),
        }
    });
    SmplModel::new_from_matrices(
        config,
        Gender::Neutral,
        verts,
        faces,
        joint_reg,
        weights,
        shape_dirs,
        pose_dirs,
        hands,
        None,
    )
    .unwrap()
}

fn tiny_smpl() -> SmplModel {
    tiny_model(ModelConfig {
        variant: SmplVariant::Smpl,
        n_verts: 3,
        n_faces: 1,
        n_explicit_joints: 24,
        n_hand_pca_joints: 0,
        n_shape_blends: 2,
        n_hand_pca: 0,
        parents: SMPL_PARENTS.to_vec(),
        joint_names: SMPL_JOINT_NAMES.to_vec(),
        path_prefix: "",
        uv_path: "",
    })
}

fn tiny_smplh() -> SmplModel {
    tiny_model(ModelConfig {
        variant: SmplVariant::SmplH,
        n_verts: 3,
        n_faces: 1,
        n_explicit_joints: 52,
        n_hand_pca_joints: 0,
        n_shape_blends: 16,
        n_hand_pca: 0,
        parents: SMPLH_PARENTS.to_vec(),
        joint_names: SMPLH_JOINT_NAMES.to_vec(),
        path_prefix: "",
        uv_path: "",
    })
}

fn tiny_smplx() -> SmplModel {
    tiny_model(ModelConfig {
        variant: SmplVariant::SmplX,
        n_verts: 3,
        n_faces: 1,
        n_explicit_joints: 55,
        n_hand_pca_joints: 0,
        n_shape_blends: 3,
        n_hand_pca: 0,
        parents: SMPLX_PARENTS.to_vec(),
        joint_names: SMPLX_JOINT_NAMES.to_vec(),
        path_prefix: "",
        uv_path: "",
    })
}

fn tiny_smplx_pca() -> SmplModel {
    tiny_model(ModelConfig {
        variant: SmplVariant::SmplXPca,
        n_verts: 3,
        n_faces: 1,
        n_explicit_joints: 25,
        n_hand_pca_joints: 15,
        n_shape_blends: 2,
        n_hand_pca: 6,
        parents: SMPLX_PARENTS.to_vec(),
        joint_names: SMPLX_JOINT_NAMES.to_vec(),
        path_prefix: "",
        uv_path: "",
    })
}

fn write_amass_npz(dir: &Path) -> PathBuf {
    let path = dir.join("walk.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    let mut trans = nd::Array2::<f64>::zeros((2, 3));
    trans[[0, 0]] = 0.5;
    trans[[0, 2]] = 0.25;
    trans[[1, 0]] = 1.0;
    let mut poses = nd::Array2::<f64>::zeros((2, amass::n_pose_params()));
    poses[[1, 3]] = 0.3;
    poses[[1, 150]] = 0.2;
    let betas = nd::Array1::<f64>::from_iter((0..16).map(|i| i as f64 * 0.1));
    let dmpls = nd::Array2::<f64>::zeros((2, 8));
    npz.add_array("trans", &trans).unwrap();
    npz.add_array("poses", &poses).unwrap();
    npz.add_array("betas", &betas).unwrap();
    npz.add_array("dmpls", &dmpls).unwrap();
    npz.add_array("mocap_framerate", &nd::arr0(60.0f64)).unwrap();
    npz.finish().unwrap();
    path
}

#[test]
fn amass_sequence_loads_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_amass_npz(dir.path());
    let sequence = Sequence::new_from_npz(&path);
    assert_eq!(sequence.n_frames, 2);
    assert_eq!(sequence.frame_rate, 60.0);
    // No gender entry in the archive: degrades to neutral.
    assert_eq!(sequence.gender, Gender::Neutral);
    assert!(sequence.dmpls.is_some());
    assert_abs_diff_eq!(sequence.shape[1], 0.1, epsilon = 1e-6);
}

#[test]
fn broken_sequence_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    // Missing required fields entirely.
    let path = dir.path().join("broken.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("trans", &nd::Array2::<f64>::zeros((2, 3)))
        .unwrap();
    npz.finish().unwrap();
    let sequence = Sequence::new_from_npz(&path);
    assert!(sequence.is_empty());

    let absent = Sequence::new_from_npz(Path::new("/nonexistent/seq.npz"));
    assert!(absent.is_empty());
    assert_eq!(absent.gender, Gender::Neutral);
}

#[test]
fn amass_frames_drive_a_smplh_body() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_amass_npz(dir.path());
    let sequence = Sequence::new_from_npz(&path);
    let model = tiny_smplh();
    let mut body = Body::new(&model);
    sequence.set_shape(&mut body).unwrap();
    assert_abs_diff_eq!(body.shape()[15], 1.5, epsilon = 1e-5);

    sequence.set_pose(&mut body, 0).unwrap();
    body.update();
    // The root joint rests at the origin, so its posed position is the
    // frame translation.
    assert_abs_diff_eq!(body.joints()[[0, 0]], 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(body.joints()[[0, 2]], 0.25, epsilon = 1e-5);
    let frame0: nd::Array2<f32> = &body.joints().to_owned() - &body.trans().to_owned();

    sequence.set_pose(&mut body, 1).unwrap();
    body.update();
    assert_abs_diff_eq!(body.pose()[150], 0.2, epsilon = 1e-5);
    let frame1: nd::Array2<f32> = &body.joints().to_owned() - &body.trans().to_owned();
    // Beyond the root translation, the rotated hip swings its subtree.
    let moved = frame0
        .axis_iter(nd::Axis(0))
        .zip(frame1.axis_iter(nd::Axis(0)))
        .any(|(a, b)| (&a - &b).iter().any(|d| d.abs() > 1e-4));
    assert!(moved);
}

#[test]
fn smpl_binding_zeroes_the_uncovered_joints() {
    let model = tiny_smpl();
    let mut body = Body::new(&model);
    body.pose_mut().fill(9.0);
    let sequence = Sequence {
        n_frames: 1,
        frame_rate: 120.0,
        gender: Gender::Neutral,
        shape: nd::Array1::from_elem(16, 0.25),
        trans: array![[1.0f32, 2.0, 3.0]],
        pose: nd::Array2::from_elem((1, amass::n_pose_params()), 0.5),
        dmpls: None,
    };
    sequence.set_shape(&mut body).unwrap();
    assert_abs_diff_eq!(body.shape()[0], 0.25, epsilon = 1e-6);
    sequence.set_pose(&mut body, 0).unwrap();
    assert_abs_diff_eq!(body.trans()[2], 3.0, epsilon = 1e-6);
    let pose = body.pose();
    for i in 0..66 {
        assert_abs_diff_eq!(pose[i], 0.5, epsilon = 1e-6);
    }
    // The two hand-root joints are explicitly zeroed, not left stale.
    for i in 66..72 {
        assert_abs_diff_eq!(pose[i], 0.0, epsilon = 1e-6);
    }
}

#[test]
fn smplx_binding_splits_body_and_hands_around_the_face() {
    let model = tiny_smplx();
    let mut body = Body::new(&model);
    body.pose_mut().fill(9.0);
    body.shape_mut().fill(7.0);
    let pose_row = nd::Array1::from_iter((0..amass::n_pose_params()).map(|i| i as f32));
    let sequence = Sequence {
        n_frames: 1,
        frame_rate: 120.0,
        gender: Gender::Neutral,
        shape: nd::Array1::zeros(16),
        trans: nd::Array2::zeros((1, 3)),
        pose: pose_row.insert_axis(nd::Axis(0)),
        dmpls: None,
    };
    // Shape spaces are incompatible: the body shape is left untouched.
    sequence.set_shape(&mut body).unwrap();
    assert_abs_diff_eq!(body.shape()[0], 7.0, epsilon = 1e-6);

    sequence.set_pose(&mut body, 0).unwrap();
    let pose = body.pose();
    for i in 0..66 {
        assert_abs_diff_eq!(pose[i], i as f32, epsilon = 1e-6);
    }
    // Jaw and both eye joints stay at zero.
    for i in 66..75 {
        assert_abs_diff_eq!(pose[i], 0.0, epsilon = 1e-6);
    }
    for k in 0..90 {
        assert_abs_diff_eq!(pose[75 + k], (66 + k) as f32, epsilon = 1e-6);
    }
}

#[test]
fn pca_variant_rejects_sequence_binding() {
    let model = tiny_smplx_pca();
    let mut body = Body::new(&model);
    let sequence = Sequence {
        n_frames: 1,
        frame_rate: 120.0,
        gender: Gender::Neutral,
        shape: nd::Array1::zeros(16),
        trans: nd::Array2::zeros((1, 3)),
        pose: nd::Array2::zeros((1, amass::n_pose_params())),
        dmpls: None,
    };
    assert!(matches!(
        sequence.set_shape(&mut body),
        Err(SmplError::UnsupportedVariantBinding(SmplVariant::SmplXPca))
    ));
    assert!(matches!(
        sequence.set_pose(&mut body, 0),
        Err(SmplError::UnsupportedVariantBinding(SmplVariant::SmplXPca))
    ));
}
