use super::types::SmplVariant;

/// Static description of one model variant: array sizes, the kinematic tree
/// and the default data paths. Derived counts are methods so they can never
/// drift from the stored ones.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub variant: SmplVariant,
    pub n_verts: usize,
    pub n_faces: usize,
    /// Joints parameterized directly as axis-angle in the parameter vector.
    pub n_explicit_joints: usize,
    /// Joints per hand recovered from PCA coefficients instead.
    pub n_hand_pca_joints: usize,
    pub n_shape_blends: usize,
    /// PCA coefficients per hand.
    pub n_hand_pca: usize,
    /// Parent joint per joint; `parents[0] == 0` marks the root.
    pub parents: Vec<usize>,
    pub joint_names: Vec<&'static str>,
    /// Prefix of the default model path under the data directory.
    pub path_prefix: &'static str,
    /// Default UV side-car path under the data directory.
    pub uv_path: &'static str,
}

impl ModelConfig {
    /// Total joint count, explicit plus both PCA hands.
    pub fn n_joints(&self) -> usize {
        self.n_explicit_joints + 2 * self.n_hand_pca_joints
    }

    /// Pose blend shapes, nine per non-root joint.
    pub fn n_pose_blends(&self) -> usize {
        9 * (self.n_joints() - 1)
    }

    /// Columns of the packed blend-shape matrix.
    pub fn n_blend_shapes(&self) -> usize {
        self.n_shape_blends + self.n_pose_blends()
    }

    /// Length of a body parameter vector:
    /// `[trans | pose | hand_pca_l | hand_pca_r | shape]`.
    pub fn n_params(&self) -> usize {
        3 + 3 * self.n_explicit_joints + 2 * self.n_hand_pca + self.n_shape_blends
    }

    /// # Panics
    /// Panics if the parent array is not a topologically ordered tree rooted
    /// at joint 0, or if the joint-name table disagrees with the joint count.
    pub fn validate(&self) {
        let n_joints = self.n_joints();
        assert_eq!(
            self.parents.len(),
            n_joints,
            "parent array must cover every joint"
        );
        assert_eq!(self.joint_names.len(), n_joints, "joint name per joint");
        assert_eq!(self.parents[0], 0, "root joint must be its own parent");
        for (i, &p) in self.parents.iter().enumerate().skip(1) {
            assert!(
                p < i,
                "kinematic tree must be topologically ordered: parent[{i}] = {p}"
            );
        }
    }
}

pub const SMPL_PARENTS: [usize; 24] = [
    0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19, 20, 21,
];

pub const SMPLH_PARENTS: [usize; 52] = [
    0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19, 20, 22, 23, 20, 25,
    26, 20, 28, 29, 20, 31, 32, 20, 34, 35, 21, 37, 38, 21, 40, 41, 21, 43, 44, 21, 46, 47, 21,
    49, 50,
];

pub const SMPLX_PARENTS: [usize; 55] = [
    0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 12, 13, 14, 16, 17, 18, 19, 15, 15, 15, 20, 25,
    26, 20, 28, 29, 20, 31, 32, 20, 34, 35, 20, 37, 38, 21, 40, 41, 21, 43, 44, 21, 46, 47, 21,
    49, 50, 21, 52, 53,
];

pub const SMPL_JOINT_NAMES: [&str; 24] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "spine1",
    "left_knee",
    "right_knee",
    "spine2",
    "left_ankle",
    "right_ankle",
    "spine3",
    "left_foot",
    "right_foot",
    "neck",
    "left_collar",
    "right_collar",
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hand",
    "right_hand",
];

pub const SMPLH_JOINT_NAMES: [&str; 52] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "spine1",
    "left_knee",
    "right_knee",
    "spine2",
    "left_ankle",
    "right_ankle",
    "spine3",
    "left_foot",
    "right_foot",
    "neck",
    "left_collar",
    "right_collar",
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_index1",
    "left_index2",
    "left_index3",
    "left_middle1",
    "left_middle2",
    "left_middle3",
    "left_pinky1",
    "left_pinky2",
    "left_pinky3",
    "left_ring1",
    "left_ring2",
    "left_ring3",
    "left_thumb1",
    "left_thumb2",
    "left_thumb3",
    "right_index1",
    "right_index2",
    "right_index3",
    "right_middle1",
    "right_middle2",
    "right_middle3",
    "right_pinky1",
    "right_pinky2",
    "right_pinky3",
    "right_ring1",
    "right_ring2",
    "right_ring3",
    "right_thumb1",
    "right_thumb2",
    "right_thumb3",
];

pub const SMPLX_JOINT_NAMES: [&str; 55] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "spine1",
    "left_knee",
    "right_knee",
    "spine2",
    "left_ankle",
    "right_ankle",
    "spine3",
    "left_foot",
    "right_foot",
    "neck",
    "left_collar",
    "right_collar",
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "jaw",
    "left_eye_smplhf",
    "right_eye_smplhf",
    "left_index1",
    "left_index2",
    "left_index3",
    "left_middle1",
    "left_middle2",
    "left_middle3",
    "left_pinky1",
    "left_pinky2",
    "left_pinky3",
    "left_ring1",
    "left_ring2",
    "left_ring3",
    "left_thumb1",
    "left_thumb2",
    "left_thumb3",
    "right_index1",
    "right_index2",
    "right_index3",
    "right_middle1",
    "right_middle2",
    "right_middle3",
    "right_pinky1",
    "right_pinky2",
    "right_pinky3",
    "right_ring1",
    "right_ring2",
    "right_ring3",
    "right_thumb1",
    "right_thumb2",
    "right_thumb3",
];

/// Lookup table from variant to its static configuration.
pub fn model_config(variant: SmplVariant) -> ModelConfig {
    match variant {
        SmplVariant::Smpl => ModelConfig {
            variant,
            n_verts: 6890,
            n_faces: 13776,
            n_explicit_joints: 24,
            n_hand_pca_joints: 0,
            n_shape_blends: 10,
            n_hand_pca: 0,
            parents: SMPL_PARENTS.to_vec(),
            joint_names: SMPL_JOINT_NAMES.to_vec(),
            path_prefix: "models/smpl/SMPL_",
            uv_path: "models/smpl/uv.txt",
        },
        SmplVariant::SmplH => ModelConfig {
            variant,
            n_verts: 6890,
            n_faces: 13776,
            n_explicit_joints: 52,
            n_hand_pca_joints: 0,
            n_shape_blends: 16,
            n_hand_pca: 0,
            parents: SMPLH_PARENTS.to_vec(),
            joint_names: SMPLH_JOINT_NAMES.to_vec(),
            path_prefix: "models/smplh/SMPLH_",
            uv_path: "models/smplh/uv.txt",
        },
        SmplVariant::SmplX => ModelConfig {
            variant,
            n_verts: 10475,
            n_faces: 20908,
            n_explicit_joints: 55,
            n_hand_pca_joints: 0,
            n_shape_blends: 400,
            n_hand_pca: 0,
            parents: SMPLX_PARENTS.to_vec(),
            joint_names: SMPLX_JOINT_NAMES.to_vec(),
            path_prefix: "models/smplx/SMPLX_",
            uv_path: "models/smplx/uv.txt",
        },
        SmplVariant::SmplXPca => ModelConfig {
            variant,
            n_verts: 10475,
            n_faces: 20908,
            n_explicit_joints: 25,
            n_hand_pca_joints: 15,
            n_shape_blends: 400,
            n_hand_pca: 6,
            parents: SMPLX_PARENTS.to_vec(),
            joint_names: SMPLX_JOINT_NAMES.to_vec(),
            path_prefix: "models/smplx/SMPLX_",
            uv_path: "models/smplx/uv.txt",
        },
    }
}
