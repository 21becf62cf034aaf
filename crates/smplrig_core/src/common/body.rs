use crate::common::smpl_model::SmplModel;
use crate::common::types::UpdateOptions;
use crate::error::SmplError;
use nalgebra as na;
use ndarray as nd;
use ndarray::linalg::general_mat_vec_mul;
use ndarray::prelude::*;
use smplrig_utils::numerical::{mul_affine, rodrigues, rotate_point, transform_point};
use std::path::Path;

/// One posable instance of a loaded model.
///
/// Holds the parameter vector
/// `[trans(3) | pose(3 Je) | hand_pca_l(P) | hand_pca_r(P) | shape(Bs)]`
/// and the buffers the forward pass writes. All buffers are sized once at
/// construction from the model configuration; [`update`](Self::update)
/// allocates nothing. Outputs hold zeros (or stale data) until `update` has
/// run after the last parameter change.
///
/// The body borrows the model, so the model cannot be dropped or reloaded
/// while any body of it is alive; template mutation during a concurrent
/// update is excluded the same way.
pub struct Body<'a> {
    pub model: &'a SmplModel,
    /// Parameter vector; mutate through the slice accessors or directly.
    pub params: nd::Array1<f32>,
    verts_shaped: nd::Array2<f32>,
    joints_shaped: nd::Array2<f32>,
    /// Per-joint row-major 3x4 affines, canonical to posed space.
    joint_transforms: nd::Array2<f32>,
    joints: nd::Array2<f32>,
    verts: nd::Array2<f32>,
    vert_transforms: nd::Array2<f32>,
    vert_transforms_valid: bool,
    // Scratch, reused across updates.
    full_pose: nd::Array1<f32>,
    blend_coeffs: nd::Array1<f32>,
}

impl<'a> Body<'a> {
    pub fn new(model: &'a SmplModel) -> Self {
        let config = &model.config;
        let n_verts = config.n_verts;
        let n_joints = config.n_joints();
        Self {
            model,
            params: nd::Array1::zeros(config.n_params()),
            verts_shaped: nd::Array2::zeros((n_verts, 3)),
            joints_shaped: nd::Array2::zeros((n_joints, 3)),
            joint_transforms: nd::Array2::zeros((n_joints, 12)),
            joints: nd::Array2::zeros((n_joints, 3)),
            verts: nd::Array2::zeros((n_verts, 3)),
            vert_transforms: nd::Array2::zeros((n_verts, 12)),
            vert_transforms_valid: false,
            full_pose: nd::Array1::zeros(3 * n_joints),
            blend_coeffs: nd::Array1::zeros(config.n_blend_shapes()),
        }
    }

    pub fn set_zero(&mut self) {
        self.params.fill(0.0);
    }

    // Parameter slices.

    pub fn trans(&self) -> ArrayView1<f32> {
        self.params.slice(s![0..3])
    }

    pub fn trans_mut(&mut self) -> ArrayViewMut1<f32> {
        self.params.slice_mut(s![0..3])
    }

    pub fn pose(&self) -> ArrayView1<f32> {
        let n = 3 * self.model.config.n_explicit_joints;
        self.params.slice(s![3..3 + n])
    }

    pub fn pose_mut(&mut self) -> ArrayViewMut1<f32> {
        let n = 3 * self.model.config.n_explicit_joints;
        self.params.slice_mut(s![3..3 + n])
    }

    /// Both hands' PCA coefficients, left then right. Empty when the model
    /// has no hand PCA.
    pub fn hand_pca(&self) -> ArrayView1<f32> {
        let start = 3 + 3 * self.model.config.n_explicit_joints;
        let p = self.model.config.n_hand_pca;
        self.params.slice(s![start..start + 2 * p])
    }

    pub fn hand_pca_l(&self) -> ArrayView1<f32> {
        let start = 3 + 3 * self.model.config.n_explicit_joints;
        let p = self.model.config.n_hand_pca;
        self.params.slice(s![start..start + p])
    }

    pub fn hand_pca_l_mut(&mut self) -> ArrayViewMut1<f32> {
        let start = 3 + 3 * self.model.config.n_explicit_joints;
        let p = self.model.config.n_hand_pca;
        self.params.slice_mut(s![start..start + p])
    }

    pub fn hand_pca_r(&self) -> ArrayView1<f32> {
        let start = 3 + 3 * self.model.config.n_explicit_joints + self.model.config.n_hand_pca;
        let p = self.model.config.n_hand_pca;
        self.params.slice(s![start..start + p])
    }

    pub fn hand_pca_r_mut(&mut self) -> ArrayViewMut1<f32> {
        let start = 3 + 3 * self.model.config.n_explicit_joints + self.model.config.n_hand_pca;
        let p = self.model.config.n_hand_pca;
        self.params.slice_mut(s![start..start + p])
    }

    pub fn shape(&self) -> ArrayView1<f32> {
        let n = self.model.config.n_shape_blends;
        let len = self.params.len();
        self.params.slice(s![len - n..])
    }

    pub fn shape_mut(&mut self) -> ArrayViewMut1<f32> {
        let n = self.model.config.n_shape_blends;
        let len = self.params.len();
        self.params.slice_mut(s![len - n..])
    }

    // Outputs, valid after `update`.

    /// Posed vertices, same order as the model template.
    pub fn verts(&self) -> ArrayView2<f32> {
        self.verts.view()
    }

    /// Shaped but unposed vertices.
    pub fn verts_shaped(&self) -> ArrayView2<f32> {
        self.verts_shaped.view()
    }

    /// Posed joint positions.
    pub fn joints(&self) -> ArrayView2<f32> {
        self.joints.view()
    }

    /// Shaped but unposed joint positions.
    pub fn joints_shaped(&self) -> ArrayView2<f32> {
        self.joints_shaped.view()
    }

    /// Per-joint row-major 3x4 affines, canonical to posed space.
    pub fn joint_transforms(&self) -> ArrayView2<f32> {
        self.joint_transforms.view()
    }

    /// Per-vertex rigid transforms, `weights * joint_transforms`, shape
    /// `(V, 12)`. Recomputed on first read after an update invalidated them.
    pub fn vert_transforms(&mut self) -> ArrayView2<f32> {
        if !self.vert_transforms_valid {
            self.model.weights.mul_into(
                &self.joint_transforms.view(),
                &mut self.vert_transforms.view_mut(),
            );
            self.vert_transforms_valid = true;
        }
        self.vert_transforms.view()
    }

    /// Runs the forward pass with default options.
    pub fn update(&mut self) {
        self.update_with(&UpdateOptions::default());
    }

    /// Runs the forward pass: blend shapes, joint regression, kinematic-tree
    /// propagation, linear blend skinning.
    pub fn update_with(&mut self, options: &UpdateOptions) {
        let model = self.model;
        let config = &model.config;
        let n_joints = config.n_joints();
        let n_explicit3 = 3 * config.n_explicit_joints;
        let n_shape = config.n_shape_blends;

        // Full pose: explicit joints first, hand joints recovered from the
        // PCA coefficients behind them.
        self.full_pose
            .slice_mut(s![0..n_explicit3])
            .assign(&self.params.slice(s![3..3 + n_explicit3]));
        if config.n_hand_pca_joints > 0 {
            let n_hand3 = 3 * config.n_hand_pca_joints;
            let p = config.n_hand_pca;
            let pca_start = 3 + n_explicit3;
            let mean_l = model.hand_mean_l.as_ref().expect("hand PCA mean loaded");
            let mean_r = model.hand_mean_r.as_ref().expect("hand PCA mean loaded");
            let comps_l = model
                .hand_comps_l
                .as_ref()
                .expect("hand PCA components loaded");
            let comps_r = model
                .hand_comps_r
                .as_ref()
                .expect("hand PCA components loaded");
            for row in 0..n_hand3 {
                let mut acc_l = mean_l[row];
                let mut acc_r = mean_r[row];
                for k in 0..p {
                    acc_l += comps_l[[row, k]] * self.params[pca_start + k];
                    acc_r += comps_r[[row, k]] * self.params[pca_start + p + k];
                }
                self.full_pose[n_explicit3 + row] = acc_l;
                self.full_pose[n_explicit3 + n_hand3 + row] = acc_r;
            }
        }

        // Local rotations into the transform slabs; rotation-minus-identity
        // of every non-root joint drives the pose blend shapes.
        let params_len = self.params.len();
        self.blend_coeffs
            .slice_mut(s![0..n_shape])
            .assign(&self.params.slice(s![params_len - n_shape..]));
        for i in 0..n_joints {
            let axis_angle = na::Vector3::new(
                self.full_pose[3 * i],
                self.full_pose[3 * i + 1],
                self.full_pose[3 * i + 2],
            );
            let rot = rodrigues(&axis_angle);
            for r in 0..3 {
                for c in 0..3 {
                    self.joint_transforms[[i, 4 * r + c]] = rot[(r, c)];
                }
            }
            if i > 0 {
                let base = n_shape + 9 * (i - 1);
                for r in 0..3 {
                    for c in 0..3 {
                        let eye = if r == c { 1.0 } else { 0.0 };
                        self.blend_coeffs[base + 3 * r + c] = rot[(r, c)] - eye;
                    }
                }
            }
        }

        // Blend shapes: one matrix-vector product over the packed basis.
        // Skipping the pose partition trades accuracy for the dominant cost.
        self.verts_shaped.assign(&model.verts);
        {
            let mut shaped_flat = self
                .verts_shaped
                .view_mut()
                .into_shape_with_order(3 * config.n_verts)
                .unwrap();
            if options.enable_pose_blendshapes {
                general_mat_vec_mul(
                    1.0,
                    &model.blend_shapes,
                    &self.blend_coeffs,
                    1.0,
                    &mut shaped_flat,
                );
            } else {
                general_mat_vec_mul(
                    1.0,
                    &model.blend_shapes.slice(s![.., 0..n_shape]),
                    &self.blend_coeffs.slice(s![0..n_shape]),
                    1.0,
                    &mut shaped_flat,
                );
            }
        }

        // Joint regression: sparse (J, V) times dense (V, 3).
        model.joint_reg.mul_into(
            &self.verts_shaped.view(),
            &mut self.joints_shaped.view_mut(),
        );

        self.local_to_global();

        // Linear blend skinning. The weighted per-vertex transforms are only
        // materialized on demand; here each joint's transform is applied to
        // its weighted vertices directly.
        self.vert_transforms_valid = false;
        self.verts.fill(0.0);
        for j in 0..n_joints {
            let mut transform = [0.0f32; 12];
            for k in 0..12 {
                transform[k] = self.joint_transforms[[j, k]];
            }
            for (v, w) in model.weights.col(j) {
                let shaped = [
                    self.verts_shaped[[v, 0]],
                    self.verts_shaped[[v, 1]],
                    self.verts_shaped[[v, 2]],
                ];
                let posed = transform_point(&transform, shaped);
                self.verts[[v, 0]] += w * posed[0];
                self.verts[[v, 1]] += w * posed[1];
                self.verts[[v, 2]] += w * posed[2];
            }
        }
    }

    /// Completes the joint transforms from local to global space.
    ///
    /// Inputs: `trans`, `joints_shaped`, the rotation parts of
    /// `joint_transforms`. Outputs: `joints`, the full `joint_transforms`.
    /// Parents precede children in the parent array, so one forward pass
    /// suffices; the parent row is copied out before the current row is
    /// overwritten.
    fn local_to_global(&mut self) {
        let parents = &self.model.config.parents;

        // Root: translation column is the shaped joint plus the root trans.
        for k in 0..3 {
            let t = self.joints_shaped[[0, k]] + self.params[k];
            self.joint_transforms[[0, 4 * k + 3]] = t;
            self.joints[[0, k]] = t;
        }

        for i in 1..parents.len() {
            let p = parents[i];
            let mut parent_transform = [0.0f32; 12];
            let mut current = [0.0f32; 12];
            for k in 0..12 {
                parent_transform[k] = self.joint_transforms[[p, k]];
                current[k] = self.joint_transforms[[i, k]];
            }
            // Local translation relative to the parent joint.
            for k in 0..3 {
                current[4 * k + 3] = self.joints_shaped[[i, k]] - self.joints_shaped[[p, k]];
            }
            mul_affine(&parent_transform, &mut current);
            for k in 0..12 {
                self.joint_transforms[[i, k]] = current[k];
            }
            self.joints[[i, 0]] = current[3];
            self.joints[[i, 1]] = current[7];
            self.joints[[i, 2]] = current[11];
        }

        // Re-express each transform so it maps canonical vertices directly:
        // absorb the joint origin into the translation column.
        for i in 0..parents.len() {
            let mut transform = [0.0f32; 12];
            for k in 0..12 {
                transform[k] = self.joint_transforms[[i, k]];
            }
            let shaped = [
                self.joints_shaped[[i, 0]],
                self.joints_shaped[[i, 1]],
                self.joints_shaped[[i, 2]],
            ];
            let rotated = rotate_point(&transform, shaped);
            self.joint_transforms[[i, 3]] -= rotated[0];
            self.joint_transforms[[i, 7]] -= rotated[1];
            self.joint_transforms[[i, 11]] -= rotated[2];
        }
    }

    /// Writes the posed mesh as a Wavefront OBJ.
    pub fn save_obj(&self, path: &Path) -> Result<(), SmplError> {
        crate::codec::obj::save_obj(path, &self.verts.view(), &self.model.faces.view())
    }
}
