use crate::codec::npz::NpzArchive;
use crate::common::metadata::{model_config, ModelConfig};
use crate::common::types::{Gender, SmplVariant};
use crate::error::SmplError;
use log::{info, warn};
use ndarray as nd;
use ndarray::prelude::*;
use smplrig_utils::io::resolve_data_file;
use smplrig_utils::sparse::{CscMatrix, CsrMatrix};
use std::path::{Path, PathBuf};

/// Hand PCA arrays as stored in the archive: means of length `3 * Jh` and
/// square component matrices whose leading rows are the principal components.
pub struct HandPca {
    pub mean_l: nd::Array1<f32>,
    pub mean_r: nd::Array1<f32>,
    pub comps_l: nd::Array2<f32>,
    pub comps_r: nd::Array2<f32>,
}

/// UV table of a model: per-uv-vertex coordinates plus per-face uv indices,
/// zero-based in memory.
pub struct UvMap {
    pub uv: nd::Array2<f32>,
    pub uv_faces: nd::Array2<u32>,
}

/// A loaded SMPL-family model: template mesh, skeleton, blend-shape bases,
/// joint regressor and skinning weights.
///
/// Read-only after load except for the template overrides
/// [`set_template`](Self::set_template) and
/// [`set_deformations`](Self::set_deformations), which must not race with a
/// concurrent [`Body`](crate::common::body::Body) update.
#[derive(Debug)]
pub struct SmplModel {
    pub config: ModelConfig,
    pub gender: Gender,
    /// Working template, `verts_load` plus deformations.
    pub verts: nd::Array2<f32>,
    /// Template as loaded, kept immutable.
    pub verts_load: nd::Array2<f32>,
    pub faces: nd::Array2<u32>,
    /// Joint rest positions regressed from the loaded template.
    pub joints: nd::Array2<f32>,
    /// Vertex-to-joint regressor, `(J, V)` sparse by row.
    pub joint_reg: CsrMatrix,
    /// Skinning weights, `(V, J)` sparse by column; rows sum to one.
    pub weights: CscMatrix,
    /// Shape basis columns then pose basis columns, `(3V, Bs + Bp)`
    /// column-major so each basis stays contiguous.
    pub blend_shapes: nd::Array2<f32>,
    /// Child joints per joint, the inverse of the parent array.
    pub children: Vec<Vec<usize>>,
    pub hand_mean_l: Option<nd::Array1<f32>>,
    pub hand_mean_r: Option<nd::Array1<f32>>,
    /// Hand PCA components, `(3 * Jh, P)`; columns are principal components.
    pub hand_comps_l: Option<nd::Array2<f32>>,
    pub hand_comps_r: Option<nd::Array2<f32>>,
    pub uv: Option<nd::Array2<f32>>,
    pub uv_faces: Option<nd::Array2<u32>>,
}

impl SmplModel {
    /// Loads the model from the default data path for `gender`,
    /// `data/models/<variant>/<VARIANT>_<GENDER>.npz`, resolving the data
    /// directory through `SMPLX_DIR` or the parent-directory probe.
    pub fn new_from_gender(variant: SmplVariant, gender: Gender) -> Result<Self, SmplError> {
        let config = model_config(variant);
        let model_rel = format!("{}{}.npz", config.path_prefix, gender.file_tag());
        let model_path = resolve_data_file(None, &model_rel);
        let uv_path = resolve_data_file(None, config.uv_path);
        Self::new_from_npz(variant, &model_path, Some(&uv_path), gender)
    }

    /// Loads the model from an npz archive in the standard SMPL-X layout,
    /// with an optional UV side-car file.
    pub fn new_from_npz(
        variant: SmplVariant,
        path: &Path,
        uv_path: Option<&Path>,
        gender: Gender,
    ) -> Result<Self, SmplError> {
        Self::new_from_npz_with_config(model_config(variant), path, uv_path, gender)
    }

    /// Loader seam taking an explicit configuration, so miniature test
    /// models run through the same code path as the shipped variants.
    pub fn new_from_npz_with_config(
        config: ModelConfig,
        path: &Path,
        uv_path: Option<&Path>,
        gender: Gender,
    ) -> Result<Self, SmplError> {
        if !path.is_file() {
            return Err(SmplError::FileNotFound(path.to_path_buf()));
        }
        let mut npz = NpzArchive::new(std::fs::File::open(path)?)?;

        let n_verts = config.n_verts;
        let n_joints = config.n_joints();
        let verts = npz.float2("v_template", (n_verts, 3))?;
        let faces = npz.index2("f", (config.n_faces, 3))?;
        let joint_reg = npz.float2("J_regressor", (n_joints, n_verts))?;
        let weights = npz.float2("weights", (n_verts, n_joints))?;
        let shape_dirs = npz.float3("shapedirs", (n_verts, 3, config.n_shape_blends))?;
        let pose_dirs = npz.float3("posedirs", (n_verts, 3, config.n_pose_blends()))?;

        let hands = if config.n_hand_pca_joints > 0 {
            let n_hand = 3 * config.n_hand_pca_joints;
            Some(HandPca {
                mean_l: npz.float1("hands_meanl", n_hand)?,
                mean_r: npz.float1("hands_meanr", n_hand)?,
                comps_l: npz.float2("hands_componentsl", (n_hand, n_hand))?,
                comps_r: npz.float2("hands_componentsr", (n_hand, n_hand))?,
            })
        } else {
            None
        };

        let uv = match uv_path {
            Some(p) => load_uv(p, config.n_faces)?,
            None => None,
        };

        info!("loaded {} model from '{}'", config.variant, path.display());
        Self::new_from_matrices(
            config, gender, verts, faces, joint_reg, weights, shape_dirs, pose_dirs, hands, uv,
        )
    }

    /// Builds a model from already-loaded matrices, verifying every shape
    /// against the configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new_from_matrices(
        config: ModelConfig,
        gender: Gender,
        verts: nd::Array2<f32>,
        faces: nd::Array2<u32>,
        joint_reg: nd::Array2<f32>,
        weights: nd::Array2<f32>,
        shape_dirs: nd::Array3<f32>,
        pose_dirs: nd::Array3<f32>,
        hands: Option<HandPca>,
        uv: Option<UvMap>,
    ) -> Result<Self, SmplError> {
        config.validate();
        let n_verts = config.n_verts;
        let n_joints = config.n_joints();
        check_dim2("v_template", &verts, (n_verts, 3))?;
        check_dim2("f", &faces, (config.n_faces, 3))?;
        check_dim2("J_regressor", &joint_reg, (n_joints, n_verts))?;
        check_dim2("weights", &weights, (n_verts, n_joints))?;
        check_dim3("shapedirs", &shape_dirs, (n_verts, 3, config.n_shape_blends))?;
        check_dim3("posedirs", &pose_dirs, (n_verts, 3, config.n_pose_blends()))?;
        if config.n_hand_pca_joints > 0 && hands.is_none() {
            return Err(SmplError::MissingField {
                name: "hands_meanl".into(),
            });
        }

        // Children list view of the parent array.
        let mut children = vec![Vec::new(); n_joints];
        for i in 1..n_joints {
            children[config.parents[i]].push(i);
        }

        // Pack both bases into one column-major matrix so the blend-shape
        // application is a single matrix-vector product.
        let mut blend_shapes =
            nd::Array2::<f32>::zeros((3 * n_verts, config.n_blend_shapes()).f());
        for b in 0..config.n_shape_blends {
            let basis = shape_dirs.index_axis(nd::Axis(2), b);
            for (dst, &src) in blend_shapes.column_mut(b).iter_mut().zip(basis.iter()) {
                *dst = src;
            }
        }
        for b in 0..config.n_pose_blends() {
            let basis = pose_dirs.index_axis(nd::Axis(2), b);
            let col = config.n_shape_blends + b;
            for (dst, &src) in blend_shapes.column_mut(col).iter_mut().zip(basis.iter()) {
                *dst = src;
            }
        }

        let joint_reg = CsrMatrix::from_dense(&joint_reg.view());
        let weights = CscMatrix::from_dense(&weights.view());
        for (row, sum) in weights.row_sums().iter().enumerate() {
            if (sum - 1.0).abs() > 1e-4 {
                warn!("skinning weights of vertex {row} sum to {sum}, expected 1");
                break;
            }
        }
        if let Some(max) = faces.iter().max() {
            if *max as usize >= n_verts {
                warn!("face index {max} exceeds the vertex count {n_verts}");
            }
        }

        let mut joints = nd::Array2::<f32>::zeros((n_joints, 3));
        joint_reg.mul_into(&verts.view(), &mut joints.view_mut());

        let (hand_mean_l, hand_mean_r, hand_comps_l, hand_comps_r) = match hands {
            Some(h) => {
                let n_hand = 3 * config.n_hand_pca_joints;
                check_dim1("hands_meanl", &h.mean_l, n_hand)?;
                check_dim1("hands_meanr", &h.mean_r, n_hand)?;
                check_dim2("hands_componentsl", &h.comps_l, (n_hand, n_hand))?;
                check_dim2("hands_componentsr", &h.comps_r, (n_hand, n_hand))?;
                // Keep the top `P` principal components, stored as columns.
                let p = config.n_hand_pca;
                let comps_l = h.comps_l.slice(s![0..p, ..]).t().to_owned();
                let comps_r = h.comps_r.slice(s![0..p, ..]).t().to_owned();
                (Some(h.mean_l), Some(h.mean_r), Some(comps_l), Some(comps_r))
            }
            None => (None, None, None, None),
        };

        let (uv, uv_faces) = match uv {
            Some(map) => (Some(map.uv), Some(map.uv_faces)),
            None => (None, None),
        };

        Ok(Self {
            config,
            gender,
            verts_load: verts.clone(),
            verts,
            faces,
            joints,
            joint_reg,
            weights,
            blend_shapes,
            children,
            hand_mean_l,
            hand_mean_r,
            hand_comps_l,
            hand_comps_r,
            uv,
            uv_faces,
        })
    }

    /// Reloads from an archive, replacing all contents at once. The
    /// configuration and gender tag are kept.
    pub fn load_npz(&mut self, path: &Path, uv_path: Option<&Path>) -> Result<(), SmplError> {
        *self = Self::new_from_npz_with_config(self.config.clone(), path, uv_path, self.gender)?;
        Ok(())
    }

    /// Sets the working template to `verts_load + deform`.
    ///
    /// The regressor and weights are untouched; the next body update picks
    /// up the new template.
    ///
    /// # Panics
    /// Panics if `deform` is not `(V, 3)`.
    pub fn set_deformations(&mut self, deform: &ArrayView2<f32>) {
        assert_eq!(
            deform.dim(),
            (self.config.n_verts, 3),
            "deformation shape must match the template"
        );
        self.verts = &self.verts_load + deform;
    }

    /// Replaces the working template outright.
    ///
    /// # Panics
    /// Panics if `template` is not `(V, 3)`.
    pub fn set_template(&mut self, template: &ArrayView2<f32>) {
        assert_eq!(
            template.dim(),
            (self.config.n_verts, 3),
            "template shape must match the model"
        );
        self.verts = template.to_owned();
    }

    pub fn n_verts(&self) -> usize {
        self.config.n_verts
    }

    pub fn n_faces(&self) -> usize {
        self.config.n_faces
    }

    pub fn n_joints(&self) -> usize {
        self.config.n_joints()
    }

    /// UV vertex count; zero when no UV map is loaded.
    pub fn n_uv_verts(&self) -> usize {
        self.uv.as_ref().map_or(0, |uv| uv.nrows())
    }

    pub fn has_uv_map(&self) -> bool {
        self.n_uv_verts() > 0
    }

    pub fn joint_name(&self, joint: usize) -> &str {
        self.config.joint_names[joint]
    }

    pub fn parent(&self, joint: usize) -> usize {
        self.config.parents[joint]
    }
}

fn check_dim1(name: &str, arr: &nd::Array1<f32>, expected: usize) -> Result<(), SmplError> {
    if arr.len() != expected {
        return Err(SmplError::ShapeMismatch {
            name: name.into(),
            expected: vec![expected],
            got: vec![arr.len()],
        });
    }
    Ok(())
}

fn check_dim2<A>(
    name: &str,
    arr: &nd::Array2<A>,
    expected: (usize, usize),
) -> Result<(), SmplError> {
    if arr.dim() != expected {
        return Err(SmplError::ShapeMismatch {
            name: name.into(),
            expected: vec![expected.0, expected.1],
            got: arr.shape().to_vec(),
        });
    }
    Ok(())
}

fn check_dim3(
    name: &str,
    arr: &nd::Array3<f32>,
    expected: (usize, usize, usize),
) -> Result<(), SmplError> {
    if arr.dim() != expected {
        return Err(SmplError::ShapeMismatch {
            name: name.into(),
            expected: vec![expected.0, expected.1, expected.2],
            got: arr.shape().to_vec(),
        });
    }
    Ok(())
}

/// Parses the plain-text UV table: a vertex count, that many `u v` pairs,
/// then one line of three 1-based uv indices per face. A missing file or a
/// zero count yields no UV map.
fn load_uv(path: &Path, n_faces: usize) -> Result<Option<UvMap>, SmplError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let mut tokens = text.split_whitespace();

    let n_uv_verts: usize = take(&mut tokens, "vertex count")?
        .parse()
        .map_err(|e| SmplError::UvParse(format!("bad vertex count: {e}")))?;
    if n_uv_verts == 0 {
        return Ok(None);
    }

    let mut uv = nd::Array2::<f32>::zeros((n_uv_verts, 2));
    for i in 0..n_uv_verts {
        for k in 0..2 {
            uv[[i, k]] = take(&mut tokens, "uv coordinate")?
                .parse()
                .map_err(|e| SmplError::UvParse(format!("bad uv coordinate: {e}")))?;
        }
    }

    let mut uv_faces = nd::Array2::<u32>::zeros((n_faces, 3));
    for i in 0..n_faces {
        for k in 0..3 {
            let index: u32 = take(&mut tokens, "uv face index")?
                .parse()
                .map_err(|e| SmplError::UvParse(format!("bad uv face index: {e}")))?;
            if index == 0 || index as usize > n_uv_verts {
                return Err(SmplError::UvParse(format!(
                    "uv face index {index} out of range 1..={n_uv_verts}"
                )));
            }
            // 1-based on disk, 0-based in memory.
            uv_faces[[i, k]] = index - 1;
        }
    }
    Ok(Some(UvMap { uv, uv_faces }))
}

fn take<'a>(
    tokens: &mut std::str::SplitWhitespace<'a>,
    what: &str,
) -> Result<&'a str, SmplError> {
    tokens
        .next()
        .ok_or_else(|| SmplError::UvParse(format!("unexpected end of file reading {what}")))
}

/// Default model path under the data directory for a variant and gender,
/// without touching the filesystem.
pub fn default_model_path(
    variant: SmplVariant,
    gender: Gender,
    data_root: Option<&Path>,
) -> PathBuf {
    let config = model_config(variant);
    let rel = format!("{}{}.npz", config.path_prefix, gender.file_tag());
    resolve_data_file(data_root, &rel)
}
