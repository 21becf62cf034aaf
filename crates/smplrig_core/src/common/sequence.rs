use crate::codec::npz::NpzArchive;
use crate::common::body::Body;
use crate::common::types::{Gender, SmplVariant};
use crate::error::SmplError;
use log::warn;
use ndarray as nd;
use ndarray::prelude::*;
use std::io::Read;
use std::path::Path;

/// Layout constants of the AMASS distribution format.
pub mod amass {
    pub const N_SHAPE_PARAMS: usize = 16;
    pub const N_BODY_JOINTS: usize = 22;
    /// Hand joints per side.
    pub const N_HAND_JOINTS: usize = 15;
    /// Soft-tissue parameters per frame; carried but not applied by the
    /// forward pass.
    pub const N_DMPLS: usize = 8;

    /// Per-frame pose parameters: body joints plus both hands, axis-angle.
    pub const fn n_pose_params() -> usize {
        (N_BODY_JOINTS + 2 * N_HAND_JOINTS) * 3
    }
}

/// An AMASS-compatible motion sequence: per-frame translation and pose, one
/// shape vector, optional soft-tissue coefficients.
pub struct Sequence {
    pub n_frames: usize,
    pub frame_rate: f32,
    pub gender: Gender,
    /// Extended shape parameters (betas), length [`amass::N_SHAPE_PARAMS`].
    pub shape: nd::Array1<f32>,
    /// Root translations, `(n_frames, 3)`.
    pub trans: nd::Array2<f32>,
    /// Pose parameters, `(n_frames, 156)`.
    pub pose: nd::Array2<f32>,
    /// DMPL soft-tissue parameters, `(n_frames, 8)`, when present.
    pub dmpls: Option<nd::Array2<f32>>,
}

impl Sequence {
    pub fn new_empty() -> Self {
        Self {
            n_frames: 0,
            frame_rate: 120.0,
            gender: Gender::Neutral,
            shape: nd::Array1::zeros(0),
            trans: nd::Array2::zeros((0, 3)),
            pose: nd::Array2::zeros((0, amass::n_pose_params())),
            dmpls: None,
        }
    }

    /// Loads an AMASS-style sequence. A missing file or missing required
    /// fields produce an empty sequence and a warning rather than an error,
    /// so interactive callers can recover; missing gender and framerate
    /// degrade to neutral and 120 fps.
    pub fn new_from_npz(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(sequence) => sequence,
            Err(err) => {
                warn!(
                    "sequence '{}' could not be loaded ({err}), using empty sequence",
                    path.display()
                );
                Self::new_empty()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, SmplError> {
        if !path.is_file() {
            return Err(SmplError::FileNotFound(path.to_path_buf()));
        }
        let mut npz = NpzArchive::new(std::fs::File::open(path)?)?;

        let trans = npz.float2_rows("trans", 3)?;
        let n_frames = trans.nrows();
        let pose = npz.float2_rows("poses", amass::n_pose_params())?;
        if pose.nrows() != n_frames {
            return Err(SmplError::ShapeMismatch {
                name: "poses".into(),
                expected: vec![n_frames, amass::n_pose_params()],
                got: pose.shape().to_vec(),
            });
        }
        let shape = npz.float1("betas", amass::N_SHAPE_PARAMS)?;
        let dmpls = if npz.has("dmpls") {
            let dmpls = npz.float2_rows("dmpls", amass::N_DMPLS)?;
            if dmpls.nrows() != n_frames {
                return Err(SmplError::ShapeMismatch {
                    name: "dmpls".into(),
                    expected: vec![n_frames, amass::N_DMPLS],
                    got: dmpls.shape().to_vec(),
                });
            }
            Some(dmpls)
        } else {
            None
        };

        let gender = match read_gender_char(path) {
            Some(c) => Gender::from_amass_char(c),
            None => {
                warn!("gender not present in '{}', using neutral", path.display());
                Gender::Neutral
            }
        };

        let frame_rate = if npz.has("mocap_framerate") {
            npz.float_scalar("mocap_framerate")?
        } else {
            warn!(
                "mocap_framerate not present in '{}', assuming 120 fps",
                path.display()
            );
            120.0
        };

        Ok(Self {
            n_frames,
            frame_rate,
            gender,
            shape,
            trans,
            pose,
            dmpls,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.n_frames == 0
    }

    /// Copies the sequence shape into the body parameters.
    ///
    /// SMPL takes the leading betas it can hold, SMPL+H the full vector;
    /// the SMPL-X shape space is incompatible so the body shape is left
    /// untouched. The hand-PCA variant cannot be driven at all.
    pub fn set_shape(&self, body: &mut Body) -> Result<(), SmplError> {
        match body.model.config.variant {
            SmplVariant::Smpl => {
                let n = body.model.config.n_shape_blends.min(self.shape.len());
                body.shape_mut()
                    .slice_mut(s![0..n])
                    .assign(&self.shape.slice(s![0..n]));
                Ok(())
            }
            SmplVariant::SmplH => {
                body.shape_mut().assign(&self.shape);
                Ok(())
            }
            SmplVariant::SmplX => Ok(()),
            SmplVariant::SmplXPca => Err(SmplError::UnsupportedVariantBinding(
                SmplVariant::SmplXPca,
            )),
        }
    }

    /// Copies one frame's translation and pose into the body parameters.
    ///
    /// Joints the sequence does not cover (SMPL's two hand roots, SMPL-X's
    /// jaw and eye joints) are zeroed explicitly.
    ///
    /// # Panics
    /// Panics if `frame >= n_frames` or if the bound model's pose length
    /// does not match its variant's layout.
    pub fn set_pose(&self, body: &mut Body, frame: usize) -> Result<(), SmplError> {
        assert!(
            frame < self.n_frames,
            "frame {frame} out of range, sequence has {} frames",
            self.n_frames
        );
        let trans_row = self.trans.row(frame);
        let pose_row = self.pose.row(frame);
        let n_body = amass::N_BODY_JOINTS * 3;
        match body.model.config.variant {
            SmplVariant::Smpl => {
                body.trans_mut().assign(&trans_row);
                let mut pose = body.pose_mut();
                pose.slice_mut(s![0..n_body]).assign(&pose_row.slice(s![0..n_body]));
                pose.slice_mut(s![n_body..]).fill(0.0);
                Ok(())
            }
            SmplVariant::SmplH => {
                body.trans_mut().assign(&trans_row);
                body.pose_mut().assign(&pose_row);
                Ok(())
            }
            SmplVariant::SmplX => {
                let n_hands = amass::N_HAND_JOINTS * 6;
                body.trans_mut().assign(&trans_row);
                let mut pose = body.pose_mut();
                let n_pose = pose.len();
                pose.slice_mut(s![0..n_body]).assign(&pose_row.slice(s![0..n_body]));
                pose.slice_mut(s![n_body..n_pose - n_hands]).fill(0.0);
                pose.slice_mut(s![n_pose - n_hands..])
                    .assign(&pose_row.slice(s![pose_row.len() - n_hands..]));
                Ok(())
            }
            SmplVariant::SmplXPca => Err(SmplError::UnsupportedVariantBinding(
                SmplVariant::SmplXPca,
            )),
        }
    }
}

/// Reads the single-character gender tag of an AMASS archive.
///
/// The entry is a numpy string array, which the typed reader cannot express;
/// the raw entry is pulled through `zip` instead and the first alphabetic
/// byte after the npy header is taken, which covers byte-string and UTF-32
/// encodings alike.
fn read_gender_char(path: &Path) -> Option<char> {
    let file = std::fs::File::open(path).ok()?;
    let mut archive = zip::ZipArchive::new(file).ok()?;
    let mut entry = archive.by_name("gender.npy").ok()?;
    let mut raw = Vec::new();
    entry.read_to_end(&mut raw).ok()?;
    if raw.len() < 10 || &raw[..6] != b"\x93NUMPY" {
        return None;
    }
    let header_len = if raw[6] >= 2 {
        // Version 2+ headers store a u32 length.
        12 + u32::from_le_bytes([raw[8], raw[9], *raw.get(10)?, *raw.get(11)?]) as usize
    } else {
        10 + u16::from_le_bytes([raw[8], raw[9]]) as usize
    };
    raw.get(header_len..)?
        .iter()
        .find(|b| b.is_ascii_alphabetic())
        .map(|&b| b as char)
}
