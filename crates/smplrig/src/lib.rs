//! ## Crate Items Overview
//!
//! smplrig is a CPU compute core for SMPL-family parametric body models:
//! model loading from npz archives, forward skinning, AMASS sequence
//! binding and OBJ export.
//!
//! ### Modules
//! - [`smplrig_core`](crate::smplrig_core) - models, bodies, sequences,
//!   codecs and errors.
//! - [`smplrig_utils`](crate::smplrig_utils) - numeric primitives, sparse
//!   matrices and data-path resolution.
pub use smplrig_core;
pub use smplrig_utils;
