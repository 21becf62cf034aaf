pub mod body;
pub mod metadata;
pub mod sequence;
pub mod smpl_model;
pub mod types;
