pub mod npz;
pub mod obj;
