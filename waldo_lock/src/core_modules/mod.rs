pub mod backends;
pub mod capability;
pub mod geometry;
pub mod observation;
pub mod overlay;
pub mod session;
