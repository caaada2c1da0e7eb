pub mod generation;
pub mod image;
pub mod project;
pub mod queue;
pub mod signature;
pub mod status;
