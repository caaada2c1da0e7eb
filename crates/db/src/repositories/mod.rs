//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod generation_job_repo;
pub mod generation_repo;
pub mod image_repo;
pub mod project_repo;
pub mod signature_repo;

pub use generation_job_repo::GenerationJobRepo;
pub use generation_repo::GenerationRepo;
pub use image_repo::ImageRepo;
pub use project_repo::{CharacterRepo, ProjectRepo};
pub use signature_repo::SignatureRepo;
