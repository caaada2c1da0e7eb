//! [`GenerationStore`](crate::ports::GenerationStore) and
//! [`JobQueue`](crate::ports::JobQueue) backends.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryGenerationStore, MemoryJobQueue};
pub use postgres::{PgGenerationStore, PgJobQueue};
