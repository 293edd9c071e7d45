/// Hierarchical directory tree for media assets
///
/// Directories form an acyclic parent-chain namespace; full paths are the
/// ancestor slugs joined with `/`. Mutation goes through the repository,
/// which serializes moves so the cycle check cannot race.

pub mod models;
pub mod repository;

pub use models::MediaDirectory;
pub use repository::{DirectoryRepository, PathTarget};
