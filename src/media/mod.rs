/// Media asset model and repository
///
/// A `MediaAsset` is one logical uploaded file: its content-addressed
/// filename, its derived variants, its placement in the directory tree, and
/// its version chain.

pub mod models;
pub mod repository;

pub use models::{MediaAsset, MediaKind, Variant};
pub use repository::MediaRepository;
