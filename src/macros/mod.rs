/// Ad-hoc image edit pipeline
///
/// A macro is an ordered list of named, parameterised operations applied left
/// to right. The whole list is parsed into typed operations up front, so an
/// unknown filter name or a missing parameter fails before any pixel work
/// runs.

pub mod ops;

pub use ops::{FlipDirection, ImageOp, MacroProcessor};
