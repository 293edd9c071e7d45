/// Responsive image variant generation
///
/// Idempotently completes a configured (width x format) matrix of derived
/// images for each asset. Every generated file goes through the
/// content-addressed store and is recorded on the asset as a
/// `{filename, width, mime}` variant.

pub mod generator;
pub mod report;

pub use generator::{VariantFormat, VariantGenerator, VariantMatrix, VariantRunSummary};
pub use report::{TracingReport, VariantReport};
