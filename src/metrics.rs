/// Metrics and telemetry for the media service
///
/// Prometheus-compatible counters for the pipeline:
/// - uploads and their byte volume
/// - variant generation
/// - garbage collection sweeps

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Total accepted uploads by media kind
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Total number of accepted uploads",
        &["kind"]
    )
    .unwrap();

    /// Total bytes accepted through upload
    pub static ref UPLOAD_BYTES_TOTAL: IntCounter = register_int_counter!(
        "media_upload_bytes_total",
        "Total bytes accepted through upload"
    )
    .unwrap();

    /// Total image variants generated
    pub static ref VARIANTS_GENERATED_TOTAL: IntCounter = register_int_counter!(
        "media_variants_generated_total",
        "Total number of image variants generated"
    )
    .unwrap();

    /// Total blobs removed by the garbage-collection sweep
    pub static ref GC_SWEPT_TOTAL: IntCounter = register_int_counter!(
        "media_gc_swept_total",
        "Total number of orphaned blobs deleted by garbage collection"
    )
    .unwrap();

    /// Total edit-macro pipelines applied
    pub static ref MACROS_APPLIED_TOTAL: IntCounter = register_int_counter!(
        "media_macros_applied_total",
        "Total number of edit macro pipelines applied"
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
