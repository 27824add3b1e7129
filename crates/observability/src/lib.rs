//! Tracing and logging (shared setup).

/// Initialize process-wide tracing with a filter directive
/// (e.g. `"bazaar_identity=debug"`). An unparsable directive falls back to
/// `info`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_with_filter(filter: &str) {
    tracing::init(Some(filter));
}

/// Tracing configuration (filters, layers).
pub mod tracing;
