//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing with the `info` default filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with("info");
}

/// Like [`init`], with the filter used when `RUST_LOG` is unset.
pub fn init_with(default_filter: &str) {
    tracing::init_with(default_filter);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

#[cfg(test)]
mod tests {
    #[test]
    fn init_can_be_called_more_than_once() {
        super::init();
        super::init_with("debug");
    }
}
