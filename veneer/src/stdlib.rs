#![forbid(unsafe_code)]

use crate::loader::StubSource;

/// The bundled stub sources: a minimal builtin surface plus the container
/// and time modules whose declarations exercise every resolution rule.
pub fn bundled_sources() -> Vec<StubSource> {
    vec![
        StubSource::new("builtins", include_str!("../stubs/builtins.stub")),
        StubSource::new("collections", include_str!("../stubs/collections.stub")),
        StubSource::new("time", include_str!("../stubs/time.stub")),
    ]
}
