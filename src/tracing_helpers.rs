//! Span constructors for the optional `tracing` feature.

use tracing::Span;

/// Span around composing an association's `Select`
pub fn call_span(association: &str, kind: &str) -> Span {
    tracing::debug_span!("association.call", association = association, kind = kind)
}

/// Span around one batched preload
pub fn preload_span(association: &str, parents: usize) -> Span {
    tracing::debug_span!(
        "association.preload",
        association = association,
        parents = parents
    )
}
