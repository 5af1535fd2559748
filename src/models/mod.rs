pub mod part;
pub mod question;
pub mod snapshot;
pub mod test_question;
pub mod test_result;

/// Raised when a text enum column holds a value this build does not know.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: String) -> Self {
        Self { kind, value }
    }
}
