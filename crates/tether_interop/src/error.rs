use thiserror::Error;

/// Errors surfaced by the interop layer outside the dispatch hot path.
///
/// Dispatch itself never fails: misses are `false` and decode mismatches
/// produce defaults. These variants cover registration and raw-ABI parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteropError {
    #[error("handle table exhausted after {issued} handles")]
    HandlesExhausted { issued: i32 },

    #[error("invalid call kind tag {0}")]
    InvalidCallKind(i32),

    #[error("invalid handle {0}")]
    InvalidHandle(i32),

    #[error("binding id space exhausted")]
    BindingIdsExhausted,

    #[error("no binding for {0}")]
    UnknownBinding(String),
}
