//! Codec error types.

use thiserror::Error;

/// Errors raised while laying out, writing or reading a buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("unsupported type: {type_name} is not a primitive and has no registered resolver")]
    UnsupportedType { type_name: &'static str },

    #[error("reserved type: {type_name} is pointer-sized and cannot be marshaled")]
    ReservedType { type_name: &'static str },

    #[error("resolver already registered for {type_name}")]
    DuplicateResolver { type_name: &'static str },

    #[error("buffer overrun: {requested} bytes at position {position} exceeds capacity {capacity}")]
    BufferOverrun {
        position: usize,
        requested: usize,
        capacity: usize,
    },

    #[error("buffer underrun: wrote {written} of {expected} bytes")]
    BufferUnderrun { written: usize, expected: usize },

    #[error("invalid encoding for {type_name}: {reason}")]
    InvalidEncoding {
        type_name: &'static str,
        reason: String,
    },

    #[error("null value for {type_name}: managed members must be present")]
    NullValue { type_name: &'static str },

    #[error("shape mismatch in {composite}: {reason}")]
    ShapeMismatch {
        composite: &'static str,
        reason: String,
    },

    #[error("resolver for {type_name} declared {declared} bytes but used {actual}")]
    ResolverWidth {
        type_name: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("managed length too large: {length} bytes (max {max})")]
    LengthTooLarge { length: u64, max: u64 },

    #[error("incomplete input: need {needed} more bytes")]
    Incomplete { needed: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BufferError {
    /// Returns whether this error is retryable.
    ///
    /// Only failures of the underlying byte source or sink qualify; every other
    /// variant describes a layout or value problem that repeats on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BufferError::Io(_))
    }

    pub(crate) fn overrun(position: usize, requested: usize, capacity: usize) -> Self {
        BufferError::BufferOverrun {
            position,
            requested,
            capacity,
        }
    }

    pub(crate) fn shape(composite: &'static str, reason: impl Into<String>) -> Self {
        BufferError::ShapeMismatch {
            composite,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let io = BufferError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "eof",
        ));
        assert!(io.is_retryable());

        assert!(!BufferError::UnsupportedType { type_name: "Foo" }.is_retryable());
        assert!(!BufferError::overrun(4, 8, 10).is_retryable());
        assert!(!BufferError::NullValue {
            type_name: "alloc::string::String"
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = BufferError::overrun(4, 8, 10);
        let msg = err.to_string();
        assert!(msg.contains("overrun"));
        assert!(msg.contains("10"));

        let err = BufferError::ReservedType { type_name: "usize" };
        assert!(err.to_string().contains("usize"));

        let err = BufferError::DuplicateResolver {
            type_name: "uuid::Uuid",
        };
        assert!(err.to_string().contains("uuid::Uuid"));

        let err = BufferError::LengthTooLarge { length: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = BufferError::Incomplete { needed: 7 };
        assert!(err.to_string().contains('7'));

        let err = BufferError::shape("Point", "expected 2 members, got 3");
        assert!(err.to_string().contains("Point"));
    }
}
