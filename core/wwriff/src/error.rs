//! Error types for Wwise-RIFF to Ogg/Vorbis conversion.

use thiserror::Error;

/// Result type alias for conversion operations.
pub type WwriffResult<T> = Result<T, WwriffError>;

/// Errors that can occur while reconstructing an Ogg/Vorbis stream from a
/// Wwise-RIFF container.
///
/// The pipeline aborts on the first error; nothing is retried or recovered
/// locally, and partial output already written is the caller's
/// responsibility to truncate or delete.
#[derive(Debug, Error)]
pub enum WwriffError {
    /// The underlying reader or writer failed.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// The RIFF/WAVE structure was not recognized.
    #[error("bad container: {reason}")]
    BadContainer {
        /// What was expected versus what was found.
        reason: String,
    },

    /// The `fmt` tag is not recognized, or the Vorbis variant could not be
    /// determined from `vorbis_data_offset`.
    #[error("unsupported format: {reason}")]
    UnsupportedFormat {
        /// Description of the unsupported format.
        reason: String,
    },

    /// A compact codebook failed to parse, or a codebook lookup against
    /// the library failed.
    #[error("bad codebook: {reason}")]
    BadCodebook {
        /// Description of the codebook failure.
        reason: String,
    },

    /// An audio packet was truncated or exceeded `max_packet_size`.
    #[error("bad packet: {reason}")]
    BadPacket {
        /// Description of the packet failure.
        reason: String,
    },

    /// A pipeline invariant was violated; this indicates a bug rather
    /// than malformed input.
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl WwriffError {
    /// Build a [`WwriffError::BadContainer`].
    pub fn bad_container(reason: impl Into<String>) -> Self {
        Self::BadContainer {
            reason: reason.into(),
        }
    }

    /// Build a [`WwriffError::UnsupportedFormat`].
    pub fn unsupported_format(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    /// Build a [`WwriffError::BadCodebook`].
    pub fn bad_codebook(reason: impl Into<String>) -> Self {
        Self::BadCodebook {
            reason: reason.into(),
        }
    }

    /// Build a [`WwriffError::BadPacket`].
    pub fn bad_packet(reason: impl Into<String>) -> Self {
        Self::BadPacket {
            reason: reason.into(),
        }
    }

    /// Build a [`WwriffError::Internal`].
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_reason() {
        let err = WwriffError::bad_codebook("reserved lookup type 3");
        assert!(err.to_string().contains("reserved lookup type 3"));
        let err = WwriffError::bad_container("missing RIFF");
        assert!(err.to_string().contains("missing RIFF"));
        let err = WwriffError::unsupported_format("fmt tag 0x1234");
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: WwriffError = io_err.into();
        assert!(matches!(err, WwriffError::IoFailure(_)));
    }
}
