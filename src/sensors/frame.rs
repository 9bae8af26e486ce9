use super::registry::{SensorProfile, END_MARKER, START_MARKER};

/// Reasons a device message is refused without ending the session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameRejection {
    #[error("invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid start marker")]
    InvalidStartMarker(u8),

    #[error("invalid end marker")]
    InvalidEndMarker(u8),

    #[error("command mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CommandMismatch { expected: u8, actual: u8 },

    #[error("declared length mismatch: expected {expected:#04x}, got {actual:#04x}")]
    DeclaredLengthMismatch { expected: u8, actual: u8 },

    #[error("expected a binary frame, got text")]
    UnexpectedText,

    #[error("expected a text identifier, got binary data")]
    ExpectedIdentifier,

    #[error("buffer is full and awaiting relay")]
    BufferFull,

    #[error("identifier rejected: {0}")]
    IdentifierRejected(String),
}

impl FrameRejection {
    /// Stable machine-readable code sent to devices
    pub fn code(&self) -> &'static str {
        match self {
            FrameRejection::InvalidLength { .. } => "invalid_length",
            FrameRejection::InvalidStartMarker(_) => "invalid_start_marker",
            FrameRejection::InvalidEndMarker(_) => "invalid_end_marker",
            FrameRejection::CommandMismatch { .. } => "command_mismatch",
            FrameRejection::DeclaredLengthMismatch { .. } => "declared_length_mismatch",
            FrameRejection::UnexpectedText => "unexpected_text",
            FrameRejection::ExpectedIdentifier => "expected_identifier",
            FrameRejection::BufferFull => "buffer_full",
            FrameRejection::IdentifierRejected(_) => "identifier_rejected",
        }
    }
}

/// A frame whose header and trailer matched a sensor profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Header is start marker, command byte, declared length
    pub const HEADER_LEN: usize = 3;

    /// Validate raw bytes against the profile of the session's sensor
    pub fn parse(bytes: &'a [u8], profile: &SensorProfile) -> Result<Self, FrameRejection> {
        let expected = profile.frame_length();
        if bytes.len() != expected {
            return Err(FrameRejection::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }

        if bytes[0] != START_MARKER {
            return Err(FrameRejection::InvalidStartMarker(bytes[0]));
        }

        let end = bytes[bytes.len() - 1];
        if end != END_MARKER {
            return Err(FrameRejection::InvalidEndMarker(end));
        }

        if bytes[1] != profile.command_code {
            return Err(FrameRejection::CommandMismatch {
                expected: profile.command_code,
                actual: bytes[1],
            });
        }

        if bytes[2] != profile.payload_length {
            return Err(FrameRejection::DeclaredLengthMismatch {
                expected: profile.payload_length,
                actual: bytes[2],
            });
        }

        Ok(Self { bytes })
    }

    pub fn command_code(&self) -> u8 {
        self.bytes[1]
    }

    /// Whole frame, markers included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Everything between the header and the end marker
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[Self::HEADER_LEN..self.bytes.len() - 1]
    }
}
