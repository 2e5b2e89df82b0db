use std::fmt::{self, Display, Formatter};

/// Every fallible outcome the codec, layout, and detector layers can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    IllegalContent,
    IllegalCharset,
    IllegalVersion,
    IllegalLevel,
    DataTooLarge,
    InsufficientContrast,
    VersionUnreadable,
    FormatInfoUnreadable,
    IllegalSegment,
    IllegalMode,
    UncorrectableError,
    DetectionExhausted,
    InvalidEciDesignator,
}

impl Display for QrError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::IllegalContent => "content cannot be represented in the requested mode",
            Self::IllegalCharset => "unsupported or unrecognized charset",
            Self::IllegalVersion => "version out of range 1..=40",
            Self::IllegalLevel => "unknown error correction level",
            Self::DataTooLarge => "payload exceeds version-40 capacity at the requested level",
            Self::InsufficientContrast => "histogram binarization found no usable valley",
            Self::VersionUnreadable => "version info Hamming distance exceeds 3 on both replicas",
            Self::FormatInfoUnreadable => "format info Hamming distance exceeds 3 on both replicas",
            Self::IllegalSegment => "corrupt or truncated bitstream segment",
            Self::IllegalMode => "unknown mode indicator",
            Self::UncorrectableError => "Reed-Solomon decoding could not correct the codeword",
            Self::DetectionExhausted => "no candidate in the detector's sequence decoded",
            Self::InvalidEciDesignator => "ECI designator has an unrecognized leading bit pattern",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for QrError {}

pub type QrResult<T> = Result<T, QrError>;
