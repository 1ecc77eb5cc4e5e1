use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record at byte {offset}: truncated ({available} of {needed} bytes)")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("record at byte {offset}: invalid fixed header: {reason}")]
    InvalidHeader { offset: usize, reason: String },

    #[error("record at byte {offset}: no blockette 1000")]
    MissingBlockette1000 { offset: usize },

    #[error("record at byte {offset}: unsupported encoding {encoding}")]
    UnsupportedEncoding { offset: usize, encoding: u8 },

    #[error("record at byte {offset}: steim frame error: {reason}")]
    Steim { offset: usize, reason: String },

    #[error("record at byte {offset}: expected {expected} samples, decoded {decoded}")]
    SampleCount {
        offset: usize,
        expected: usize,
        decoded: usize,
    },

    #[error(
        "record at byte {offset}: reverse integration constant {expected} does not match last sample {actual}"
    )]
    Integration {
        offset: usize,
        expected: i32,
        actual: i32,
    },
}

impl DecodeError {
    /// Byte offset of the record that failed to decode.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::InvalidHeader { offset, .. }
            | DecodeError::MissingBlockette1000 { offset }
            | DecodeError::UnsupportedEncoding { offset, .. }
            | DecodeError::Steim { offset, .. }
            | DecodeError::SampleCount { offset, .. }
            | DecodeError::Integration { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("sample rate {0} cannot be expressed as a SEED rate factor/multiplier")]
    SampleRate(f64),

    #[error("start time {0} is outside the SEED BTIME range")]
    StartTime(String),

    #[error("station code '{0}' is longer than {1} characters")]
    CodeTooLong(String, usize),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("corrupt miniSEED: {0}")]
    Corrupt(#[from] DecodeError),

    #[error("{message}")]
    RateLimited { message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
