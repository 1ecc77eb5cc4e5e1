//! `fdsn-client`: blocking client for FDSN `dataselect` web services.
//!
//! The crate has two halves:
//!
//! ```text
//! DataselectClient   ← GET /fdsnws/dataselect/1/query?...
//!     │                 maps HTTP status to ClientError
//!     ▼
//! mseed::decode      ← SEED 2.x data records → SampleStream
//!                       Strict fails on the first malformed record,
//!                       Lenient skips it and keeps going
//! ```
//!
//! `mseed::encode` goes the other way and is used to archive assembled
//! day records.

pub mod client;
pub mod error;
pub mod mseed;
pub mod types;

pub use client::{DataselectClient, DEFAULT_BASE_URL};
pub use error::{ClientError, DecodeError, EncodeError};
pub use mseed::DecodeMode;
pub use types::{SampleStream, StreamId, Trace};
