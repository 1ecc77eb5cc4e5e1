pub mod archive;
pub mod assembler;
pub mod backoff;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod provider;
pub mod types;
pub mod window;

pub use error::{Result, ShakeError};
pub use fdsn_client::{SampleStream, StreamId, Trace};
