use crate::fetcher::{FetchError, Provider};
use crate::types::TimeWindow;
use fdsn_client::{ClientError, DataselectClient, DecodeMode, SampleStream, StreamId};

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Corrupt(e) => FetchError::Corrupt(e.to_string()),
            ClientError::RateLimited { message } => FetchError::RateLimit(message),
            other => FetchError::Other(other.to_string()),
        }
    }
}

impl Provider for DataselectClient {
    fn fetch(&self, id: &StreamId, window: &TimeWindow) -> Result<SampleStream, FetchError> {
        Ok(self.get_waveforms(id, window.start(), window.end(), DecodeMode::Strict)?)
    }

    fn fetch_lenient(
        &self,
        id: &StreamId,
        window: &TimeWindow,
    ) -> Result<SampleStream, FetchError> {
        Ok(self.get_waveforms(id, window.start(), window.end(), DecodeMode::Lenient)?)
    }
}
