use crate::error::ClientError;
use crate::mseed::{self, DecodeMode};
use crate::types::{SampleStream, StreamId};
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://data.raspberryshake.org";

const DATASELECT_PATH: &str = "/fdsnws/dataselect/1/query";
const BODY_SNIPPET_LEN: usize = 180;

/// Blocking client for one FDSN dataselect endpoint.
#[derive(Debug, Clone)]
pub struct DataselectClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl DataselectClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shakefetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `[start, end)` for one stream and decode the response.
    ///
    /// "No data" answers (204, 404, empty body) are an empty stream, not an
    /// error.
    pub fn get_waveforms(
        &self,
        id: &StreamId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mode: DecodeMode,
    ) -> Result<SampleStream, ClientError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), DATASELECT_PATH);
        let location = if id.location.is_empty() {
            "--"
        } else {
            id.location.as_str()
        };
        let starttime = format_time(start);
        let endtime = format_time(end);

        tracing::debug!(%id, %starttime, %endtime, ?mode, "dataselect request");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("network", id.network.as_str()),
                ("station", id.station.as_str()),
                ("location", location),
                ("channel", id.channel.as_str()),
                ("starttime", starttime.as_str()),
                ("endtime", endtime.as_str()),
            ])
            .send()?;

        let status = resp.status();
        match status.as_u16() {
            204 | 404 => return Ok(SampleStream::empty()),
            429 => {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = snippet(&resp.text().unwrap_or_default());
                let mut message = "HTTP 429 Too Many Requests".to_string();
                if let Some(secs) = retry_after {
                    message.push_str(&format!(" (Retry-After: {secs})"));
                }
                if !body.is_empty() {
                    message.push_str(&format!(": {body}"));
                }
                return Err(ClientError::RateLimited { message });
            }
            _ if !status.is_success() => {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body: snippet(&resp.text().unwrap_or_default()),
                });
            }
            _ => {}
        }

        let bytes = resp.bytes()?;
        if bytes.is_empty() {
            return Ok(SampleStream::empty());
        }
        let stream = mseed::decode(&bytes, mode)?;
        tracing::debug!(
            %id,
            bytes = bytes.len(),
            traces = stream.traces.len(),
            samples = stream.sample_count(),
            "dataselect response decoded"
        );
        Ok(stream)
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(BODY_SNIPPET_LEN).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
