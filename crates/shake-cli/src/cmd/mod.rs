pub mod config;
pub mod plan;
pub mod run;
pub mod status;

use chrono::NaiveDate;
use clap::Args;
use shake_core::config::Config;

/// Per-invocation overrides of the config file.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// First day to fetch, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Day to stop before, exclusive (default: today, UTC)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long)]
    pub station: Option<String>,
    /// Location code; pass an empty string for none
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub channel: Option<String>,
    /// Window width in hours; must divide 24
    #[arg(long)]
    pub chunk_hours: Option<u32>,
    /// Seconds to pause before each window request
    #[arg(long)]
    pub pacing: Option<f64>,
    /// Retries per window after the first failed attempt
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl OverrideArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(start) = self.start {
            config.range.start = start;
        }
        if self.end.is_some() {
            config.range.end = self.end;
        }
        let id = &mut config.identity;
        for (field, value) in [
            (&mut id.network, &self.network),
            (&mut id.station, &self.station),
            (&mut id.location, &self.location),
            (&mut id.channel, &self.channel),
        ] {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        let acq = &mut config.acquisition;
        if let Some(hours) = self.chunk_hours {
            acq.chunk_hours = hours;
        }
        if let Some(pacing) = self.pacing {
            acq.pacing_seconds = pacing;
        }
        if let Some(retries) = self.max_retries {
            acq.max_retries = retries;
        }
    }
}
