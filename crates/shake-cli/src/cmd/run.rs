use super::OverrideArgs;
use crate::output::{print_json, print_table};
use crate::root;
use anyhow::Context;
use chrono::Utc;
use fdsn_client::DataselectClient;
use shake_core::config::{Config, WarnLevel};
use shake_core::fetcher::ThreadSleeper;
use shake_core::orchestrator::Acquisition;
use std::path::Path;

pub fn run(explicit: Option<&Path>, overrides: &OverrideArgs, json: bool) -> anyhow::Result<()> {
    let ws = root::load(explicit)?;
    let mut config = ws.config;
    overrides.apply(&mut config);

    let warnings = config.validate();
    for w in warnings.iter().filter(|w| w.level == WarnLevel::Warning) {
        tracing::warn!("config: {}", w.message);
    }
    if Config::has_errors(&warnings) {
        let errors: Vec<&str> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message.as_str())
            .collect();
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }

    let client = DataselectClient::new(config.provider.base_url.clone(), config.provider.timeout())
        .context("failed to build HTTP client")?;
    let sleeper = ThreadSleeper;
    let mut acquisition = Acquisition::new(&config, &ws.root, &client, &sleeper)?;

    let end = config.range.resolved_end(Utc::now().date_naive());
    let summary = acquisition.run(config.range.start, end)?;

    if json {
        return print_json(&summary);
    }

    let rows = summary
        .days
        .iter()
        .map(|r| {
            vec![
                r.day.to_string(),
                r.outcome.status().to_string(),
                r.outcome.detail(),
            ]
        })
        .collect();
    print_table(&["DAY", "STATUS", "DETAIL"], rows);
    println!(
        "\n{} day(s): {} saved, {} skipped, {} no data, {} failed",
        summary.total(),
        summary.saved,
        summary.skipped,
        summary.no_data,
        summary.failed
    );
    Ok(())
}
