use crate::output::{print_json, print_table};
use crate::root;
use chrono::NaiveDate;
use shake_core::window::plan_day;
use std::path::Path;

pub fn run(
    explicit: Option<&Path>,
    date: NaiveDate,
    chunk_hours: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = root::load(explicit)?;
    let hours = chunk_hours.unwrap_or(ws.config.acquisition.chunk_hours);
    let windows = plan_day(date, hours)?;

    if json {
        return print_json(&windows);
    }

    let rows = windows
        .iter()
        .enumerate()
        .map(|(i, w)| {
            vec![
                (i + 1).to_string(),
                w.start().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                w.end().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ]
        })
        .collect();
    print_table(&["#", "START", "END"], rows);
    Ok(())
}
