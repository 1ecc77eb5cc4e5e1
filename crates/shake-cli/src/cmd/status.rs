use super::OverrideArgs;
use crate::output::{print_json, print_table};
use crate::root;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shake_core::archive::DayArchive;
use shake_core::window::days;
use shake_core::ShakeError;
use std::path::Path;

#[derive(Serialize)]
struct DayState {
    day: NaiveDate,
    waveform: bool,
    dayplot: bool,
    done: bool,
}

pub fn run(explicit: Option<&Path>, overrides: &OverrideArgs, json: bool) -> anyhow::Result<()> {
    let ws = root::load(explicit)?;
    let mut config = ws.config;
    overrides.apply(&mut config);

    let start = config.range.start;
    let end = config.range.resolved_end(Utc::now().date_naive());
    if end < start {
        return Err(ShakeError::InvalidRange { start, end }.into());
    }

    let archive = DayArchive::from_config(&ws.root, &config);
    let states: Vec<DayState> = days(start, end)
        .map(|day| {
            let waveform = archive.waveform_path(day).is_file();
            let dayplot = archive.dayplot_path(day).is_file();
            DayState {
                day,
                waveform,
                dayplot,
                done: archive.existing(day).is_some(),
            }
        })
        .collect();

    if json {
        return print_json(&states);
    }

    let yes_no = |b: bool| (if b { "yes" } else { "-" }).to_string();
    let rows = states
        .iter()
        .map(|s| {
            vec![
                s.day.to_string(),
                yes_no(s.waveform),
                yes_no(s.dayplot),
                (if s.done { "done" } else { "pending" }).to_string(),
            ]
        })
        .collect();
    print_table(&["DAY", "WAVEFORM", "DAYPLOT", "STATE"], rows);

    let done = states.iter().filter(|s| s.done).count();
    println!(
        "\n{}: {done}/{} day(s) done in {}",
        archive.id(),
        states.len(),
        archive.waveform_dir().display()
    );
    Ok(())
}
