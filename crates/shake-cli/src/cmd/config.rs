use crate::output::print_json;
use crate::root;
use anyhow::Context;
use clap::Subcommand;
use shake_core::config::{Config, WarnLevel};
use shake_core::io;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default shakefetch.yaml (never overwrites)
    Init,

    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(explicit: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => init(explicit, json),
        ConfigSubcommand::Show => show(explicit, json),
        ConfigSubcommand::Validate => validate(explicit, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path = root::init_path(explicit);
    let yaml = serde_yaml::to_string(&Config::default())?;
    let written = io::write_if_missing(&path, yaml.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": path,
            "written": written,
        }))?;
    } else if written {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists, left unchanged", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let ws = root::load(explicit)?;
    if json {
        return print_json(&serde_json::json!({
            "path": ws.config_path,
            "root": ws.root,
            "config": ws.config,
        }));
    }
    match &ws.config_path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# built-in defaults (no {} found)", shake_core::paths::CONFIG_FILE),
    }
    print!("{}", serde_yaml::to_string(&ws.config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let ws = root::load(explicit)?;
    let warnings = ws.config.validate();

    if json {
        print_json(&serde_json::json!({
            "warnings": warnings,
        }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
