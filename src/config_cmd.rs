use std::{fmt::Write as _, fs};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{ConfigArgs, ConfigCommands},
    config::{self, ConfigDiff, ConfigStore, MigrationConfig},
    table,
};

pub fn execute(args: &ConfigArgs) -> Result<()> {
    let store = ConfigStore::open(&args.store)
        .with_context(|| format!("Opening configuration store {:?}", args.store))?;
    match &args.command {
        ConfigCommands::Save { config } => {
            let parsed = MigrationConfig::load(config)
                .with_context(|| format!("Loading mapping configuration {config:?}"))?;
            let version = store
                .save(&parsed)
                .with_context(|| format!("Saving configuration '{}'", parsed.name))?;
            println!("Saved '{}' as version {version}", parsed.name);
        }
        ConfigCommands::List => {
            let summaries = store.list()?;
            if summaries.is_empty() {
                println!("No configurations stored in {:?}", store.root());
                return Ok(());
            }
            let headers = ["name", "module", "version", "updated", "source", "target", "mappings"]
                .map(str::to_string);
            let rows = summaries
                .iter()
                .map(|summary| {
                    vec![
                        summary.name.clone(),
                        summary.module.clone(),
                        summary.latest_version.to_string(),
                        summary.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        summary.source_table.clone(),
                        summary.target_table.clone(),
                        summary.mapping_count.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
        ConfigCommands::Show { name, version } => {
            let config = load(&store, name, *version)?;
            println!("{}", config.to_json_pretty()?);
        }
        ConfigCommands::History { name } => {
            let versions = store.history(name)?;
            let headers = ["version", "created", "checksum"].map(str::to_string);
            let rows = versions
                .iter()
                .map(|info| {
                    vec![
                        info.version.to_string(),
                        info.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        info.checksum.chars().take(12).collect(),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
        ConfigCommands::Diff { name, from, to } => {
            let diff = store.diff(name, *from, *to)?;
            print!("{}", render_diff(&diff)?);
        }
        ConfigCommands::Delete { name } => {
            store.delete(name)?;
            info!("Removed '{name}' from {:?}", store.root());
            println!("Deleted '{name}'");
        }
        ConfigCommands::Export {
            name,
            version,
            output,
        } => {
            let definition = config::typescript_definition(&load(&store, name, *version)?);
            match output {
                Some(path) => {
                    fs::write(path, definition)
                        .with_context(|| format!("Writing TypeScript definition {path:?}"))?;
                    info!("Exported '{name}' to {path:?}");
                }
                None => print!("{definition}"),
            }
        }
    }
    Ok(())
}

fn load(store: &ConfigStore, name: &str, version: Option<u32>) -> Result<MigrationConfig> {
    let config = match version {
        Some(version) => store.load_version(name, version)?,
        None => store.load_latest(name)?,
    };
    Ok(config)
}

fn render_diff(diff: &ConfigDiff) -> Result<String> {
    if diff.is_empty() {
        return Ok("No differences\n".to_string());
    }
    let mut output = String::new();
    for change in &diff.settings {
        let _ = writeln!(output, "~ {}: {} -> {}", change.field, change.old, change.new);
    }
    for mapping in &diff.added {
        let _ = writeln!(output, "+ {} -> {}", mapping.source, mapping.target);
    }
    for mapping in &diff.removed {
        let _ = writeln!(output, "- {} -> {}", mapping.source, mapping.target);
    }
    for change in &diff.modified {
        let _ = writeln!(output, "~ {}", change.source);
        output.push_str(&change.unified_diff()?);
    }
    Ok(output)
}
