use std::{fs, sync::Arc};

use anyhow::{Context, Result, anyhow, ensure};
use itertools::Itertools;
use log::info;

use crate::{
    analyze::{self, CharRatioScorer, ColumnRecommendation, NameMatcher},
    cli::AnalyzeArgs,
    config::{MigrationConfig, TableRef},
    io_utils, printable_delimiter, table,
};

pub fn execute(args: &AnalyzeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Sampling up to {} row(s) from {:?} with delimiter '{}'",
        args.sample_rows,
        args.input,
        printable_delimiter(delimiter)
    );
    let sample = io_utils::read_table_sample(&args.input, delimiter, encoding, args.sample_rows)
        .with_context(|| format!("Reading sample rows from {:?}", args.input))?;

    let candidates = args
        .target_columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut matcher = NameMatcher::new();
    if let Some(threshold) = args.similarity_threshold {
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "Similarity threshold must be between 0 and 1, got {threshold}"
        );
        matcher = matcher
            .with_scorer(Arc::new(CharRatioScorer))
            .with_threshold(threshold);
    }

    let recommendations = analyze::analyze_table(&sample, &candidates, &matcher);
    info!(
        "Analyzed {} column(s) over {} sampled row(s)",
        recommendations.len(),
        sample.rows.len()
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }

    if let Some(output) = &args.output {
        let config = draft_config(args, &recommendations)?;
        config
            .validate()
            .with_context(|| format!("Drafted configuration '{}' is invalid", config.name))?;
        fs::write(output, config.to_json_pretty()?)
            .with_context(|| format!("Writing draft configuration to {output:?}"))?;
        info!(
            "Draft configuration '{}' with {} mapping(s) written to {:?}",
            config.name,
            config.mappings.len(),
            output
        );
    }
    Ok(())
}

fn draft_config(args: &AnalyzeArgs, recommendations: &[ColumnRecommendation]) -> Result<MigrationConfig> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !io_utils::is_dash(&args.input) && !stem.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("--name is required when the input has no file name"))?,
    };
    let source_table = args.source_table.clone().unwrap_or_else(|| name.clone());
    let target_table = args.target_table.clone().unwrap_or_else(|| name.clone());
    Ok(MigrationConfig::draft(
        name,
        args.module.clone(),
        TableRef::new(args.source_db.clone(), source_table),
        TableRef::new(args.target_db.clone(), target_table),
        recommendations,
    ))
}

fn print_recommendations(recommendations: &[ColumnRecommendation]) {
    let headers = [
        "source",
        "target",
        "matched",
        "confidence",
        "ignore",
        "transformers",
        "validators",
        "reason",
    ]
    .map(str::to_string);
    let rows = recommendations
        .iter()
        .map(|rec| {
            let analysis = &rec.analysis;
            let target = if analysis.is_match {
                rec.target.clone()
            } else {
                format!("{} (?)", rec.target)
            };
            vec![
                rec.source.clone(),
                target,
                rec.matched_by
                    .map(|strategy| strategy.to_string())
                    .unwrap_or_else(|| "guess".to_string()),
                format!("{:.2}", analysis.confidence_score),
                if analysis.should_ignore { "yes" } else { "" }.to_string(),
                analysis.transformers.iter().join(","),
                analysis.validators.iter().join(","),
                analysis.reason.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}
