use std::{io::Write, path::Path, sync::Arc};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    batch::{self, CancelToken},
    cli::ApplyArgs,
    config::MigrationConfig,
    io_utils, printable_delimiter, table,
    transform::{ReferenceTables, TransformEngine},
    validate::{self, ValidationReport},
    value::Row,
};

pub fn execute(args: &ApplyArgs) -> Result<()> {
    let config = MigrationConfig::load(&args.config)
        .with_context(|| format!("Loading mapping configuration {:?}", args.config))?;
    let engine = build_engine(args.lookup.as_deref())?;

    let input_delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let output_path = args.output.as_deref();
    let output_delimiter =
        io_utils::resolve_output_delimiter(output_path, args.output_delimiter, input_delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    info!(
        "Applying '{}' to {:?} (delimiter '{}', batch size {})",
        config.name,
        args.input,
        printable_delimiter(input_delimiter),
        config.batch_size
    );

    let mut reader = io_utils::open_csv_reader_from_path(&args.input, input_delimiter)?;
    let writer = io_utils::open_csv_writer(output_path, output_delimiter, output_encoding)?;
    let mut sink = BatchSink::new(&config, &engine, writer, args.grade)?;
    io_utils::for_each_record(&mut reader, input_encoding, args.limit, |headers, fields| {
        sink.push(io_utils::record_to_row(headers, fields))
    })
    .with_context(|| format!("Reading rows from {:?}", args.input))?;
    let summary = sink.finish()?;
    info!(
        "Transformed {} row(s) in {} batch(es)",
        summary.rows, summary.batches
    );

    if let Some(report) = summary.report {
        let rendered = render_report(&report);
        let to_stdout = output_path.is_some_and(|path| !io_utils::is_dash(path));
        if to_stdout {
            print!("{rendered}");
        } else {
            eprint!("{rendered}");
        }
        info!(
            "Validator grading found {} failing value(s)",
            report.total_failures()
        );
    }
    Ok(())
}

fn build_engine(lookup: Option<&Path>) -> Result<TransformEngine> {
    let Some(path) = lookup else {
        return Ok(TransformEngine::new());
    };
    let tables = ReferenceTables::load(path)
        .with_context(|| format!("Loading reference tables from {path:?}"))?;
    info!(
        "Loaded {} reference table(s) from {:?}",
        tables.table_count(),
        path
    );
    Ok(TransformEngine::with_resolver(Arc::new(tables)))
}

struct BatchSummary {
    rows: usize,
    batches: usize,
    report: Option<ValidationReport>,
}

/// Buffers source rows and transforms them `batchSize` at a time.
struct BatchSink<'a> {
    config: &'a MigrationConfig,
    engine: &'a TransformEngine,
    cancel: CancelToken,
    writer: csv::Writer<Box<dyn Write>>,
    headers: Vec<String>,
    pending: Vec<Row>,
    report: Option<ValidationReport>,
    rows: usize,
    batches: usize,
}

impl<'a> BatchSink<'a> {
    fn new(
        config: &'a MigrationConfig,
        engine: &'a TransformEngine,
        mut writer: csv::Writer<Box<dyn Write>>,
        grade: bool,
    ) -> Result<Self> {
        let headers = config
            .active_mappings()
            .map(|mapping| mapping.target.clone())
            .collect::<Vec<_>>();
        writer.write_record(&headers)?;
        Ok(Self {
            config,
            engine,
            cancel: CancelToken::new(),
            writer,
            headers,
            pending: Vec::with_capacity(config.batch_size.min(10_000)),
            report: grade.then(ValidationReport::default),
            rows: 0,
            batches: 0,
        })
    }

    fn push(&mut self, row: Row) -> Result<()> {
        self.pending.push(row);
        if self.pending.len() >= self.config.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending);
        let transformed = batch::apply_batch(&rows, self.config, self.engine, &self.cancel)?;
        for row in &transformed {
            io_utils::write_row(&mut self.writer, &self.headers, row)?;
        }
        if let Some(report) = self.report.as_mut() {
            report.absorb(validate::grade(&transformed, self.config));
        }
        self.rows += transformed.len();
        self.batches += 1;
        debug!(
            "Batch {} complete ({} row(s) so far)",
            self.batches, self.rows
        );
        Ok(())
    }

    fn finish(mut self) -> Result<BatchSummary> {
        self.flush_batch()?;
        self.writer.flush()?;
        Ok(BatchSummary {
            rows: self.rows,
            batches: self.batches,
            report: self.report,
        })
    }
}

fn render_report(report: &ValidationReport) -> String {
    let headers = ["target", "validator", "checked", "failed", "pass rate", "failing samples"]
        .map(str::to_string);
    let rows = report
        .grades
        .iter()
        .map(|grade| {
            vec![
                grade.target.clone(),
                grade.validator.to_string(),
                grade.checked.to_string(),
                grade.failed.to_string(),
                format!("{:.1}%", grade.pass_rate() * 100.0),
                grade.failing_samples.join(" | "),
            ]
        })
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows)
}
