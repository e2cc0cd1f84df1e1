use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use his_migrate::apply;
use his_migrate::batch::{self, CancelToken};
use his_migrate::cli::ApplyArgs;
use his_migrate::config::{ColumnMapping, MigrationConfig, TableRef};
use his_migrate::transform::{TransformEngine, Transformer};
use his_migrate::value::{Row, Value};
use tempfile::TempDir;

fn patient_config(batch_size: usize) -> MigrationConfig {
    let mut config = MigrationConfig::new(
        "patients",
        "registration",
        TableRef::new("legacy", "PATIENT"),
        TableRef::new("his", "patient"),
    );
    config.batch_size = batch_size;
    config.mappings = vec![
        ColumnMapping::new("HN", "hn").with_transformers(vec![Transformer::Trim]),
        ColumnMapping::new("BIRTHDATE", "birthDate")
            .with_transformers(vec![Transformer::Trim, Transformer::BuddhistToIso]),
        ColumnMapping::new("SEX", "gender").with_transformers(vec![Transformer::MapGender]),
        ColumnMapping::new("PHONE", "phone").with_transformers(vec![Transformer::FormatPhone]),
        ColumnMapping::new("WEIGHT", "weight").with_transformers(vec![Transformer::ToNumber]),
    ];
    config
}

fn patient_fields(i: usize) -> [String; 5] {
    let sex = match i % 3 {
        0 => "1",
        1 => "female",
        _ => "U",
    };
    let month = (i % 12) + 1;
    let day = (i % 28) + 1;
    [
        format!(" {i:07} "),
        format!("25{:02}-{month:02}-{day:02}", 10 + i % 60),
        sex.to_string(),
        format!("08{:08}", i),
        format!("{}.5", 40 + i % 50),
    ]
}

fn generate_rows(rows: usize) -> Vec<Row> {
    let columns = ["HN", "BIRTHDATE", "SEX", "PHONE", "WEIGHT"];
    (0..rows)
        .map(|i| {
            columns
                .iter()
                .zip(patient_fields(i))
                .map(|(column, field)| (column.to_string(), Value::Text(field)))
                .collect()
        })
        .collect()
}

fn generate_csv(rows: usize) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("patients.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "HN,BIRTHDATE,SEX,PHONE,WEIGHT").expect("header");
    for i in 0..rows {
        writeln!(file, "{}", patient_fields(i).join(",")).expect("row");
    }
    let config_path = temp_dir.path().join("patients.json");
    fs::write(
        &config_path,
        patient_config(1000).to_json_pretty().expect("render config"),
    )
    .expect("write config");
    (temp_dir, csv_path, config_path)
}

fn apply_args(input: &Path, config: &Path, output: &Path) -> ApplyArgs {
    ApplyArgs {
        input: input.to_path_buf(),
        config: config.to_path_buf(),
        output: Some(output.to_path_buf()),
        lookup: None,
        limit: None,
        grade: false,
        delimiter: None,
        output_delimiter: None,
        input_encoding: None,
        output_encoding: None,
    }
}

fn bench_batch_pipeline(c: &mut Criterion) {
    let rows = generate_rows(10_000);
    let config = patient_config(1000);
    let engine = TransformEngine::new();
    let cancel = CancelToken::new();

    let (temp_dir, csv_path, config_path) = generate_csv(20_000);
    let output = temp_dir.path().join("out.csv");
    let args = apply_args(&csv_path, &config_path, &output);

    let mut group = c.benchmark_group("batch_pipeline");

    group.bench_function("apply_batch_in_memory", |b| {
        b.iter(|| batch::apply_batch(&rows, &config, &engine, &cancel).expect("apply batch"));
    });

    group.bench_function("apply_csv_to_csv", |b| {
        b.iter_batched(
            || (),
            |_| {
                apply::execute(&args).expect("apply csv");
            },
            BatchSize::SmallInput,
        );
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_batch_pipeline);
criterion_main!(benches);
