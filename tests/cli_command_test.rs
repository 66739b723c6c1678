#![cfg(feature = "cli")]

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use student_criteria::core::ConfigProvider;
use student_criteria::{
    CliConfig, NewStudent, QueryCommand, QueryError, ServiceOptions, SqliteBackend,
    StudentQueryService, TiePolicy,
};
use tempfile::{NamedTempFile, TempDir};

async fn service() -> Result<StudentQueryService<SqliteBackend>> {
    let backend = SqliteBackend::in_memory()?;
    backend
        .insert_many(&[
            NewStudent::new("Ann", 20, "X", "0912345678"),
            NewStudent::new("Ann", 21, "X", "12345"),
            NewStudent::new("Bob", 30, "Y", "0987654321"),
        ])
        .await?;
    Ok(StudentQueryService::new(backend))
}

#[tokio::test]
async fn test_count_by_age_renders_as_json_object() -> Result<()> {
    let service = service().await?;
    let value = QueryCommand::CountByAge.execute(&service).await?;
    assert_eq!(value, json!({"20": 1, "21": 1, "30": 1}));
    Ok(())
}

#[tokio::test]
async fn test_youngest_renders_student_object() -> Result<()> {
    let service = service().await?;
    let value = QueryCommand::YoungestByAddress {
        address: "Y".to_string(),
    }
    .execute(&service)
    .await?;
    assert_eq!(value["name"], "Bob");
    assert_eq!(value["age"], 30);
    assert_eq!(value["phone"], "0987654321");
    Ok(())
}

#[tokio::test]
async fn test_each_list_command_runs() -> Result<()> {
    let service = service().await?;
    let cases = [
        (QueryCommand::AgeRange { min: 20, max: 21 }, 2),
        (
            QueryCommand::NameKeyword {
                keyword: "Bo".to_string(),
            },
            1,
        ),
        (QueryCommand::OrderByNameAge, 3),
        (QueryCommand::MaxAge, 1),
        (QueryCommand::DistinctAddresses, 2),
        (QueryCommand::InvalidPhone, 1),
        (QueryCommand::Duplicates, 2),
    ];

    for (command, expected) in cases {
        let value = command.execute(&service).await?;
        let items = value
            .as_array()
            .unwrap_or_else(|| panic!("{} did not return an array", command.name()));
        assert_eq!(items.len(), expected, "{}", command.name());
    }
    Ok(())
}

#[tokio::test]
async fn test_lookup_failure_propagates() -> Result<()> {
    let service = service().await?;
    let result = QueryCommand::YoungestByAddress {
        address: "Z".to_string(),
    }
    .execute(&service)
    .await;
    assert!(matches!(result, Err(QueryError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_config_file_and_seed_csv_end_to_end() -> Result<()> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("school.db");

    let mut csv_file = NamedTempFile::new()?;
    writeln!(csv_file, "name,age,address,phone")?;
    writeln!(csv_file, "Ann,18,Taipei,0912345678")?;
    writeln!(csv_file, "Ben,18,Taipei,0912345679")?;
    csv_file.flush()?;

    let mut toml_file = NamedTempFile::new()?;
    writeln!(
        toml_file,
        "[database]\npath = {:?}\n\n[query]\ntie_policy = \"strict\"\n",
        db_path.to_string_lossy()
    )?;
    toml_file.flush()?;

    let toml_path = toml_file.path().to_string_lossy().to_string();
    let csv_path = csv_file.path().to_string_lossy().to_string();
    let cli = CliConfig::try_parse_from([
        "student-criteria",
        "--config",
        toml_path.as_str(),
        "--seed-csv",
        csv_path.as_str(),
        "youngest-by-address",
        "Taipei",
    ])?;
    let config = cli.resolve()?;
    assert_eq!(config.tie_policy(), TiePolicy::Strict);

    let backend = SqliteBackend::from_config(&config).await?;
    assert_eq!(backend.row_count().await?, 2);

    let service = StudentQueryService::with_options(backend, ServiceOptions::from_config(&config));
    let result = cli.command.execute(&service).await;
    assert!(matches!(
        result,
        Err(QueryError::Multiplicity { actual: 2, .. })
    ));
    assert!(db_path.exists());
    Ok(())
}

fn write_seed_csv() -> Result<NamedTempFile> {
    let mut csv_file = NamedTempFile::new()?;
    writeln!(csv_file, "name,age,address,phone")?;
    writeln!(csv_file, "Ann,20,X,0912345678")?;
    writeln!(csv_file, "Bob,30,Y,0987654321")?;
    csv_file.flush()?;
    Ok(csv_file)
}

/// One CLI invocation: parse, resolve, open (and maybe seed), run.
async fn run_once(db_path: &Path, csv_path: &Path, command: &str) -> Result<serde_json::Value> {
    let db = db_path.to_string_lossy().to_string();
    let csv = csv_path.to_string_lossy().to_string();
    let cli = CliConfig::try_parse_from([
        "student-criteria",
        "--database",
        db.as_str(),
        "--seed-csv",
        csv.as_str(),
        command,
    ])?;
    let config = cli.resolve()?;
    let backend = SqliteBackend::from_config(&config).await?;
    let service = StudentQueryService::with_options(backend, ServiceOptions::from_config(&config));
    Ok(cli.command.execute(&service).await?)
}

#[tokio::test]
async fn test_repeated_runs_seed_only_once() -> Result<()> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("school.db");
    let csv_file = write_seed_csv()?;

    let first = run_once(&db_path, csv_file.path(), "count-by-age").await?;
    let second = run_once(&db_path, csv_file.path(), "count-by-age").await?;
    assert_eq!(first, json!({"20": 1, "30": 1}));
    assert_eq!(second, first);

    let duplicates = run_once(&db_path, csv_file.path(), "duplicates").await?;
    assert_eq!(duplicates, json!([]));

    let backend = SqliteBackend::open(&db_path)?;
    assert_eq!(backend.row_count().await?, 2);
    Ok(())
}
