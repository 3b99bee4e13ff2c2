//! Configuration loading: repository.toml, environment overrides and the factory.

mod support;

use std::io::Write;
use std::path::Path;

use fantasy_rounds::algorithms::{RoundEngineError, RoundParameters};
use fantasy_rounds::db::{RepositoryConfig, RepositoryFactory, RepositoryType, RoundSettings};

const ROUND_VARS: [&str; 3] = ["ROUNDS_TOLERANCE", "ROUNDS_SPACING", "ROUNDS_MAX_ROUNDS"];

fn cleared_round_vars() -> Vec<(&'static str, Option<&'static str>)> {
    ROUND_VARS.iter().map(|k| (*k, None)).collect()
}

#[test]
fn test_round_parameters_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[repository]
type = "local"

[rounds]
tolerance = 0
spacing = 5
max_rounds = 8
"#
    )
    .unwrap();

    let config = RepositoryConfig::from_file(file.path()).unwrap();
    let params = support::with_scoped_env(&cleared_round_vars(), || {
        config.round_parameters().unwrap()
    });
    assert_eq!(
        params,
        RoundParameters {
            tolerance: 0,
            spacing: 5,
            max_rounds: 8,
        }
    );
}

#[test]
fn test_environment_overrides_file_values() {
    let config: RepositoryConfig = toml::from_str(
        r#"
[repository]
type = "local"

[rounds]
spacing = 5
"#,
    )
    .unwrap();

    let params = support::with_scoped_env(
        &[
            ("ROUNDS_TOLERANCE", Some("2")),
            ("ROUNDS_SPACING", Some("9")),
            ("ROUNDS_MAX_ROUNDS", None),
        ],
        || config.round_parameters().unwrap(),
    );
    assert_eq!(params.tolerance, 2);
    assert_eq!(params.spacing, 9);
    assert_eq!(params.max_rounds, RoundParameters::default().max_rounds);
}

#[test]
fn test_unparsable_override_is_parameter_error() {
    let result = support::with_scoped_env(
        &[
            ("ROUNDS_TOLERANCE", None),
            ("ROUNDS_SPACING", Some("weekly")),
            ("ROUNDS_MAX_ROUNDS", None),
        ],
        || RoundSettings::default().with_env_overrides(),
    );
    assert!(matches!(result, Err(RoundEngineError::ParameterError(_))));
}

#[test]
fn test_spacing_below_minimum_is_rejected() {
    let settings = RoundSettings {
        spacing: 2,
        ..Default::default()
    };
    assert!(matches!(
        settings.to_parameters(),
        Err(RoundEngineError::ParameterError(_))
    ));
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let err = RepositoryConfig::from_file("/nonexistent/repository.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

fn write_config(path: &Path, spacing: i64) {
    std::fs::write(
        path,
        format!("[repository]\ntype = \"local\"\n\n[rounds]\nspacing = {}\n", spacing),
    )
    .unwrap();
}

#[test]
fn test_discover_reads_rounds_from_backend_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("backend")).unwrap();
    write_config(&dir.path().join("backend/repository.toml"), 5);

    let config = RepositoryConfig::discover(dir.path()).unwrap().unwrap();
    assert_eq!(config.rounds.spacing, 5);

    let params = support::with_scoped_env(&cleared_round_vars(), || {
        config.round_parameters().unwrap()
    });
    assert_eq!(params.spacing, 5);
    assert_eq!(params.tolerance, RoundParameters::default().tolerance);
}

#[test]
fn test_discover_prefers_working_directory_over_backend() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("backend")).unwrap();
    write_config(&dir.path().join("repository.toml"), 9);
    write_config(&dir.path().join("backend/repository.toml"), 5);

    assert_eq!(
        RepositoryConfig::locate(dir.path()),
        Some(dir.path().join("repository.toml"))
    );
    let config = RepositoryConfig::discover(dir.path()).unwrap().unwrap();
    assert_eq!(config.rounds.spacing, 9);
}

#[test]
fn test_discover_falls_back_to_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir(&work).unwrap();
    write_config(&dir.path().join("repository.toml"), 6);

    let config = RepositoryConfig::discover(&work).unwrap().unwrap();
    assert_eq!(config.rounds.spacing, 6);
}

#[test]
fn test_discover_without_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("league").join("work");
    std::fs::create_dir_all(&work).unwrap();

    assert!(RepositoryConfig::locate(&work).is_none());
    assert!(RepositoryConfig::discover(&work).unwrap().is_none());
}

#[test]
fn test_discover_reports_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("repository.toml"), "[repository\ntype = ").unwrap();

    let err = RepositoryConfig::discover(dir.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
        ],
        || assert_eq!(RepositoryType::from_env(), RepositoryType::Local),
    );
}

#[test]
fn test_repository_type_from_env_with_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", Some("postgres://localhost/league")),
        ],
        || assert_eq!(RepositoryType::from_env(), RepositoryType::Postgres),
    );
}

#[tokio::test]
async fn test_factory_from_config_file_builds_local_repository() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[repository]\ntype = \"local\"").unwrap();

    let repo = RepositoryFactory::from_config_file(file.path()).await.unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[cfg(not(feature = "postgres-repo"))]
#[tokio::test]
async fn test_postgres_type_without_feature_is_rejected() {
    let result = RepositoryFactory::create(RepositoryType::Postgres, None).await;
    assert!(result.is_err());
}
