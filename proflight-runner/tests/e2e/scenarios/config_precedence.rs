//! Configuration precedence: CLI > env > file > defaults.

use std::io::Write;

use serial_test::serial;

use proflight_core::CloudClients;
use proflight_runner::RunError;
use proflight_runner::app::{execute, load_config};
use proflight_runner::cli::RunnerCli;

/// Sets environment variables for the lifetime of the guard.
struct EnvGuard {
    originals: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn set(vars: &[(&str, Option<&str>)]) -> Self {
        let originals = vars
            .iter()
            .map(|(key, _)| ((*key).to_owned(), std::env::var(key).ok()))
            .collect();
        // SAFETY: env tests run under #[serial]
        unsafe {
            for (key, value) in vars {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
        Self { originals }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: env tests run under #[serial]
        unsafe {
            for (key, original) in &self.originals {
                match original {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{content}").expect("write config");
    file
}

#[tokio::test]
#[serial]
async fn flag_beats_env_beats_file() {
    let file = config_file(
        "[cloud]\nproject_id = \"file-project\"\nzone = \"file-zone\"\nbucket_name = \"file-bucket\"\n\
         [run]\ncommit = \"file-commit\"\n",
    );
    let _env = EnvGuard::set(&[
        ("PROFLIGHT_CLOUD_ZONE", Some("env-zone")),
        ("PROFLIGHT_RUN_COMMIT", Some("env-commit")),
        ("PROFLIGHT_CLOUD_PROJECT_ID", None),
        ("GCLOUD_TESTS_GOLANG_PROJECT_ID", None),
        ("GCLOUD_TESTS_GOLANG_ZONE", None),
    ]);
    let cli = RunnerCli {
        config: Some(file.path().to_path_buf()),
        commit: Some("flag-commit".to_owned()),
        ..RunnerCli::default()
    };

    let config = load_config(&cli).await.unwrap();

    assert_eq!(config.cloud.project_id, "file-project");
    assert_eq!(config.cloud.bucket_name, "file-bucket");
    assert_eq!(config.cloud.zone, "env-zone");
    assert_eq!(config.run.commit, "flag-commit");
}

#[tokio::test]
#[serial]
async fn legacy_env_supplies_project_and_zone_without_file() {
    let _env = EnvGuard::set(&[
        ("GCLOUD_TESTS_GOLANG_PROJECT_ID", Some("legacy-project")),
        ("GCLOUD_TESTS_GOLANG_ZONE", Some("legacy-zone")),
        ("PROFLIGHT_CLOUD_PROJECT_ID", None),
        ("PROFLIGHT_CLOUD_ZONE", None),
    ]);

    let config = load_config(&RunnerCli::default()).await.unwrap();

    assert_eq!(config.cloud.project_id, "legacy-project");
    assert_eq!(config.cloud.zone, "legacy-zone");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn file_with_zero_query_timeout_is_rejected_before_connecting() {
    let file = config_file(
        "[cloud]\nproject_id = \"p\"\nzone = \"z\"\nbucket_name = \"b\"\n\
         [timeouts]\nquery_timeout_secs = 0\n",
    );
    let cli = RunnerCli {
        config: Some(file.path().to_path_buf()),
        ..RunnerCli::default()
    };
    let config = load_config(&cli).await.unwrap();

    let err = execute(
        config,
        &proflight_core::RunId::from_timestamp(1),
        None,
        tokio_util::sync::CancellationToken::new(),
        |_| async {
            Err::<CloudClients, _>(RunError::Setup("connect must not run".to_owned()))
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("query_timeout_secs"));
}
