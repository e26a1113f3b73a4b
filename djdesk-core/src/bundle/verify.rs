// djdesk-core/src/bundle/verify.rs
use std::collections::HashMap;
use std::path::Path;

use djdesk_aio::process::{captured_text, run_command_async, status_label};
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::Config;
use tracing::info;

const IMPORT_CHECK: &str = "import django, djdesk, sys; sys.stdout.write(django.get_version())";

/// Imports Django and the application package using only the bundle's own
/// sources on the path. Returns the Django version string.
pub async fn verify_bundle(python: &Path, config: &Config) -> Result<String> {
    info!("Verifying bundle Python environment...");
    let mut envs = HashMap::new();
    envs.insert(
        "PYTHONPATH".to_string(),
        config.python_path_with(&[&config.bundle_src_dir()]),
    );

    let output = run_command_async(
        python,
        vec!["-c".into(), IMPORT_CHECK.into()],
        Some(config.bundle_root()),
        Some(envs),
    )
    .await
    .map_err(|e| match e {
        DjdeskError::ExternalTool { status, output, .. } => {
            DjdeskError::BundleVerificationFailed { status, output }
        }
        other => other,
    })?;

    if !output.status.success() {
        return Err(DjdeskError::BundleVerificationFailed {
            status: status_label(&output.status),
            output: captured_text(&output),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!("Verified Django {} inside bundle.", version);
    Ok(version)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bundle::sources::copy_project_sources;
    use crate::test_support::{fake_python, scaffold_project};

    #[tokio::test]
    async fn passes_when_package_is_in_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(dir.path());
        scaffold_project(&config, &[]);
        std::fs::create_dir_all(config.bundle_root()).unwrap();
        copy_project_sources(&config).unwrap();
        let python = dir.path().join("fake-python");
        fake_python(&python);

        assert_eq!(verify_bundle(&python, &config).await.unwrap(), "5.2.8");
    }

    #[tokio::test]
    async fn missing_package_fails_with_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(dir.path());
        scaffold_project(&config, &[]);
        std::fs::create_dir_all(config.bundle_root()).unwrap();
        copy_project_sources(&config).unwrap();
        std::fs::remove_dir_all(config.bundle_src_dir().join("djdesk")).unwrap();
        let python = dir.path().join("fake-python");
        fake_python(&python);

        match verify_bundle(&python, &config).await.unwrap_err() {
            DjdeskError::BundleVerificationFailed { status, output } => {
                assert_eq!(status, "1");
                assert!(output.contains("No module named 'djdesk'"), "{output}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstartable_interpreter_is_a_verification_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(dir.path());
        std::fs::create_dir_all(config.bundle_root()).unwrap();
        let err = verify_bundle(&dir.path().join("absent-python"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, DjdeskError::BundleVerificationFailed { .. }));
    }
}
