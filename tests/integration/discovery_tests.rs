//! Discovery against the interpreter installed on the test machine.

use std::path::Path;
use std::time::Duration;

use runpad::config::DiscoveryConfig;
use runpad::discovery::{discover, probe_path, probe_version};
use serial_test::serial;

use super::test_helpers::python;

const PROBE_WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
#[serial]
async fn probe_path_describes_python3() {
    let Some(python) = python() else { return };

    let found = probe_path(&python, PROBE_WAIT).await.expect("python3 probes");
    assert!(found.banner.starts_with("Python 3"));
    assert_eq!(found.version.as_ref().map(|v| v.major), Some(3));
    assert!(found.path.is_absolute(), "path should be self-reported");
}

#[tokio::test]
#[serial]
async fn probe_version_reads_major_minor() {
    let Some(python) = python() else { return };

    let (major, _minor) = probe_version(&python, PROBE_WAIT)
        .await
        .expect("version probe");
    assert_eq!(major, 3);
}

#[tokio::test]
async fn probe_path_rejects_non_interpreters() {
    assert!(probe_path(Path::new("/definitely/not/python"), PROBE_WAIT)
        .await
        .is_none());
}

#[tokio::test]
#[serial]
async fn discover_finds_python3_once() {
    let Some(python) = python() else { return };
    let own = probe_path(&python, PROBE_WAIT).await.expect("python3 probes");

    let config = DiscoveryConfig {
        extra_candidates: vec!["python3".into(), "python3".into()],
        ..DiscoveryConfig::default()
    };
    let found = discover(&config).await;

    let matches = found.iter().filter(|i| i.path == own.path).count();
    assert_eq!(matches, 1, "each interpreter is listed once: {found:#?}");
}
