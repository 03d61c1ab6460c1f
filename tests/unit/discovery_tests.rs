use std::time::{Duration, Instant};

use semver::Version;

use runpad::discovery::candidates::{build_candidates, Candidate};
use runpad::discovery::probe::{parse_banner, parse_major_minor, parse_version};
use runpad::discovery::probe_all;

#[test]
fn candidate_list_covers_bare_and_versioned_names() {
    let labels: Vec<String> = build_candidates(&[]).iter().map(Candidate::label).collect();
    for expected in ["python", "python3", "py", "python3.6", "python3.13", "python36"] {
        assert!(labels.iter().any(|l| l == expected), "missing {expected}");
    }
}

#[test]
fn extra_candidates_are_appended_once() {
    let extra = vec!["/opt/custom/python".to_owned(), "/opt/custom/python".to_owned()];
    let labels: Vec<String> = build_candidates(&extra)
        .iter()
        .map(Candidate::label)
        .collect();
    assert_eq!(
        labels.iter().filter(|l| *l == "/opt/custom/python").count(),
        1
    );
    assert_eq!(labels.last().map(String::as_str), Some("/opt/custom/python"));
}

#[test]
fn launcher_entries_keep_their_arguments() {
    let candidate = Candidate::parse("py -3.12").unwrap();
    assert_eq!(candidate.program, "py");
    assert_eq!(candidate.prefix_args, vec!["-3.12"]);
    assert_eq!(candidate.label(), "py -3.12");
}

#[test]
fn version_parsers_tolerate_real_world_output() {
    assert_eq!(parse_major_minor("3.11\n"), Some((3, 11)));
    assert_eq!(parse_major_minor("3"), None);
    assert_eq!(parse_version("3.12.0b4"), Some(Version::new(3, 12, 0)));
    assert_eq!(parse_version("3.10"), Some(Version::new(3, 10, 0)));
    assert_eq!(parse_version(""), None);
    assert_eq!(parse_banner("Python 3.8.10"), Some(Version::new(3, 8, 10)));
    assert_eq!(parse_banner("bash: python: command not found"), None);
}

#[tokio::test]
async fn nonexistent_candidates_are_skipped_without_stalling() {
    let list = vec![
        Candidate::program("/definitely/missing/python"),
        Candidate::program("runpad-no-such-interpreter"),
    ];
    let started = Instant::now();
    let found = probe_all(list, Duration::from_secs(5), 4).await;
    assert!(found.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}
