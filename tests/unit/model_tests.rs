use std::path::PathBuf;

use semver::Version;

use runpad::models::{BreakpointSet, InterpreterDescriptor, LocationEvent, SessionEvent};
use runpad::USER_STOPPED_EXIT_CODE;

fn descriptor(name: &str, version: Option<Version>) -> InterpreterDescriptor {
    InterpreterDescriptor {
        name: name.into(),
        path: PathBuf::from(format!("/usr/bin/{name}")),
        banner: format!("Python {name}"),
        version,
        architecture: "64bit".into(),
        prefix: "/usr".into(),
    }
}

#[test]
fn breakpoints_are_sorted_unique_and_positive() {
    let set = BreakpointSet::new([5, 2, 5, 0, 3, 2]);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 3, 5]);
    assert_eq!(set.len(), 3);
    assert!(!set.is_empty());
    assert!(BreakpointSet::new([0]).is_empty());
}

#[test]
fn breakpoints_collect_from_iterators() {
    let set: BreakpointSet = vec![9, 1].into_iter().collect();
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 9]);
}

#[test]
fn only_finished_is_terminal() {
    assert!(SessionEvent::Finished { exit_code: Some(0) }.is_finished());
    assert!(SessionEvent::Finished { exit_code: None }.is_finished());
    assert!(!SessionEvent::Started.is_finished());
    assert!(!SessionEvent::Output("x".into()).is_finished());
    assert!(!SessionEvent::Error("x".into()).is_finished());
}

#[test]
fn user_stopped_sentinel_is_minus_one() {
    assert_eq!(USER_STOPPED_EXIT_CODE, -1);
}

#[test]
fn location_serializes_path_and_line() {
    let event = LocationEvent {
        path: PathBuf::from("/tmp/runpad-a.py"),
        line: 12,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["path"], "/tmp/runpad-a.py");
    assert_eq!(json["line"], 12);
}

#[test]
fn interpreters_rank_newest_first_unknown_last() {
    let mut list = vec![
        descriptor("a", Some(Version::new(3, 9, 1))),
        descriptor("b", None),
        descriptor("c", Some(Version::new(3, 13, 0))),
        descriptor("d", Some(Version::new(3, 11, 7))),
    ];
    list.sort_by(InterpreterDescriptor::rank_cmp);
    let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["c", "d", "a", "b"]);
}

#[test]
fn display_name_combines_banner_and_architecture() {
    let d = descriptor("3.12", Some(Version::new(3, 12, 0)));
    assert_eq!(d.display_name(), "Python 3.12 (64bit)");
}

#[test]
fn descriptor_serializes_version_as_string() {
    let d = descriptor("x", Some(Version::new(3, 12, 1)));
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["version"], "3.12.1");
    assert_eq!(json["architecture"], "64bit");
}
