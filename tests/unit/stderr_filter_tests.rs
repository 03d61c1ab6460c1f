use runpad::debugger::stderr::StderrFilter;

#[test]
fn readline_noise_is_suppressed_across_chunks() {
    let mut filter = StderrFilter::readline_noise();
    assert!(filter
        .filter("AttributeError: module 'readline' has no attribute 'backend'\n")
        .is_none());
    assert!(filter
        .filter("  File \"C:\\Python313\\Lib\\pdb.py\", line 1\n")
        .is_none());
    assert_eq!(
        filter.filter("NameError: name 'y' is not defined\n").as_deref(),
        Some("NameError: name 'y' is not defined\n")
    );
}

#[test]
fn user_traceback_right_after_noise_is_kept_whole() {
    let mut filter = StderrFilter::readline_noise();
    assert!(filter
        .filter("AttributeError: module 'readline' has no attribute 'backend'\n")
        .is_none());
    let traceback = "Traceback (most recent call last):\n  \
                     File \"/tmp/runpad-x.py\", line 2, in <module>\n\
                     ZeroDivisionError: division by zero\n";
    assert_eq!(filter.filter(traceback).as_deref(), Some(traceback));
}

#[test]
fn suppression_ends_at_first_unrelated_line() {
    let mut filter = StderrFilter::readline_noise();
    let kept = filter.filter("readline.backend missing\nuser warning\nFile \"x\"\n");
    assert_eq!(kept.as_deref(), Some("user warning\nFile \"x\"\n"));
}

#[test]
fn genuine_errors_pass_untouched() {
    let mut filter = StderrFilter::readline_noise();
    let text = "Traceback (most recent call last):\n  File \"a.py\", line 2\nZeroDivisionError\n";
    assert_eq!(filter.filter(text).as_deref(), Some(text));
}

#[test]
fn custom_markers_are_honored() {
    let mut filter = StderrFilter::new(&["DeprecationWarning"]);
    assert_eq!(
        filter.filter("x.py:1: DeprecationWarning: old\nreal\n").as_deref(),
        Some("real\n")
    );
}

#[test]
fn unterminated_chunk_is_kept_as_is() {
    let mut filter = StderrFilter::default();
    assert_eq!(filter.filter("partial").as_deref(), Some("partial"));
}
