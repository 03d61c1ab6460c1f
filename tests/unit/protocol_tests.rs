//! Protocol engine behaviour over realistic `pdb` transcripts.

use runpad::debugger::protocol::{
    DebugCommand, LineKind, PdbProtocol, ProtocolAction, ProtocolPatterns,
};
use runpad::models::{BreakpointSet, LocationEvent};
use runpad::process::script::ScriptIdentity;

const SCRIPT: &str = "/tmp/runpad-abc123.py";

/// What `python -m pdb` prints for a two-line script with a breakpoint on
/// line 2, from launch to the restart announcement.
const TRANSCRIPT: &str = "> /tmp/runpad-abc123.py(1)<module>()\n\
-> x = 1\n\
(Pdb) Breakpoint 1 at /tmp/runpad-abc123.py:2\n\
(Pdb) > /tmp/runpad-abc123.py(2)<module>()\n\
-> print(x)\n\
(Pdb) ";

fn engine(lines: &[u32]) -> PdbProtocol {
    PdbProtocol::new(
        ProtocolPatterns::pdb().unwrap(),
        ScriptIdentity::new(SCRIPT),
        BreakpointSet::new(lines.iter().copied()),
        true,
    )
}

fn commands(actions: &[ProtocolAction]) -> Vec<DebugCommand> {
    actions
        .iter()
        .filter_map(|a| match a {
            ProtocolAction::Send(cmd) => Some(cmd.clone()),
            _ => None,
        })
        .collect()
}

fn locations(actions: &[ProtocolAction]) -> Vec<u32> {
    actions
        .iter()
        .filter_map(|a| match a {
            ProtocolAction::Location(LocationEvent { line, .. }) => Some(*line),
            _ => None,
        })
        .collect()
}

#[test]
fn transcript_yields_breaks_then_continue_then_location() {
    let mut p = engine(&[2]);
    let actions = p.feed(TRANSCRIPT);

    assert_eq!(
        commands(&actions),
        vec![
            DebugCommand::Break {
                path: SCRIPT.into(),
                line: 2
            },
            DebugCommand::Continue
        ]
    );
    assert_eq!(locations(&actions), vec![1, 2]);
    assert_eq!(p.last_location().map(|l| l.line), Some(2));
}

#[test]
fn byte_by_byte_delivery_matches_single_chunk() {
    let mut whole = engine(&[2, 4]);
    let expected = whole.feed(TRANSCRIPT);

    let mut trickle = engine(&[2, 4]);
    let mut actions = Vec::new();
    for ch in TRANSCRIPT.chars() {
        actions.extend(trickle.feed(&ch.to_string()));
    }

    assert_eq!(actions, expected);
}

#[test]
fn breakpoints_are_sent_once_in_ascending_order() {
    let mut p = engine(&[9, 3, 3, 6]);
    let actions = p.feed("(Pdb) ");
    let sent: Vec<String> = commands(&actions).iter().map(DebugCommand::wire).collect();
    assert_eq!(
        sent,
        vec![
            format!("break {SCRIPT}:3"),
            format!("break {SCRIPT}:6"),
            format!("break {SCRIPT}:9"),
            "continue".to_owned(),
        ]
    );

    let later = p.feed("(Pdb) ");
    assert!(commands(&later).is_empty());
}

#[test]
fn no_breakpoints_means_immediate_continue() {
    let mut p = engine(&[]);
    let actions = p.feed("(Pdb) ");
    assert_eq!(commands(&actions), vec![DebugCommand::Continue]);
}

#[test]
fn ready_marker_follows_every_setup_command() {
    let mut p = engine(&[7, 3, 9]);
    let actions = p.feed("(Pdb) ");

    let ready = actions
        .iter()
        .position(|a| *a == ProtocolAction::Prompt { first: true })
        .expect("first prompt reported");
    assert_eq!(ready, actions.len() - 1);
    assert_eq!(commands(&actions[..ready]).len(), 4);
    assert_eq!(
        actions[ready - 1],
        ProtocolAction::Send(DebugCommand::Continue)
    );
}

#[test]
fn nothing_is_sent_before_the_first_prompt() {
    let mut p = engine(&[2]);
    let actions = p.feed("> /tmp/runpad-abc123.py(1)<module>()\n-> x = 1\n");
    assert!(commands(&actions).is_empty());
    assert!(!p.first_prompt_seen());
}

#[test]
fn library_frames_never_surface() {
    let mut p = engine(&[]);
    p.feed("(Pdb) ");
    let actions = p.feed(
        "> /usr/lib/python3.12/json/__init__.py(231)dumps()\n\
         -> if (not skipkeys and ensure_ascii and\n\
         > <string>(1)<module>()\n(Pdb) ",
    );
    assert!(locations(&actions).is_empty());
}

#[test]
fn differently_spelled_script_path_is_recognized() {
    let mut p = engine(&[]);
    p.feed("(Pdb) ");
    let actions = p.feed("> /tmp/./RUNPAD-abc123.py(5)<module>()\n");
    assert_eq!(locations(&actions), vec![5]);
    let ProtocolAction::Location(event) = &actions[0] else {
        panic!("expected a location");
    };
    assert_eq!(event.path, std::path::PathBuf::from(SCRIPT));
}

#[test]
fn crlf_output_is_handled() {
    let mut p = engine(&[]);
    let actions = p.feed("> /tmp/runpad-abc123.py(1)<module>()\r\n-> x = 1\r\n(Pdb) ");
    assert_eq!(locations(&actions), vec![1]);
    assert_eq!(commands(&actions), vec![DebugCommand::Continue]);
}

#[test]
fn restart_marker_triggers_quit_once() {
    let mut p = engine(&[]);
    p.feed("(Pdb) ");
    let actions = p.feed(
        "done\nThe program finished and will be restarted\n\
         > /tmp/runpad-abc123.py(1)<module>()\n-> x = 1\n(Pdb) ",
    );
    assert_eq!(commands(&actions), vec![DebugCommand::Quit]);
    assert!(locations(&actions).is_empty());
}

#[test]
fn classifier_handles_windows_locations() {
    let patterns = ProtocolPatterns::pdb().unwrap();
    assert_eq!(
        patterns.classify(r"> c:\users\me\temp\runpad-x.py(14)<module>()"),
        LineKind::Location {
            path: r"c:\users\me\temp\runpad-x.py".into(),
            line: 14
        }
    );
}

#[test]
fn classifier_treats_prompt_lookalikes_as_plain() {
    let patterns = ProtocolPatterns::pdb().unwrap();
    assert_eq!(patterns.classify("(Pdb) p x"), LineKind::Plain);
    assert_eq!(patterns.classify("(Pdb"), LineKind::Plain);
    assert_eq!(patterns.classify("> not a location"), LineKind::Plain);
    assert_eq!(patterns.strip_prompt_prefix("(Pdb) p x"), Some("p x"));
    assert_eq!(patterns.strip_prompt_prefix("x (Pdb) "), None);
}

#[test]
fn custom_patterns_drive_another_debugger() {
    let patterns = ProtocolPatterns::new(
        r"^\(dbg\)\s*$",
        r"^\(dbg\) ",
        r"^at (?P<file>\S+):(?P<line>\d+)",
        r"^program exited",
    )
    .unwrap();
    let mut p = PdbProtocol::new(
        patterns,
        ScriptIdentity::new(SCRIPT),
        BreakpointSet::new([4]),
        true,
    );

    let actions = p.feed("(dbg) ");
    assert_eq!(commands(&actions).len(), 2);
    let actions = p.feed("at /tmp/runpad-abc123.py:4\nprogram exited\n");
    assert_eq!(locations(&actions), vec![4]);
    assert_eq!(commands(&actions), vec![DebugCommand::Quit]);
}
