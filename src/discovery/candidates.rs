//! Candidate interpreter enumeration.

use std::collections::HashSet;
use std::path::PathBuf;

/// Oldest and newest `3.x` minor versions probed by name.
const MINOR_RANGE: std::ops::RangeInclusive<u32> = 6..=13;

/// Conventional Unix install locations.
const UNIX_PATHS: &[&str] = &[
    "/usr/bin/python3",
    "/usr/local/bin/python3",
    "/opt/python/bin/python3",
    "/usr/bin/python",
    "/usr/local/bin/python",
];

/// A program invocation that may turn out to be an interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// Executable name or path.
    pub program: String,
    /// Arguments preceding every query (`-3.12` for the Windows launcher).
    pub prefix_args: Vec<String>,
}

impl Candidate {
    /// A bare executable name or path.
    #[must_use]
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Label used for display and dedup of the candidate list.
    #[must_use]
    pub fn label(&self) -> String {
        if self.prefix_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.prefix_args.join(" "))
        }
    }

    /// Parse a user-supplied entry such as `py -3.12` or `/opt/py/bin/python`.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let mut words = entry.split_whitespace();
        let program = words.next()?.to_owned();
        Some(Self {
            program,
            prefix_args: words.map(str::to_owned).collect(),
        })
    }
}

/// Build the ordered, deduplicated candidate list for the current platform.
#[must_use]
pub fn build_candidates(extra: &[String]) -> Vec<Candidate> {
    let mut list: Vec<Candidate> = ["python", "python3", "py"]
        .into_iter()
        .map(Candidate::program)
        .collect();

    for minor in MINOR_RANGE {
        list.push(Candidate::program(format!("python3.{minor}")));
        list.push(Candidate::program(format!("python3{minor}")));
    }

    if cfg!(windows) {
        for minor in MINOR_RANGE {
            list.push(Candidate {
                program: "py".into(),
                prefix_args: vec![format!("-3.{minor}")],
            });
        }
    } else {
        list.extend(UNIX_PATHS.iter().copied().map(Candidate::program));
    }

    list.extend(
        install_root_matches()
            .into_iter()
            .map(|path| Candidate::program(path.to_string_lossy().into_owned())),
    );
    list.extend(extra.iter().filter_map(|entry| Candidate::parse(entry)));

    dedup(list)
}

/// Glob patterns for per-user and per-machine install roots.
fn install_root_patterns() -> Vec<String> {
    let mut patterns = Vec::new();
    if cfg!(windows) {
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            patterns.push(format!("{local}\\Programs\\Python\\Python3*\\python.exe"));
        }
        patterns.push("C:\\Python3*\\python.exe".to_owned());
    } else {
        if let Ok(home) = std::env::var("HOME") {
            patterns.push(format!("{home}/.pyenv/versions/*/bin/python"));
        }
        patterns.push("/opt/homebrew/bin/python3.*".to_owned());
    }
    patterns
}

fn install_root_matches() -> Vec<PathBuf> {
    let mut found = Vec::new();
    for pattern in install_root_patterns() {
        match glob::glob(&pattern) {
            Ok(paths) => found.extend(paths.filter_map(std::result::Result::ok)),
            Err(err) => tracing::debug!(pattern, %err, "skipping invalid install-root pattern"),
        }
    }
    found.sort();
    found
}

fn dedup(list: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|candidate| seen.insert(candidate.label()))
        .collect()
}
