//! How the debugger is launched for a given platform and interpreter.
//!
//! Most interpreters are debugged with `python -m pdb <script>`. Some
//! combinations need a small generated wrapper that patches the
//! interpreter before `pdb` starts. [`CAPABILITY_TABLE`] records those
//! combinations as data; [`select_strategy`] looks one up, and
//! [`plan_launch`] turns the chosen strategy into interpreter arguments
//! plus any ephemeral bootstrap file.
//!
//! An unknown interpreter version always selects
//! [`BootstrapStrategy::Direct`].

use std::ffi::OsString;
use std::path::Path;

use tracing::info;

use crate::process::script::EphemeralScript;
use crate::Result;

/// File-name suffix for generated bootstrap scripts.
pub const BOOTSTRAP_SUFFIX: &str = "_bootstrap.py";

/// Operating-system family relevant to launch quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    MacOs,
    /// Linux.
    Linux,
    /// Anything else.
    Other,
}

impl Platform {
    /// Platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }
}

/// Half-open `major.minor` range: `min <= v < max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    /// Inclusive lower bound.
    pub min: (u64, u64),
    /// Exclusive upper bound; `None` means unbounded.
    pub max: Option<(u64, u64)>,
}

impl VersionRange {
    /// Every version from `min` on.
    #[must_use]
    pub const fn from(min: (u64, u64)) -> Self {
        Self { min, max: None }
    }

    /// Versions in `min..max`.
    #[must_use]
    pub const fn between(min: (u64, u64), max: (u64, u64)) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Whether `version` lies in the range.
    #[must_use]
    pub fn contains(&self, version: (u64, u64)) -> bool {
        version >= self.min && self.max.map_or(true, |max| version < max)
    }
}

/// Produces the source of a bootstrap wrapper.
pub type BootstrapGenerator = fn() -> String;

/// Launch strategy for the debugger.
#[derive(Clone, Copy)]
pub enum BootstrapStrategy {
    /// `python -m pdb <script>`.
    Direct,
    /// `python <generated wrapper> <script>`.
    WrapperScript(BootstrapGenerator),
}

impl BootstrapStrategy {
    /// Short name for logs and status output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::WrapperScript(_) => "wrapper-script",
        }
    }
}

impl std::fmt::Debug for BootstrapStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRule {
    /// Platform the rule applies to.
    pub platform: Platform,
    /// Interpreter versions the rule applies to.
    pub versions: VersionRange,
    /// Strategy to use when the rule matches.
    pub strategy: BootstrapStrategy,
    /// Why the rule exists.
    pub reason: &'static str,
}

/// Known launch quirks, checked in order. The first match wins.
pub const CAPABILITY_TABLE: &[CapabilityRule] = &[CapabilityRule {
    platform: Platform::Windows,
    versions: VersionRange::from((3, 13)),
    strategy: BootstrapStrategy::WrapperScript(readline_shim_bootstrap),
    reason: "pdb touches readline.backend, which the Windows readline module lacks",
}];

/// Pick the launch strategy for `platform` and `version`.
#[must_use]
pub fn select_strategy(
    table: &[CapabilityRule],
    platform: Platform,
    version: Option<(u64, u64)>,
) -> BootstrapStrategy {
    let Some(version) = version else {
        return BootstrapStrategy::Direct;
    };
    table
        .iter()
        .find(|rule| rule.platform == platform && rule.versions.contains(version))
        .map_or(BootstrapStrategy::Direct, |rule| {
            info!(
                ?platform,
                major = version.0,
                minor = version.1,
                strategy = rule.strategy.name(),
                reason = rule.reason,
                "capability rule matched"
            );
            rule.strategy
        })
}

/// Wrapper that gives the `readline` module a `backend` attribute before
/// running `pdb` on the script named by its first argument.
#[must_use]
pub fn readline_shim_bootstrap() -> String {
    r#"import sys

try:
    import readline
    if not hasattr(readline, "backend"):
        readline.backend = "readline"
except ImportError:
    pass

import pdb

if __name__ == "__main__":
    target = sys.argv[1]
    sys.argv = [sys.argv[0], target]
    pdb.main()
"#
    .to_owned()
}

/// Interpreter arguments plus the bootstrap file that must outlive the
/// process.
#[derive(Debug)]
pub struct LaunchPlan {
    /// Arguments following the interpreter path.
    pub args: Vec<OsString>,
    /// Generated wrapper, if the strategy needs one.
    pub bootstrap: Option<EphemeralScript>,
}

/// Build the launch arguments for `script` under `strategy`.
///
/// # Errors
///
/// Returns `AppError::Io` when the bootstrap file cannot be written.
pub fn plan_launch(strategy: BootstrapStrategy, script: &Path) -> Result<LaunchPlan> {
    match strategy {
        BootstrapStrategy::Direct => Ok(LaunchPlan {
            args: vec!["-m".into(), "pdb".into(), script.as_os_str().to_owned()],
            bootstrap: None,
        }),
        BootstrapStrategy::WrapperScript(generate) => {
            let bootstrap = EphemeralScript::create(&generate(), BOOTSTRAP_SUFFIX)?;
            Ok(LaunchPlan {
                args: vec![
                    bootstrap.path().as_os_str().to_owned(),
                    script.as_os_str().to_owned(),
                ],
                bootstrap: Some(bootstrap),
            })
        }
    }
}
