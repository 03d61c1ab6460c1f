//! Interpreter discovery.
//!
//! Enumerates candidate executables, probes each with bounded one-shot
//! queries, deduplicates by canonical executable path, and returns a list
//! ranked newest-first. A failing candidate is skipped; it never aborts the
//! scan.
//!
//! Probing happens in three passes so that dedup stays deterministic while
//! the slow parts run concurrently:
//!
//! 1. `--version` + self-location for every candidate (concurrent, ordered).
//! 2. Dedup by canonical path in candidate order (sequential).
//! 3. Metadata query for each surviving interpreter (concurrent, ordered).

pub mod candidates;
pub mod probe;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, info_span, Instrument};

use crate::config::DiscoveryConfig;
use crate::models::interpreter::UNKNOWN;
use crate::models::InterpreterDescriptor;

pub use candidates::{build_candidates, Candidate};
pub use probe::probe_version;

/// A candidate that answered the version query and located itself.
#[derive(Debug, Clone)]
struct Located {
    candidate: Candidate,
    banner: String,
    path: PathBuf,
}

/// Scan the system for interpreters.
pub async fn discover(config: &DiscoveryConfig) -> Vec<InterpreterDescriptor> {
    let span = info_span!("discover");
    async move {
        let list = build_candidates(&config.extra_candidates);
        info!(candidates = list.len(), "probing interpreter candidates");
        let found = probe_all(list, config.probe_timeout(), config.max_concurrent_probes).await;
        info!(interpreters = found.len(), "interpreter discovery complete");
        found
    }
    .instrument(span)
    .await
}

/// Probe an explicit candidate list; the core of [`discover`].
pub async fn probe_all(
    list: Vec<Candidate>,
    timeout: Duration,
    concurrency: usize,
) -> Vec<InterpreterDescriptor> {
    let concurrency = concurrency.max(1);

    let located: Vec<Located> = stream::iter(list)
        .map(|candidate| locate(candidate, timeout))
        .buffered(concurrency)
        .filter_map(|hit| async move { hit })
        .collect()
        .await;

    let mut seen = HashSet::new();
    let unique: Vec<Located> = located
        .into_iter()
        .filter(|hit| {
            let fresh = seen.insert(hit.path.clone());
            if !fresh {
                debug!(
                    candidate = hit.candidate.label(),
                    path = %hit.path.display(),
                    "duplicate interpreter skipped"
                );
            }
            fresh
        })
        .collect();

    let mut found: Vec<InterpreterDescriptor> = stream::iter(unique)
        .map(|hit| describe(hit, timeout))
        .buffered(concurrency)
        .collect()
        .await;

    found.sort_by(InterpreterDescriptor::rank_cmp);
    found
}

/// Probe a single candidate end to end.
///
/// Returns `None` if it fails to execute, times out, or is not a Python
/// interpreter.
pub async fn probe(candidate: Candidate, timeout: Duration) -> Option<InterpreterDescriptor> {
    let hit = locate(candidate, timeout).await?;
    Some(describe(hit, timeout).await)
}

/// Probe an interpreter given by path.
pub async fn probe_path(path: &Path, timeout: Duration) -> Option<InterpreterDescriptor> {
    probe(
        Candidate::program(path.to_string_lossy().into_owned()),
        timeout,
    )
    .await
}

async fn locate(candidate: Candidate, timeout: Duration) -> Option<Located> {
    let banner = probe::run_query(
        &candidate.program,
        &candidate.prefix_args,
        probe::VERSION_ARGS,
        timeout,
    )
    .await?;

    if !banner.contains(probe::BANNER_MARKER) {
        debug!(candidate = candidate.label(), banner, "not a python interpreter");
        return None;
    }

    let path = probe::self_location(&candidate.program, &candidate.prefix_args, timeout)
        .await
        .unwrap_or_else(|| PathBuf::from(&candidate.program));

    Some(Located {
        candidate,
        banner: banner.lines().next().unwrap_or_default().trim().to_owned(),
        path,
    })
}

async fn describe(hit: Located, timeout: Duration) -> InterpreterDescriptor {
    let info = probe::run_query(
        &hit.candidate.program,
        &hit.candidate.prefix_args,
        probe::INFO_ARGS,
        timeout,
    )
    .await
    .unwrap_or_default();

    let mut lines = info.lines().map(str::trim);
    let version_text = lines.next().filter(|l| !l.is_empty());
    let architecture = lines.next().filter(|l| !l.is_empty()).unwrap_or(UNKNOWN);
    let prefix = lines.next().filter(|l| !l.is_empty()).unwrap_or(UNKNOWN);

    let version = version_text
        .and_then(probe::parse_version)
        .or_else(|| probe::parse_banner(&hit.banner));

    InterpreterDescriptor {
        name: hit.candidate.label(),
        path: hit.path,
        banner: hit.banner,
        version,
        architecture: architecture.to_owned(),
        prefix: prefix.to_owned(),
    }
}
