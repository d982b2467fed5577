use regex::Regex;
use std::sync::OnceLock;

use crate::error::{DeployError, Result};

fn semver_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?\d+\.\d+\.\d+").expect("semver pattern is valid"))
}

/// Returns the first candidate that starts with a semver version.
///
/// Candidates are expected in priority order; anything after the
/// `MAJOR.MINOR.PATCH` prefix (pre-release, build metadata) is kept as is.
pub fn select_tag<S: AsRef<str>>(candidates: &[S]) -> Result<String> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|tag| semver_prefix().is_match(tag))
        .map(str::to_string)
        .ok_or_else(|| DeployError::NoValidTag {
            candidates: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
        })
}
