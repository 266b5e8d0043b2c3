//! TOML fixture corpora shared by the markup integration tests.
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

pub const ROUND_TRIP_FORMAT_V1: &str = "markup-round-trip-v1";
pub const DIFF_FORMAT_V1: &str = "markup-diff-v1";

#[derive(Clone, Debug, Deserialize)]
struct Manifest<T> {
    format: String,
    cases: Vec<T>,
}

/// Parse-then-print case. Without `expected` the input must reproduce itself.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RoundTripCase {
    pub name: String,
    pub input: String,
    pub expected: Option<String>,
}

impl RoundTripCase {
    pub fn expected(&self) -> &str {
        self.expected.as_deref().unwrap_or(&self.input)
    }
}

/// Two documents and the expected edit script in `format_edit_script` lines.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DiffCase {
    pub name: String,
    pub left: String,
    pub right: String,
    /// Narrow both sides to the first descendant with this tag before comparing.
    pub select: Option<String>,
    #[serde(default)]
    pub expected: Vec<String>,
}

trait Named {
    fn name(&self) -> &str;
}

impl Named for RoundTripCase {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for DiffCase {
    fn name(&self) -> &str {
        &self.name
    }
}

fn load<T>(path: &Path, format: &str) -> Vec<T>
where
    T: Named + for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read fixture corpus {path:?}: {err}"));
    let manifest: Manifest<T> = toml::from_str(&content)
        .unwrap_or_else(|err| panic!("failed to parse fixture corpus {path:?}: {err}"));
    assert_eq!(
        manifest.format, format,
        "unsupported fixture format in {path:?}"
    );
    assert!(!manifest.cases.is_empty(), "fixture corpus {path:?} has no cases");
    let mut names = BTreeSet::new();
    for case in &manifest.cases {
        assert!(
            names.insert(case.name().to_string()),
            "duplicate fixture name in {path:?}: {}",
            case.name()
        );
    }
    manifest.cases
}

pub fn load_round_trip_cases(path: &Path) -> Vec<RoundTripCase> {
    load(path, ROUND_TRIP_FORMAT_V1)
}

pub fn load_diff_cases(path: &Path) -> Vec<DiffCase> {
    load(path, DIFF_FORMAT_V1)
}
