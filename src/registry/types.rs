//! Registry document types and version selection.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The registry document for one package (the "packument").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionInfo>,
}

/// Metadata of a single published version.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VersionInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dist: Dist,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Dist {
    #[serde(default)]
    pub tarball: String,
    /// Subresource integrity string, e.g. `sha512-<base64>`
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default)]
    pub shasum: Option<String>,
}

impl PackageInfo {
    /// Fill in `name`/`version` fields that some registries leave out.
    pub fn normalized(mut self) -> Self {
        for (key, info) in self.versions.iter_mut() {
            if info.version.is_empty() {
                info.version = key.clone();
            }
            if info.name.is_empty() {
                info.name = self.name.clone();
            }
        }
        self
    }

    /// All published version strings, in registry order.
    pub fn version_list(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    /// Highest published version.
    ///
    /// Stable releases win over prereleases; `dist-tags.latest` is only used
    /// when no version string parses as semver.
    pub fn latest_version(&self) -> Option<String> {
        let parsed: Vec<Version> = self
            .versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect();

        let stable = parsed.iter().filter(|v| v.pre.is_empty()).max();
        if let Some(v) = stable.or_else(|| parsed.iter().max()) {
            return Some(v.to_string());
        }

        self.dist_tags.get("latest").cloned()
    }

    /// Pick the version satisfying an npm-style range.
    ///
    /// Accepts `latest`, `*`, empty, dist-tag names, exact versions, caret and
    /// tilde ranges, space separated comparators, hyphen ranges and `||`.
    pub fn resolve(&self, range: &str) -> Option<&VersionInfo> {
        let range = range.trim();

        if range.is_empty() || range == "*" || range == "latest" {
            return self.latest_version().and_then(|v| self.versions.get(&v));
        }
        if let Some(tagged) = self.dist_tags.get(range) {
            return self.versions.get(tagged);
        }
        if let Some(exact) = self.versions.get(range.strip_prefix('v').unwrap_or(range)) {
            return Some(exact);
        }

        let reqs: Vec<VersionReq> = range
            .split("||")
            .filter_map(|alt| VersionReq::parse(&npm_range_to_req(alt)).ok())
            .collect();
        if reqs.is_empty() {
            return None;
        }

        self.versions
            .iter()
            .filter_map(|(key, info)| Version::parse(key).ok().map(|v| (v, info)))
            .filter(|(v, _)| reqs.iter().any(|r| r.matches(v)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, info)| info)
    }
}

/// Rewrite one npm range alternative into `semver::VersionReq` syntax.
fn npm_range_to_req(alt: &str) -> String {
    let alt = alt.trim();
    if alt.is_empty() || alt == "*" || alt == "x" {
        return "*".to_string();
    }

    // "1.2.3 - 2.3.4"
    if let Some((lo, hi)) = alt.split_once(" - ") {
        return format!(">={}, <={}", lo.trim(), hi.trim());
    }

    // ">= 1.0.0 < 2" -> [">=1.0.0", "<2"]
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alt.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        if pending_op.is_empty() {
            comparators.push(bare_version_req(token));
        } else {
            comparators.push(format!("{}{}", pending_op, token));
            pending_op.clear();
        }
    }

    comparators.join(", ")
}

/// An operator-less npm version: `1.2.3` is exact, `1.2` means `1.2.x`.
///
/// `semver` would read both as caret requirements.
fn bare_version_req(token: &str) -> String {
    let version = token.strip_prefix(['v', '=']).unwrap_or(token);
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let numeric = core
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !numeric {
        // Wildcards such as `1.x` and anything already carrying an operator
        return token.to_string();
    }
    match core.split('.').count() {
        3 => format!("={}", version),
        _ => format!("{}.*", core),
    }
}
