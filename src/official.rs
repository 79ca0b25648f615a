/*
 * aurtree - Pure-AUR dependency resolver for a personal Arch Linux repository.
 * Copyright (C) 2025  aurtree contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Official repository lookups.
//!
//! Decides whether a dependency is already met by a package from the
//! official repositories, either directly or through `provides`/`conflicts`.

use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::Config;
use crate::deps::{normalize, strip_variant_suffix};
use crate::error::{AurtreeError, AurtreeResult};

/// One row of the official package search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfficialPackage {
    pub pkgname: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub pkgver: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl OfficialPackage {
    /// Exact name, a `provides` entry or a `conflicts` entry equal to `name`.
    ///
    /// A package that conflicts with `name` replaces it under another name,
    /// so the need is covered either way.
    pub fn satisfies(&self, name: &str) -> bool {
        self.pkgname == name
            || self.provides.iter().any(|p| normalize(p) == name)
            || self.conflicts.iter().any(|c| normalize(c) == name)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<OfficialPackage>,
}

/// Outcome of asking the official repositories about a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficialMatch {
    /// Covered by the named official package
    Satisfied(String),
    /// Every query succeeded and none matched
    NotFound,
    /// No match, and at least one query never got an answer
    Unreachable,
}

impl OfficialMatch {
    pub fn package(&self) -> Option<&str> {
        match self {
            OfficialMatch::Satisfied(name) => Some(name),
            _ => None,
        }
    }
}

/// Free-text search over the official repositories
#[async_trait]
pub trait OfficialSearch: Send + Sync {
    async fn search(&self, query: &str) -> AurtreeResult<Vec<OfficialPackage>>;
}

/// HTTP client for the archlinux.org package search
pub struct OfficialClient {
    client: reqwest::Client,
    search_url: String,
}

impl OfficialClient {
    pub fn from_config(config: &Config) -> AurtreeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.network.timeout())
            .connect_timeout(config.network.connect_timeout())
            .user_agent(config.network.user_agent.as_str())
            .build()
            .map_err(|e| AurtreeError::network(&config.official.search_url, e))?;

        Ok(Self {
            client,
            search_url: config.official.search_url.clone(),
        })
    }

    fn query_url(&self, query: &str) -> String {
        format!("{}?q={}", self.search_url, urlencoding::encode(query))
    }
}

#[async_trait]
impl OfficialSearch for OfficialClient {
    async fn search(&self, query: &str) -> AurtreeResult<Vec<OfficialPackage>> {
        let url = self.query_url(query);
        debug!("GET {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AurtreeError::network(&url, e))?
            .text()
            .await
            .map_err(|e| AurtreeError::network(&url, e))?;

        parse_search_response(&url, &body)
    }
}

fn parse_search_response(url: &str, body: &str) -> AurtreeResult<Vec<OfficialPackage>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| AurtreeError::decode(url, e))?;
    Ok(response.results)
}

/// Per-run memo of official lookups, keyed by normalized name.
///
/// Entries are written once and never invalidated.
#[derive(Debug, Default)]
pub struct OfficialCache {
    entries: HashMap<String, OfficialMatch>,
}

impl OfficialCache {
    pub fn get(&self, name: &str) -> Option<&OfficialMatch> {
        self.entries.get(name)
    }

    fn insert(&mut self, name: &str, outcome: OfficialMatch) -> OfficialMatch {
        self.entries
            .entry(name.to_string())
            .or_insert(outcome)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Names to search for `name`, most specific first
fn candidate_names(name: &str) -> Vec<String> {
    let mut candidates = vec![name.to_string()];
    if let Some(base) = strip_variant_suffix(name) {
        candidates.push(base.to_string());
    }
    // Longer names are less likely to hit an unrelated partial match.
    candidates.sort_by_key(|candidate| Reverse(candidate.len()));
    candidates
}

/// Look for an official package covering `name`.
///
/// The first matching row of the first candidate that matches wins. Query
/// failures are logged and skipped, never propagated.
pub async fn find_official_alternative(
    search: &dyn OfficialSearch,
    cache: &mut OfficialCache,
    name: &str,
) -> OfficialMatch {
    if let Some(cached) = cache.get(name) {
        return cached.clone();
    }

    let mut failed = false;
    for candidate in candidate_names(name) {
        match search.search(&candidate).await {
            Ok(rows) => {
                if let Some(row) = rows.iter().find(|row| row.satisfies(&candidate)) {
                    debug!(
                        "'{}' matched official package {}/{} {}",
                        candidate, row.repo, row.pkgname, row.pkgver
                    );
                    return cache.insert(name, OfficialMatch::Satisfied(row.pkgname.clone()));
                }
            }
            Err(e) => {
                warn!("searching the official repositories for '{}' failed: {}", candidate, e);
                failed = true;
            }
        }
    }

    let outcome = if failed {
        OfficialMatch::Unreachable
    } else {
        OfficialMatch::NotFound
    };
    cache.insert(name, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRegistry;

    #[test]
    fn test_candidate_order() {
        assert_eq!(candidate_names("neovim-git"), vec!["neovim-git", "neovim"]);
        assert_eq!(candidate_names("ripgrep"), vec!["ripgrep"]);
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "version": 2, "limit": 250, "valid": true, "num_pages": 1, "page": 1,
            "results": [{
                "pkgname": "jre-openjdk", "pkgbase": "java-openjdk", "repo": "extra",
                "arch": "x86_64", "pkgver": "21.0.5.u11", "pkgrel": "1",
                "provides": ["java-runtime=21", "jre-openjdk-headless=21.0.5.u11-1"],
                "conflicts": ["jre-openjdk-headless"], "replaces": []
            }]
        }"#;
        let rows = parse_search_response("https://archlinux.org/packages/search/json/?q=jre", body).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].satisfies("jre-openjdk"));
        assert!(rows[0].satisfies("java-runtime"));
        assert!(rows[0].satisfies("jre-openjdk-headless"));
        assert!(!rows[0].satisfies("java"));

        assert!(parse_search_response("u", "<html>").is_err());
    }

    #[tokio::test]
    async fn test_exact_name_match() {
        let registry = FakeRegistry::new().official("ripgrep", &[], &[]);
        let mut cache = OfficialCache::default();

        let outcome = find_official_alternative(&registry, &mut cache, "ripgrep").await;
        assert_eq!(outcome, OfficialMatch::Satisfied("ripgrep".to_string()));
        assert_eq!(outcome.package(), Some("ripgrep"));
    }

    #[tokio::test]
    async fn test_provides_and_conflicts_match() {
        let registry = FakeRegistry::new()
            .official("libfoo-ng", &["libfoo=2.0"], &[])
            .official("yt-dlp", &[], &["youtube-dl>=2021"]);
        let mut cache = OfficialCache::default();

        let provided = find_official_alternative(&registry, &mut cache, "libfoo").await;
        assert_eq!(provided, OfficialMatch::Satisfied("libfoo-ng".to_string()));

        let replaced = find_official_alternative(&registry, &mut cache, "youtube-dl").await;
        assert_eq!(replaced, OfficialMatch::Satisfied("yt-dlp".to_string()));
    }

    #[tokio::test]
    async fn test_variant_suffix_falls_back_to_base() {
        let registry = FakeRegistry::new().official("neovim", &[], &[]);
        let mut cache = OfficialCache::default();

        let outcome = find_official_alternative(&registry, &mut cache, "neovim-git").await;
        assert_eq!(outcome, OfficialMatch::Satisfied("neovim".to_string()));
        assert_eq!(registry.calls("official"), vec!["neovim-git", "neovim"]);
    }

    #[tokio::test]
    async fn test_results_are_cached_once() {
        let registry = FakeRegistry::new().official("ripgrep", &[], &[]);
        let mut cache = OfficialCache::default();

        for _ in 0..3 {
            find_official_alternative(&registry, &mut cache, "ripgrep").await;
            let missing = find_official_alternative(&registry, &mut cache, "nonexistent").await;
            assert_eq!(missing, OfficialMatch::NotFound);
        }

        assert_eq!(registry.calls("official"), vec!["ripgrep", "nonexistent"]);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_outage_is_reported_as_unreachable() {
        let registry = FakeRegistry::new().official("ripgrep", &[], &[]).official_down();
        let mut cache = OfficialCache::default();

        let outcome = find_official_alternative(&registry, &mut cache, "ripgrep-git").await;
        assert_eq!(outcome, OfficialMatch::Unreachable);
        assert_eq!(outcome.package(), None);
        // Both candidates were still tried.
        assert_eq!(registry.calls("official"), vec!["ripgrep-git", "ripgrep"]);
    }
}
