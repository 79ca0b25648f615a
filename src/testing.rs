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

//! In-memory registries for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::aur::client::{AurPackageInfo, AurRpc};
use crate::deps::normalize;
use crate::error::{AurtreeError, AurtreeResult};
use crate::official::{OfficialPackage, OfficialSearch};

/// Serves both the AUR and the official search from fixed data and
/// records every query as `kind:argument`.
#[derive(Default)]
pub struct FakeRegistry {
    aur: BTreeMap<String, AurPackageInfo>,
    aur_provides: BTreeMap<String, Vec<String>>,
    official: Vec<OfficialPackage>,
    aur_down: bool,
    official_down: bool,
    log: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// AUR package whose `depends` are `deps`
    pub fn aur(self, name: &str, deps: &[&str]) -> Self {
        self.aur_package(AurPackageInfo {
            name: name.to_string(),
            version: "1.0-1".to_string(),
            depends: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        })
    }

    /// AUR package without dependencies that `provides` the given names
    pub fn aur_providing(mut self, name: &str, provides: &[&str]) -> Self {
        self.aur_provides.insert(
            name.to_string(),
            provides.iter().map(|p| p.to_string()).collect(),
        );
        self.aur(name, &[])
    }

    pub fn aur_package(mut self, info: AurPackageInfo) -> Self {
        self.aur.insert(info.name.clone(), info);
        self
    }

    pub fn official(mut self, name: &str, provides: &[&str], conflicts: &[&str]) -> Self {
        self.official.push(OfficialPackage {
            pkgname: name.to_string(),
            repo: "extra".to_string(),
            pkgver: "1.0-1".to_string(),
            provides: provides.iter().map(|p| p.to_string()).collect(),
            conflicts: conflicts.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn aur_down(mut self) -> Self {
        self.aur_down = true;
        self
    }

    pub fn official_down(mut self) -> Self {
        self.official_down = true;
        self
    }

    /// Arguments of every recorded query of one kind, in order
    pub fn calls(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{}:", kind);
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn record(&self, kind: &str, argument: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", kind, argument));
    }

    fn outage(url: &str) -> AurtreeError {
        AurtreeError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
            source: None,
        }
    }
}

#[async_trait]
impl AurRpc for FakeRegistry {
    async fn info(&self, names: &[String]) -> AurtreeResult<Vec<AurPackageInfo>> {
        self.record("info", &names.join(" "));
        if self.aur_down {
            return Err(Self::outage("aur"));
        }
        // The AUR matches names case-insensitively and answers with its own spelling.
        Ok(self
            .aur
            .values()
            .filter(|pkg| names.iter().any(|n| n.eq_ignore_ascii_case(&pkg.name)))
            .cloned()
            .collect())
    }

    async fn search_provides(&self, name: &str) -> AurtreeResult<Vec<AurPackageInfo>> {
        self.record("provides", name);
        if self.aur_down {
            return Err(Self::outage("aur"));
        }
        Ok(self
            .aur
            .values()
            .filter(|pkg| {
                self.aur_provides
                    .get(&pkg.name)
                    .is_some_and(|provides| provides.iter().any(|p| normalize(p) == name))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OfficialSearch for FakeRegistry {
    async fn search(&self, query: &str) -> AurtreeResult<Vec<OfficialPackage>> {
        self.record("official", query);
        if self.official_down {
            return Err(Self::outage("official"));
        }
        // Free-text search: substring hits on name, provides or conflicts.
        Ok(self
            .official
            .iter()
            .filter(|pkg| {
                pkg.pkgname.contains(query)
                    || pkg.provides.iter().any(|p| p.contains(query))
                    || pkg.conflicts.iter().any(|c| c.contains(query))
            })
            .cloned()
            .collect())
    }
}
