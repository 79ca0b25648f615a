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

//! AUR RPC API client with rate limiting.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::AurRpcResponse;
use crate::config::Config;
use crate::error::{AurtreeError, AurtreeResult};

/// AUR RPC accepts at most this many `arg[]` values per info request
const BATCH_SIZE: usize = 250;

/// AUR package information from RPC API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AurPackageInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,

    // Dependencies
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub make_depends: Vec<String>,
    #[serde(default)]
    pub check_depends: Vec<String>,
}

impl AurPackageInfo {
    /// Runtime, build and check dependencies as raw strings, deduplicated and sorted
    pub fn all_deps(&self) -> BTreeSet<String> {
        self.depends
            .iter()
            .chain(&self.make_depends)
            .chain(&self.check_depends)
            .cloned()
            .collect()
    }
}

/// Queries the resolver needs from the AUR
#[async_trait]
pub trait AurRpc: Send + Sync {
    /// Metadata for every name in one request
    async fn info(&self, names: &[String]) -> AurtreeResult<Vec<AurPackageInfo>>;

    /// Packages whose `provides` match `name`
    async fn search_provides(&self, name: &str) -> AurtreeResult<Vec<AurPackageInfo>>;

    /// Metadata keyed by the AUR's canonical package name.
    ///
    /// A failed request yields an empty map: every name of the batch is
    /// then "not found" for this attempt.
    async fn batch_info(&self, names: &[String]) -> HashMap<String, AurPackageInfo> {
        if names.is_empty() {
            return HashMap::new();
        }

        match self.info(names).await {
            Ok(results) => results
                .into_iter()
                .map(|pkg| (pkg.name.clone(), pkg))
                .collect(),
            Err(e) => {
                warn!("AUR info request for {} package(s) failed: {}", names.len(), e);
                HashMap::new()
            }
        }
    }

    /// Name of the first AUR package providing `name`
    async fn find_provider(&self, name: &str) -> Option<String> {
        match self.search_provides(name).await {
            Ok(results) => results.into_iter().next().map(|pkg| pkg.name),
            Err(e) => {
                warn!("AUR provider search for '{}' failed: {}", name, e);
                None
            }
        }
    }
}

/// AUR RPC client
pub struct AurClient {
    client: reqwest::Client,
    base_url: String,
    last_request: Mutex<Option<Instant>>,
    min_request_interval: Duration,
}

impl AurClient {
    /// Create a client from the `[aur]` and `[network]` settings
    pub fn from_config(config: &Config) -> AurtreeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.network.timeout())
            .connect_timeout(config.network.connect_timeout())
            .pool_max_idle_per_host(5)
            .user_agent(config.network.user_agent.as_str())
            .build()
            .map_err(|e| AurtreeError::network(&config.aur.rpc_url, e))?;

        Ok(Self {
            client,
            base_url: config.aur.rpc_url.clone(),
            last_request: Mutex::new(None),
            min_request_interval: Duration::from_millis(100),
        })
    }

    /// Rate limit requests to avoid hammering AUR
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                tokio::time::sleep(self.min_request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn info_url(&self, names: &[String]) -> String {
        let args: Vec<String> = names
            .iter()
            .map(|n| format!("arg[]={}", urlencoding::encode(n)))
            .collect();
        format!("{}?v=5&type=info&{}", self.base_url, args.join("&"))
    }

    fn search_url(&self, field: &str, query: &str) -> String {
        format!(
            "{}?v=5&type=search&by={}&arg={}",
            self.base_url,
            field,
            urlencoding::encode(query)
        )
    }

    async fn fetch(&self, url: &str) -> AurtreeResult<Vec<AurPackageInfo>> {
        self.rate_limit().await;
        debug!("GET {}", url);

        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AurtreeError::network(url, e))?
            .text()
            .await
            .map_err(|e| AurtreeError::network(url, e))?;

        parse_rpc_response(url, &body)
    }
}

#[async_trait]
impl AurRpc for AurClient {
    async fn info(&self, names: &[String]) -> AurtreeResult<Vec<AurPackageInfo>> {
        let mut all_results = Vec::new();
        for chunk in names.chunks(BATCH_SIZE) {
            let url = self.info_url(chunk);
            all_results.extend(self.fetch(&url).await?);
        }
        Ok(all_results)
    }

    async fn search_provides(&self, name: &str) -> AurtreeResult<Vec<AurPackageInfo>> {
        let url = self.search_url("provides", name);
        self.fetch(&url).await
    }
}

fn parse_rpc_response(url: &str, body: &str) -> AurtreeResult<Vec<AurPackageInfo>> {
    let response: AurRpcResponse =
        serde_json::from_str(body).map_err(|e| AurtreeError::decode(url, e))?;

    if let Some(message) = response.error {
        return Err(AurtreeError::Rpc { message });
    }
    if response.response_type == "error" {
        return Err(AurtreeError::Rpc {
            message: "unspecified error".to_string(),
        });
    }

    debug!("{} result(s) from {}", response.resultcount, url);
    Ok(response.results)
}
