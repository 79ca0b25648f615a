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

//! Pure-AUR dependency tree resolution.
//!
//! Starting from a root AUR package, only dependencies that no official
//! package covers are followed. Every package is fetched and expanded at
//! most once per run: nodes live in an arena inside [`ResolveContext`] and
//! are registered before their children are looked at, so diamonds share
//! one node and cycles end at the first back-reference.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::client::{AurPackageInfo, AurRpc};
use crate::config::ResolverConfig;
use crate::deps::{normalize, DependencyNode};
use crate::error::{AurtreeError, AurtreeResult};
use crate::official::{find_official_alternative, OfficialCache, OfficialMatch, OfficialSearch};

/// Handle to a node of a [`ResolveContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct TreeSlot {
    name: String,
    children: Vec<NodeId>,
    in_flight: bool,
}

/// Everything learned during one resolution run.
///
/// Use a fresh context per run; nothing in it is ever invalidated.
#[derive(Debug, Default)]
pub struct ResolveContext {
    official: OfficialCache,
    records: HashMap<String, AurPackageInfo>,
    slots: Vec<TreeSlot>,
    index: HashMap<String, NodeId>,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node already created for an AUR package
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.slots[id.0].name
    }

    /// Number of distinct AUR packages visited
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub fn official_cache(&self) -> &OfficialCache {
        &self.official
    }

    /// Owned tree rooted at `id`; a node shared by several parents is copied under each.
    pub fn tree(&self, id: NodeId) -> DependencyNode {
        let slot = &self.slots[id.0];
        let children: Vec<DependencyNode> =
            slot.children.iter().map(|child| self.tree(*child)).collect();

        DependencyNode {
            name: slot.name.clone(),
            dependencies: (!children.is_empty()).then_some(children),
        }
    }

    fn open(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(TreeSlot {
            name: name.to_string(),
            children: Vec::new(),
            in_flight: true,
        });
        self.index.insert(name.to_string(), id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.slots[parent.0].children.push(child);
    }

    fn finish(&mut self, id: NodeId) {
        self.slots[id.0].in_flight = false;
    }

    fn is_in_flight(&self, id: NodeId) -> bool {
        self.slots[id.0].in_flight
    }
}

/// A node whose children are still being resolved
struct Frame {
    node: NodeId,
    pending: VecDeque<String>,
}

impl Frame {
    fn leaf(node: NodeId) -> Self {
        Self {
            node,
            pending: VecDeque::new(),
        }
    }
}

/// Builds pure-AUR dependency trees from the two registries
pub struct Resolver<'a> {
    aur: &'a dyn AurRpc,
    official: &'a dyn OfficialSearch,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(aur: &'a dyn AurRpc, official: &'a dyn OfficialSearch) -> Self {
        Self {
            aur,
            official,
            max_depth: ResolverConfig::default().max_depth,
        }
    }

    pub fn with_config(mut self, config: &ResolverConfig) -> Self {
        self.max_depth = config.max_depth;
        self
    }

    /// Ask the official repositories about a normalized name, through the run's cache
    pub async fn check_official(&self, ctx: &mut ResolveContext, name: &str) -> OfficialMatch {
        find_official_alternative(self.official, &mut ctx.official, name).await
    }

    /// Resolve `package` and return its tree, or fail if the root itself is not in the AUR
    pub async fn resolve_tree(
        &self,
        ctx: &mut ResolveContext,
        package: &str,
    ) -> AurtreeResult<DependencyNode> {
        let id = self
            .resolve(ctx, package)
            .await
            .ok_or_else(|| AurtreeError::RootPackageMissing {
                package: package.to_string(),
            })?;
        Ok(ctx.tree(id))
    }

    /// Resolve `package` and everything below it.
    ///
    /// `None` means the package itself could not be fetched from the AUR.
    /// Dependencies that cannot be resolved are logged and left out.
    pub async fn resolve(&self, ctx: &mut ResolveContext, package: &str) -> Option<NodeId> {
        if let Some(id) = ctx.lookup(package) {
            return Some(id);
        }

        let root = self.expand(ctx, package).await?;
        let root_id = root.node;
        let mut stack = vec![root];

        while let Some(frame) = stack.last_mut() {
            let parent = frame.node;
            let Some(child) = frame.pending.pop_front() else {
                stack.pop();
                ctx.finish(parent);
                continue;
            };

            if let Some(id) = ctx.lookup(&child) {
                if ctx.is_in_flight(id) {
                    debug!(
                        "'{}' -> '{}' closes a dependency cycle, not following it",
                        ctx.name(parent),
                        child
                    );
                } else {
                    ctx.attach(parent, id);
                }
                continue;
            }

            if stack.len() > self.max_depth {
                warn!(
                    "{}",
                    AurtreeError::DepthExceeded {
                        package: child,
                        depth: self.max_depth,
                    }
                );
                continue;
            }

            if let Some(next) = self.expand(ctx, &child).await {
                ctx.attach(parent, next.node);
                stack.push(next);
            }
        }

        Some(root_id)
    }

    /// Register `package` and work out which AUR packages it needs
    async fn expand(&self, ctx: &mut ResolveContext, package: &str) -> Option<Frame> {
        self.fetch_records(ctx, vec![package.to_string()]).await;
        let Some(info) = ctx.records.get(package).cloned() else {
            warn!(
                "{} (removed or renamed?)",
                AurtreeError::NotFoundInRegistry {
                    package: package.to_string(),
                    registry: "the AUR".to_string(),
                }
            );
            return None;
        };

        info!("analysing AUR package '{}' {}", package, info.version);
        let node = ctx.open(package);

        let raw_deps = info.all_deps();
        if raw_deps.is_empty() {
            debug!("'{}' has no dependencies", package);
            return Some(Frame::leaf(node));
        }

        let candidates: BTreeSet<String> = raw_deps
            .iter()
            .map(|dep| normalize(dep))
            .filter(|name| !name.is_empty())
            .collect();

        let mut aur_candidates = BTreeSet::new();
        for dep in candidates {
            match self.check_official(ctx, &dep).await {
                OfficialMatch::Satisfied(official) => {
                    debug!("'{}' is satisfied by official package '{}'", dep, official);
                }
                OfficialMatch::NotFound => {
                    aur_candidates.insert(dep);
                }
                OfficialMatch::Unreachable => {
                    warn!("could not check '{}' against the official repositories, looking in the AUR", dep);
                    aur_candidates.insert(dep);
                }
            }
        }

        if aur_candidates.is_empty() {
            return Some(Frame::leaf(node));
        }

        self.fetch_records(ctx, aur_candidates.iter().cloned().collect())
            .await;

        // Sorted raw strings keep the child order independent of response order.
        let mut pending = VecDeque::new();
        let mut seen = HashSet::new();
        for dep in &raw_deps {
            let name = normalize(dep);
            if !aur_candidates.contains(&name) || !seen.insert(name.clone()) {
                continue;
            }

            match self.aur_package_for(ctx, &name).await {
                Some(actual) => {
                    if actual == name {
                        info!("found pure AUR dependency '{}'", name);
                    } else {
                        info!("found pure AUR dependency '{}' (provided by '{}')", name, actual);
                    }
                    if !pending.contains(&actual) {
                        pending.push_back(actual);
                    }
                }
                None => warn!(
                    "{}",
                    AurtreeError::UnresolvableDependency {
                        dependency: name,
                        parent: package.to_string(),
                    }
                ),
            }
        }

        Some(Frame { node, pending })
    }

    /// The AUR package to build for a dependency: an exact name match first, then a provider
    async fn aur_package_for(&self, ctx: &mut ResolveContext, name: &str) -> Option<String> {
        if ctx.records.contains_key(name) {
            return Some(name.to_string());
        }

        let provider = self.aur.find_provider(name).await?;

        // The provider may have an official equivalent under its own name.
        match self.check_official(ctx, &provider).await {
            OfficialMatch::Satisfied(official) => {
                debug!(
                    "AUR provider '{}' of '{}' is covered by official package '{}'",
                    provider, name, official
                );
                None
            }
            _ => Some(provider),
        }
    }

    /// Fetch metadata for the names not seen yet, in one request
    async fn fetch_records(&self, ctx: &mut ResolveContext, names: Vec<String>) {
        let missing: Vec<String> = names
            .into_iter()
            .filter(|name| !ctx.records.contains_key(name))
            .collect();

        if missing.is_empty() {
            return;
        }

        let found = self.aur.batch_info(&missing).await;
        ctx.records.extend(found);
    }
}
