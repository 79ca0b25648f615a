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

//! Dependency names and resolved dependency trees.
//!
//! Provides:
//! - Dependency string normalization
//! - AUR variant suffix handling
//! - The resolved tree node type
//! - Manifest persistence and build task extraction

pub mod manifest;
pub mod tasks;

use serde::{Deserialize, Serialize};

/// Suffixes AUR packagers append to mark a build variant of an upstream package
pub const VARIANT_SUFFIXES: &[&str] = &["-git", "-bin", "-svn", "-hg", "-bzr", "-testing", "-debug"];

/// Strip a version constraint from a dependency string.
///
/// `python>=3.10` becomes `python`, `libfoo = 1.2` becomes `libfoo`.
/// Returns an empty string only for empty or whitespace input.
pub fn normalize(raw: &str) -> String {
    let name = match raw.find(['<', '>', '=']) {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    name.trim().to_string()
}

/// The name without its trailing variant suffix, if it has one.
pub fn strip_variant_suffix(name: &str) -> Option<&str> {
    VARIANT_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
}

/// A package that has to be built from the AUR, with the AUR packages it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<DependencyNode>>,
}

impl DependencyNode {
    #[cfg(test)]
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: None,
        }
    }

    /// Direct children, empty when the node has no AUR dependencies
    pub fn children(&self) -> &[DependencyNode] {
        self.dependencies.as_deref().unwrap_or_default()
    }

    /// Depth-first search for a node by name anywhere in this tree
    #[cfg(test)]
    pub fn find(&self, name: &str) -> Option<&DependencyNode> {
        if self.name == name {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(name))
    }

    /// Total number of nodes, counting shared subtrees once per reference
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(DependencyNode::node_count).sum::<usize>()
    }
}
