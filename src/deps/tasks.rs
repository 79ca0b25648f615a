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

//! Build task extraction from the manifest.

use serde::Serialize;

use super::manifest::ManifestEntry;

/// One package to build, flattened for a CI job matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTask {
    pub name: String,
    /// Space-separated direct dependency names
    pub dependencies: String,
    /// Space-separated excluded packages
    pub exclude: String,
    pub base: String,
    /// Newline-separated `KEY=value` assignments
    pub env: String,
}

impl From<&ManifestEntry> for BuildTask {
    fn from(entry: &ManifestEntry) -> Self {
        Self {
            name: entry.name.clone(),
            dependencies: entry.dependency_names().join(" "),
            exclude: entry.exclude().join(" "),
            base: entry.base().unwrap_or_default().to_string(),
            env: entry.env().join("\n"),
        }
    }
}

/// Collect the tasks whose LTO flag matches `lto`.
///
/// Entries without an `lto` key are built with LTO. With `recursive` the
/// nested dependency entries are visited depth-first after their parent.
pub fn collect_tasks(entries: &[ManifestEntry], lto: bool, recursive: bool) -> Vec<BuildTask> {
    let mut tasks = Vec::new();
    for entry in entries {
        visit(entry, lto, recursive, &mut tasks);
    }
    tasks
}

fn visit(entry: &ManifestEntry, lto: bool, recursive: bool, tasks: &mut Vec<BuildTask>) {
    if entry.lto().unwrap_or(true) == lto {
        tasks.push(entry.into());
    }

    if recursive {
        for child in entry.dependencies.iter().filter_map(|dep| dep.as_entry()) {
            visit(child, lto, recursive, tasks);
        }
    }
}
