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

//! Build manifest of the repository, persisted as YAML.
//!
//! The manifest lists one tree per package the repository builds. Entries
//! are hand-edited too, so keys this crate does not interpret (`lto`,
//! `base`, `exclude`, `env`, ...) are carried through load and save.

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::ErrorKind;
use std::mem;
use std::path::Path;

use super::DependencyNode;
use crate::error::{AurtreeError, AurtreeResult};

/// Manifest file structure.
///
/// Keys are written back in the order they were read. `fields` keeps that
/// order, with `packages` held as a placeholder that is filled from
/// [`Manifest::packages`] on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Root entries, sorted by name
    pub packages: Vec<ManifestEntry>,
    fields: Mapping,
}

/// One package of the manifest and the AUR packages it needs
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub name: String,
    pub dependencies: Vec<ManifestDependency>,
    /// Every key of the entry in file order; `name` and `dependencies` are placeholders
    fields: Mapping,
}

/// A dependency is either a nested entry or a bare package name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestDependency {
    Name(String),
    Node(ManifestEntry),
}

impl ManifestDependency {
    pub fn name(&self) -> &str {
        match self {
            ManifestDependency::Name(name) => name,
            ManifestDependency::Node(entry) => &entry.name,
        }
    }

    pub fn as_entry(&self) -> Option<&ManifestEntry> {
        match self {
            ManifestDependency::Name(_) => None,
            ManifestDependency::Node(entry) => Some(entry),
        }
    }
}

impl From<DependencyNode> for ManifestEntry {
    fn from(node: DependencyNode) -> Self {
        let dependencies: Vec<ManifestDependency> = node
            .dependencies
            .unwrap_or_default()
            .into_iter()
            .map(|child| ManifestDependency::Node(child.into()))
            .collect();

        let mut fields = Mapping::new();
        fields.insert(Value::from("name"), Value::Null);
        if !dependencies.is_empty() {
            fields.insert(Value::from("dependencies"), Value::Null);
        }

        Self {
            name: node.name,
            dependencies,
            fields,
        }
    }
}

impl ManifestEntry {
    /// Names of the direct dependencies, in manifest order
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.iter().map(ManifestDependency::name).collect()
    }

    /// Whether the package is built with LTO; `None` when the key is absent
    pub fn lto(&self) -> Option<bool> {
        self.fields.get("lto").and_then(Value::as_bool)
    }

    /// Package base override for split packages
    pub fn base(&self) -> Option<&str> {
        self.fields.get("base").and_then(Value::as_str)
    }

    /// Packages excluded from the build environment
    pub fn exclude(&self) -> Vec<String> {
        self.fields.get("exclude").map(scalar_list).unwrap_or_default()
    }

    /// Extra environment for the build, one `KEY=value` per element
    pub fn env(&self) -> Vec<String> {
        self.fields.get("env").map(scalar_list).unwrap_or_default()
    }

    fn write_dependencies<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        if self.dependencies.is_empty() {
            return Ok(());
        }
        map.serialize_entry("dependencies", &self.dependencies)
    }
}

impl Serialize for ManifestEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        // Without a slot of their own, dependencies follow the name.
        let has_slot = self.fields.contains_key("dependencies");

        if !self.fields.contains_key("name") {
            map.serialize_entry("name", &self.name)?;
            if !has_slot {
                self.write_dependencies(&mut map)?;
            }
        }

        for (key, value) in &self.fields {
            match key.as_str() {
                Some("name") => {
                    map.serialize_entry("name", &self.name)?;
                    if !has_slot {
                        self.write_dependencies(&mut map)?;
                    }
                }
                Some("dependencies") => self.write_dependencies(&mut map)?,
                _ => map.serialize_entry(key, value)?,
            }
        }

        map.end()
    }
}

impl<'de> Deserialize<'de> for ManifestEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Mapping::deserialize(deserializer)?;

        let name = match fields.get_mut("name").map(|slot| mem::replace(slot, Value::Null)) {
            Some(Value::String(name)) => name,
            Some(other) => scalar_string(&other)
                .ok_or_else(|| D::Error::custom("package name must be a scalar"))?,
            None => return Err(D::Error::custom("manifest entry without a name")),
        };
        let dependencies = take_list(&mut fields, "dependencies").map_err(D::Error::custom)?;

        Ok(Self {
            name,
            dependencies,
            fields,
        })
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            if key.as_str() == Some("packages") {
                map.serialize_entry("packages", &self.packages)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }
        if !self.fields.contains_key("packages") {
            map.serialize_entry("packages", &self.packages)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Mapping::deserialize(deserializer)?;
        let packages = take_list(&mut fields, "packages").map_err(D::Error::custom)?;
        Ok(Self { packages, fields })
    }
}

impl Manifest {
    /// Load from file; a missing or blank file is an empty manifest
    pub fn load(path: &Path) -> AurtreeResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(AurtreeError::manifest(path, "failed to read manifest", e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|source| AurtreeError::ManifestFormat {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load a manifest that has to exist already
    pub fn load_existing(path: &Path) -> AurtreeResult<Self> {
        if !path.is_file() {
            return Err(AurtreeError::Manifest {
                path: path.display().to_string(),
                message: "file not found".to_string(),
                source: None,
            });
        }
        Self::load(path)
    }

    /// Render the whole manifest
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Rewrite the file in full; the old content stays until the new one is complete
    pub fn save(&self, path: &Path) -> AurtreeResult<()> {
        let content = self.to_yaml().map_err(|source| AurtreeError::ManifestFormat {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AurtreeError::manifest(path, "failed to create directory", e))?;
        }

        let temp = path.with_extension("tmp");
        fs::write(&temp, content)
            .map_err(|e| AurtreeError::manifest(&temp, "failed to write manifest", e))?;
        fs::rename(&temp, path)
            .map_err(|e| AurtreeError::manifest(path, "failed to replace manifest", e))?;

        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.iter().any(|entry| entry.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.packages.iter().find(|entry| entry.name == name)
    }

    /// Add a root entry and keep the top level sorted by name.
    ///
    /// Returns `false` without touching anything when a root of the same
    /// name is already present; existing subtrees are never merged.
    pub fn add(&mut self, entry: ManifestEntry) -> bool {
        if self.contains(&entry.name) {
            return false;
        }
        self.packages.push(entry);
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));
        true
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }
}

/// Take the list stored under `key`, leaving a placeholder behind.
///
/// A single value where a list is expected, or nothing at all, is accepted.
fn take_list<T: DeserializeOwned>(fields: &mut Mapping, key: &str) -> Result<Vec<T>, serde_yaml::Error> {
    let Some(slot) = fields.get_mut(key) else {
        return Ok(Vec::new());
    };

    match mem::replace(slot, Value::Null) {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.into_iter().map(serde_yaml::from_value).collect(),
        other => Ok(vec![serde_yaml::from_value(other)?]),
    }
}

fn scalar_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
