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

//! Error types shared by the registry clients, the resolver and the manifest store.

use std::path::Path;
use thiserror::Error;

/// Main error type for aurtree operations
#[derive(Debug, Error)]
pub enum AurtreeError {
    /// Transport failures and non-success HTTP statuses
    #[error("Network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A registry answered with a body we could not decode
    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The AUR RPC reported an error of its own
    #[error("AUR RPC error: {message}")]
    Rpc { message: String },

    /// Name absent from a registry's results
    #[error("'{package}' not found in {registry}")]
    NotFoundInRegistry { package: String, registry: String },

    /// Neither the official repositories nor the AUR satisfy a dependency
    #[error("Dependency '{dependency}' of '{parent}' is in neither the official repositories nor the AUR")]
    UnresolvableDependency { dependency: String, parent: String },

    /// The root package could not be fetched from the AUR
    #[error("Could not build a dependency tree for '{package}': not found in AUR")]
    RootPackageMissing { package: String },

    /// Dependency chain deeper than the configured bound
    #[error("Dependency chain too deep at '{package}' (limit {depth})")]
    DepthExceeded { package: String, depth: usize },

    /// Manifest file I/O errors
    #[error("Manifest error for '{path}': {message}")]
    Manifest {
        path: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Manifest file is not valid YAML, has the wrong shape, or cannot be rendered
    #[error("Invalid manifest '{path}'")]
    ManifestFormat {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl AurtreeError {
    /// Create a network error from a reqwest failure
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        AurtreeError::Network {
            url: url.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a decode error
    pub fn decode(url: impl Into<String>, message: impl ToString) -> Self {
        AurtreeError::Decode {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a manifest I/O error
    pub fn manifest(path: &Path, message: impl Into<String>, source: std::io::Error) -> Self {
        AurtreeError::Manifest {
            path: path.display().to_string(),
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type alias for aurtree operations
pub type AurtreeResult<T> = std::result::Result<T, AurtreeError>;
