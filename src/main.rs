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

//! aurtree command line: resolve pure-AUR dependency trees and query the
//! repository manifest.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use tracing::debug;

mod aur;
mod config;
mod deps;
mod error;
mod logging;
mod official;
#[cfg(test)]
mod testing;

use aur::client::AurRpc;
use aur::{AurClient, ResolveContext, Resolver};
use config::{Config, ResolverConfig};
use deps::manifest::Manifest;
use deps::tasks::collect_tasks;
use official::{OfficialClient, OfficialSearch};

#[derive(Parser, Debug)]
#[command(name = "aurtree")]
#[command(version)]
#[command(about = "Pure-AUR dependency trees for a personal Arch Linux repository.")]
struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the packages that must be built from the AUR for a package
    Resolve {
        /// Root AUR package
        package_name: String,
        /// Manifest to update; the tree is printed as YAML when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the direct dependencies recorded for a manifest entry
    Deps {
        manifest: PathBuf,
        package_name: String,
    },
    /// Print the build tasks of a manifest as a JSON list
    #[command(group(ArgGroup::new("lto_filter").required(true).args(["lto", "no_lto"])))]
    Tasks {
        manifest: PathBuf,
        /// Only entries built with LTO
        #[arg(long)]
        lto: bool,
        /// Only entries built without LTO
        #[arg(long)]
        no_lto: bool,
        /// Include nested dependency entries
        #[arg(long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();
    logging::init(&config.logging, cli.verbose);
    config.validate()?;

    match cli.command {
        Command::Resolve { package_name, file } => {
            resolve(&config, &package_name, file.as_deref()).await
        }
        Command::Deps {
            manifest,
            package_name,
        } => print_dependencies(&manifest, &package_name),
        Command::Tasks {
            manifest,
            lto,
            recursive,
            ..
        } => print_tasks(&manifest, lto, recursive),
    }
}

/// What `resolve` ended up doing for the root package
#[derive(Debug, PartialEq)]
enum Resolution {
    /// The official repositories already ship the package
    Official(String),
    /// The manifest lists the package already; nothing was written
    AlreadyListed,
    /// The tree was added to the manifest
    Added { packages: usize, roots: usize },
    /// No manifest given; the tree rendered as YAML
    Tree(String),
}

async fn resolve(config: &Config, package: &str, file: Option<&Path>) -> Result<()> {
    let aur = AurClient::from_config(config)?;
    let official = OfficialClient::from_config(config)?;

    match resolve_package(&aur, &official, &config.resolver, package, file).await? {
        Resolution::Official(official_pkg) => eprintln!(
            "{} '{}' is satisfied by official package '{}', nothing to build",
            style("::").green().bold(),
            package,
            style(official_pkg).green()
        ),
        Resolution::AlreadyListed => eprintln!(
            "{} '{}' is already listed in {}",
            style("warning:").yellow().bold(),
            package,
            file.map(|path| path.display().to_string()).unwrap_or_default()
        ),
        Resolution::Added { packages, roots } => eprintln!(
            "{} added '{}' ({} AUR package(s)) to {}, {} root(s) total",
            style("::").green().bold(),
            style(package).bold(),
            packages,
            file.map(|path| path.display().to_string()).unwrap_or_default(),
            roots
        ),
        Resolution::Tree(yaml) => {
            eprintln!("{}", style(":: dependency tree").cyan().bold());
            print!("{}", yaml);
        }
    }

    Ok(())
}

/// Check the root against the official repositories and the manifest, then
/// resolve it and either record the tree in `file` or render it.
async fn resolve_package(
    aur: &dyn AurRpc,
    official: &dyn OfficialSearch,
    config: &ResolverConfig,
    package: &str,
    file: Option<&Path>,
) -> Result<Resolution> {
    let resolver = Resolver::new(aur, official).with_config(config);
    let mut ctx = ResolveContext::new();

    eprintln!(
        "{}",
        style(format!(":: checking official repositories for '{}'...", package)).bold()
    );
    if let Some(official_pkg) = resolver.check_official(&mut ctx, package).await.package() {
        return Ok(Resolution::Official(official_pkg.to_string()));
    }

    let manifest = match file {
        Some(path) => {
            let manifest = Manifest::load(path)?;
            if manifest.contains(package) {
                return Ok(Resolution::AlreadyListed);
            }
            Some((path, manifest))
        }
        None => None,
    };

    eprintln!(
        "{}",
        style(format!(":: resolving AUR dependencies of '{}'...", package)).bold()
    );
    let tree = resolver.resolve_tree(&mut ctx, package).await?;
    debug!(
        "{} AUR package(s) visited, {} official lookup(s)",
        ctx.node_count(),
        ctx.official_cache().len()
    );

    match manifest {
        Some((path, mut manifest)) => {
            let packages = tree.node_count();
            manifest.add(tree.into());
            manifest.save(path)?;
            Ok(Resolution::Added {
                packages,
                roots: manifest.len(),
            })
        }
        None => {
            let yaml = serde_yaml::to_string(&tree).context("failed to render dependency tree")?;
            Ok(Resolution::Tree(yaml))
        }
    }
}

fn print_dependencies(path: &Path, package: &str) -> Result<()> {
    let manifest = Manifest::load_existing(path)?;
    if let Some(entry) = manifest.get(package) {
        let names = entry.dependency_names();
        if !names.is_empty() {
            println!("{}", names.join(" "));
        }
    }
    Ok(())
}

fn print_tasks(path: &Path, lto: bool, recursive: bool) -> Result<()> {
    let manifest = Manifest::load_existing(path)?;
    let tasks = collect_tasks(&manifest.packages, lto, recursive);
    println!(
        "{}",
        serde_json::to_string(&tasks).context("failed to encode build tasks")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AurtreeError;
    use crate::testing::FakeRegistry;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> FakeRegistry {
        FakeRegistry::new()
            .aur("myapp-git", &["libbar>=1.2", "quux-aur"])
            .aur("quux-aur", &[])
            .official("libbar", &[], &[])
    }

    async fn run(registry: &FakeRegistry, package: &str, file: Option<&Path>) -> Result<Resolution> {
        resolve_package(registry, registry, &ResolverConfig::default(), package, file).await
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_arguments() {
        let cli = Cli::try_parse_from(["aurtree", "resolve", "myapp-git", "-f", "repo.yaml", "-v"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Resolve { package_name, file } => {
                assert_eq!(package_name, "myapp-git");
                assert_eq!(file, Some(PathBuf::from("repo.yaml")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_tasks_requires_one_lto_flag() {
        assert!(Cli::try_parse_from(["aurtree", "tasks", "repo.yaml"]).is_err());
        assert!(
            Cli::try_parse_from(["aurtree", "tasks", "repo.yaml", "--lto", "--no-lto"]).is_err()
        );
        let cli = Cli::try_parse_from(["aurtree", "tasks", "repo.yaml", "--no-lto", "--recursive"])
            .unwrap();
        match cli.command {
            Command::Tasks {
                lto, recursive, ..
            } => {
                assert!(!lto);
                assert!(recursive);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_prints_tree_without_manifest() {
        let outcome = run(&registry(), "myapp-git", None).await.unwrap();
        assert_eq!(
            outcome,
            Resolution::Tree("name: myapp-git\ndependencies:\n- name: quux-aur\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_adds_tree_to_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.yaml");

        let outcome = run(&registry(), "myapp-git", Some(&path)).await.unwrap();
        assert_eq!(outcome, Resolution::Added { packages: 2, roots: 1 });
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "packages:\n- name: myapp-git\n  dependencies:\n  - name: quux-aur\n"
        );
    }

    #[tokio::test]
    async fn test_resolve_twice_leaves_manifest_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.yaml");
        run(&registry(), "myapp-git", Some(&path)).await.unwrap();
        let first = fs::read(&path).unwrap();

        let registry = registry();
        let outcome = run(&registry, "myapp-git", Some(&path)).await.unwrap();
        assert_eq!(outcome, Resolution::AlreadyListed);
        assert_eq!(fs::read(&path).unwrap(), first);
        assert!(registry.calls("info").is_empty());
    }

    #[tokio::test]
    async fn test_listed_root_keeps_hand_written_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.yaml");
        let content = "# personal repo\npackages:\n  - name: myapp-git\n    lto: false\n";
        fs::write(&path, content).unwrap();

        let outcome = run(&registry(), "myapp-git", Some(&path)).await.unwrap();
        assert_eq!(outcome, Resolution::AlreadyListed);
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[tokio::test]
    async fn test_officially_satisfied_root_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.yaml");
        let registry = registry().official("myapp", &[], &[]);

        let outcome = run(&registry, "myapp-git", Some(&path)).await.unwrap();
        assert_eq!(outcome, Resolution::Official("myapp".to_string()));
        assert!(!path.exists());
        assert!(registry.calls("info").is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_fails_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.yaml");

        let err = run(&registry(), "nope", Some(&path)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AurtreeError>(),
            Some(AurtreeError::RootPackageMissing { .. })
        ));
        assert!(!path.exists());
    }
}
