//! fhir-repo
//!
//! Reads and searches FHIR resources stored in implementation guide style
//! directory trees, optionally federated with read-only fallback trees.

mod config;

use std::sync::Arc;

use clap::Parser;
use helios_repository::directory::DirectoryConventions;
use helios_repository::{
    DirectoryStore, DynRepository, Federator, Repository, RepositoryError, SearchQuery,
};
use tracing::{info, warn};

use crate::config::{CliConfig, Command};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_repository={},helios_repo_cli={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Builds the federation of the root store and its fallbacks.
fn build_repository(config: &CliConfig) -> Federator {
    let conventions = config.conventions();
    info!(root = %config.root.display(), conventions = %conventions, "Opening root store");
    let local: DynRepository = Arc::new(DirectoryStore::new(&config.root, conventions));

    let fallbacks = config.fallbacks.iter().map(|dir| {
        info!(fallback = %dir.display(), "Opening fallback store");
        Arc::new(DirectoryStore::auto_detect(dir).read_only()) as DynRepository
    });

    Federator::new(local).with_secondaries(fallbacks)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    match &config.command {
        Command::Detect => {
            let conventions = DirectoryConventions::auto_detect(&config.root);
            print_json(&serde_json::to_value(conventions)?)?;
        }
        Command::Read { resource_type, id } => {
            let repository = build_repository(&config);
            let resource = repository.read(resource_type, id).await?;
            print_json(resource.content())?;
        }
        Command::Search {
            resource_type,
            params,
        } => {
            let repository = build_repository(&config);
            let query = SearchQuery::from_pairs(params.iter().map(String::as_str));
            match repository.search(resource_type, &query).await {
                Ok(bundle) => print_json(&bundle.to_json())?,
                Err(RepositoryError::Degraded { partial, failures }) => {
                    print_json(&partial.to_json())?;
                    for failure in &failures {
                        warn!(store = %failure.store, index = failure.index, error = %failure.message, "Store failed during search");
                    }
                    anyhow::bail!("search results are incomplete: {} store(s) failed", failures.len());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
