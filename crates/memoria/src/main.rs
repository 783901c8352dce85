// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memoria - a persistent semantic memory engine for conversational agents.
//!
//! This binary is an operator convenience over the engine crate: status,
//! backup, restore, maintenance, and drift repair. The agent-facing
//! protocol surface lives elsewhere.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memoria_config::{load_config, load_config_from_path, MemoriaConfig};
use memoria_core::types::MemoryCategory;
use memoria_core::MemoriaError;
use memoria_engine::MemoryEngine;

mod consolidate;
mod doctor;
mod status;
mod transfer;

/// Memoria - a persistent semantic memory engine for conversational agents.
#[derive(Parser, Debug)]
#[command(name = "memoria", version, about, long_about = None)]
struct Cli {
    /// Explicit config file; defaults to the XDG hierarchy plus
    /// MEMORIA_* environment overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show memory counts, graph size, and cache statistics.
    Status,
    /// Export memories, edges, and rejections to a JSON file.
    Export {
        /// Output file path.
        path: PathBuf,
        /// Include chunk vectors so import needs no re-embedding.
        #[arg(long)]
        include_vectors: bool,
    },
    /// Import a previously exported JSON file.
    Import {
        /// Input file path.
        path: PathBuf,
        /// Skip memories whose id already exists instead of overwriting.
        #[arg(long)]
        skip_existing: bool,
    },
    /// Merge near-duplicates, apply decay, and forget stale memories.
    Consolidate {
        /// Restrict to one category (episodic, semantic, procedural).
        #[arg(long)]
        category: Option<String>,
        /// Report what would change without committing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Probe the embedding service and repair cross-store drift.
    Doctor,
}

fn load(cli_config: &Option<PathBuf>) -> Result<MemoriaConfig, MemoriaError> {
    let result = match cli_config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    result.map_err(|e| MemoriaError::Config(e.to_string()))
}

async fn run(cli: Cli) -> Result<(), MemoriaError> {
    let config = load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.engine.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Status => {
            let engine = MemoryEngine::open(config).await?;
            status::run_status(&engine).await
        }
        Commands::Export {
            path,
            include_vectors,
        } => {
            let engine = MemoryEngine::open(config).await?;
            transfer::run_export(&engine, &path, include_vectors).await
        }
        Commands::Import {
            path,
            skip_existing,
        } => {
            let engine = MemoryEngine::open(config).await?;
            transfer::run_import(&engine, &path, skip_existing).await
        }
        Commands::Consolidate { category, dry_run } => {
            let categories = match category {
                Some(name) => vec![MemoryCategory::parse(&name)?],
                None => MemoryCategory::ALL.to_vec(),
            };
            let engine = MemoryEngine::open(config).await?;
            consolidate::run_consolidate(&engine, &categories, dry_run).await
        }
        Commands::Doctor => doctor::run_doctor(config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
