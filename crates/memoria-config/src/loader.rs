// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./memoria.toml` > `~/.config/memoria/memoria.toml`
//! > `/etc/memoria/memoria.toml` with environment variable overrides via the
//! `MEMORIA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MemoriaConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/memoria/memoria.toml` (system-wide)
/// 3. `~/.config/memoria/memoria.toml` (user XDG config)
/// 4. `./memoria.toml` (local directory)
/// 5. `MEMORIA_*` environment variables
pub fn load_config() -> Result<MemoriaConfig, figment::Error> {
    let config: MemoriaConfig = Figment::new()
        .merge(Serialized::defaults(MemoriaConfig::default()))
        .merge(Toml::file("/etc/memoria/memoria.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("memoria/memoria.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("memoria.toml"))
        .merge(env_provider())
        .extract()?;
    config.validate().map_err(figment::Error::from)?;
    Ok(config)
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<MemoriaConfig, figment::Error> {
    let config: MemoriaConfig = Figment::new()
        .merge(Serialized::defaults(MemoriaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()?;
    config.validate().map_err(figment::Error::from)?;
    Ok(config)
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MemoriaConfig, figment::Error> {
    let config: MemoriaConfig = Figment::new()
        .merge(Serialized::defaults(MemoriaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()?;
    config.validate().map_err(figment::Error::from)?;
    Ok(config)
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `MEMORIA_CHUNKING_TARGET_SIZE`
/// must map to `chunking.target_size`, not `chunking.target.size`.
fn env_provider() -> Env {
    Env::prefixed("MEMORIA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("embedding_", "embedding.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("chunking_", "chunking.", 1)
            .replacen("recall_", "recall.", 1)
            .replacen("consolidation_", "consolidation.", 1)
            .replacen("graph_", "graph.", 1);
        mapped.into()
    })
}
