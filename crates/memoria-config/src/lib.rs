// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Memoria memory engine.
//!
//! TOML files merged over compiled defaults with `MEMORIA_*` environment
//! overrides, rejecting unknown keys at load time.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::MemoriaConfig;
