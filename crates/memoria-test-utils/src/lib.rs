// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Memoria workspace: a deterministic mock
//! embedding provider and an all-in-memory engine harness.

pub mod harness;
pub mod mock_embedder;

pub use harness::{TestEngine, TestEngineBuilder};
pub use mock_embedder::MockEmbedder;
