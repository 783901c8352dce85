// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memoria consolidate` command implementation.
//!
//! Runs the three maintenance passes per category: merge near-duplicates,
//! decay importance, forget stale memories.

use memoria_core::types::MemoryCategory;
use memoria_core::MemoriaError;
use memoria_engine::{ConsolidateOptions, DecayOptions, ForgetOptions, MemoryEngine};

/// Run maintenance over the given categories.
pub async fn run_consolidate(
    engine: &MemoryEngine,
    categories: &[MemoryCategory],
    dry_run: bool,
) -> Result<(), MemoriaError> {
    for &category in categories {
        let merged = engine
            .consolidate(
                category,
                ConsolidateOptions {
                    dry_run,
                    ..ConsolidateOptions::default()
                },
            )
            .await?;
        let decayed = engine
            .decay(
                category,
                DecayOptions {
                    dry_run,
                    ..DecayOptions::default()
                },
            )
            .await?;
        let forgotten = engine
            .forget(
                category,
                ForgetOptions {
                    dry_run,
                    ..ForgetOptions::default()
                },
            )
            .await?;

        let marker = if dry_run { " (preview)" } else { "" };
        eprintln!(
            "{}{marker}: merged {}, decayed {}, forgot {} (of {})",
            category.as_str(),
            merged.merged_count,
            decayed.updated_count,
            forgotten.forgotten_count,
            merged.total_processed
        );
    }
    Ok(())
}
