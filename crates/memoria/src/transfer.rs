// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memoria export` and `memoria import` command implementations.

use std::path::Path;

use memoria_core::MemoriaError;
use memoria_engine::MemoryEngine;

/// Export the whole engine state to a JSON file.
pub async fn run_export(
    engine: &MemoryEngine,
    path: &Path,
    include_vectors: bool,
) -> Result<(), MemoriaError> {
    let document = engine.export_to_path(path, include_vectors).await?;
    eprintln!(
        "Exported {} memories, {} edges, {} rejections to {}",
        document.memories.len(),
        document.edges.len(),
        document.rejections.len(),
        path.display()
    );
    Ok(())
}

/// Import a previously exported JSON file.
pub async fn run_import(
    engine: &MemoryEngine,
    path: &Path,
    skip_existing: bool,
) -> Result<(), MemoriaError> {
    let report = engine.import_from_path(path, skip_existing).await?;
    eprintln!(
        "Imported {} memories ({} skipped, {} errors), {} edges ({} skipped), {} rejections",
        report.memories_created,
        report.memories_skipped,
        report.memory_errors,
        report.edges_created,
        report.edges_skipped,
        report.rejections_restored
    );
    if report.memory_errors > 0 || report.edge_errors > 0 {
        eprintln!("some records failed to import; see the log for details");
    }
    Ok(())
}
