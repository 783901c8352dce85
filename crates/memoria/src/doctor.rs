// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memoria doctor` command implementation.
//!
//! Probes the embedding service, then runs the cross-store reconciliation
//! pass: orphan chunks, dangling edges, and the failed-compensation queue.

use memoria_config::MemoriaConfig;
use memoria_core::MemoriaError;
use memoria_embedding::HttpEmbedder;
use memoria_engine::MemoryEngine;

/// Diagnose the deployment and repair drift.
pub async fn run_doctor(config: MemoriaConfig) -> Result<(), MemoriaError> {
    let probe = HttpEmbedder::new(&config.embedding)?;
    let info = probe.model_info();
    if probe.check_connection().await {
        eprintln!("embedding service: ok ({} at {})", info.model, info.host);
    } else {
        eprintln!(
            "embedding service: UNREACHABLE ({} at {}) - stores and recalls will fail",
            info.model, info.host
        );
    }

    let engine = MemoryEngine::open(config).await?;
    let report = engine.reconcile().await?;
    eprintln!(
        "reconciliation: removed {} orphan chunks, {} dangling edges, drained {} queued repairs",
        report.orphan_chunks_removed, report.dangling_edges_removed, report.queue_drained
    );

    if report.orphan_chunks_removed == 0
        && report.dangling_edges_removed == 0
        && report.queue_drained == 0
    {
        eprintln!("stores are consistent");
    }
    Ok(())
}
