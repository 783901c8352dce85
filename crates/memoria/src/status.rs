// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `memoria status` command implementation.

use memoria_core::MemoriaError;
use memoria_engine::MemoryEngine;

/// Print memory, graph, and cache statistics.
pub async fn run_status(engine: &MemoryEngine) -> Result<(), MemoriaError> {
    let stats = engine.stats().await?;

    println!("model: {} ({} dims)", stats.model, stats.dimension);
    println!(
        "memories: {} ({} points)",
        stats.total_memories, stats.total_points
    );
    for (category, collection) in &stats.collections {
        println!(
            "  {:<11} {} memories, {} points",
            category.as_str(),
            collection.memories,
            collection.points
        );
    }

    match (stats.edges, stats.rejections) {
        (Some(edges), Some(rejections)) => {
            println!("graph: {edges} edges, {rejections} rejected suggestions");
        }
        _ => println!("graph: disabled"),
    }

    match &stats.cache {
        Some(cache) => {
            let kib = cache.vector_bytes as f64 / 1024.0;
            println!("cache: {} entries ({kib:.1} KiB of vectors)", cache.entries);
        }
        None => println!("cache: disabled"),
    }

    Ok(())
}
