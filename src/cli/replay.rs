// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Replays recorded letter events through an in-process stream
//!
//! Each input line is published unchanged, keyed by its session id. Lines are
//! paced by the gaps between their `timestamp` fields so pause detection sees
//! the same rhythm the signer produced.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Cli;
use crate::clock::SystemClock;
use crate::config::ServiceConfig;
use crate::lexicon::{HttpLexiconBackend, InMemoryLexicon, LexiconBackend};
use crate::pipeline::ResolverService;
use crate::session::MemorySessionStore;
use crate::stream::{EventTimestamp, MemoryStreamProvider};

/// Longest gap honoured between two replayed lines
const MAX_REPLAY_GAP_MS: i64 = 5_000;

#[derive(Debug, Deserialize)]
struct LineHeader {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<EventTimestamp>,
}

pub async fn run(cli: &Cli, config: ServiceConfig) -> Result<()> {
    let backend = lexicon_backend(cli, &config).await?;
    let provider = Arc::new(MemoryStreamProvider::new(
        config.stream.stream_id.clone(),
        cli.partitions.max(1),
    ));
    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemorySessionStore::partitioned(
        config.pipeline.session_shards,
        config.session.max_sessions_per_shard,
        config.session.ttl(),
        clock.clone(),
    ));
    info!(
        partitions = store.partition_count(),
        capacity = config.session_capacity(),
        "Session store ready"
    );
    let pause_ms = config.finalizer.pause_duration_ms;

    let shutdown = CancellationToken::new();
    let service = ResolverService::new(config, provider.clone(), store, backend, clock);
    let (running, mut words) = service.start(&shutdown).await?;

    if !running.wait_until_subscribed(Duration::from_secs(5)).await {
        warn!("Not every partition subscribed before replay started");
    }

    let printer = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(word) = words.recv().await {
            match serde_json::to_string(&word) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Failed to encode resolved word"),
            }
            count += 1;
        }
        count
    });

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if cli.input == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&cli.input)
            .await
            .with_context(|| format!("Failed to open {}", cli.input))?;
        Box::new(BufReader::new(file))
    };

    let published = tokio::select! {
        result = publish_lines(reader, &provider) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            0
        }
    };
    info!(published, "Replay input exhausted");

    // Let trailing words reach their pause deadline.
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(pause_ms + 250)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    let report = running.shutdown().await;
    let emitted = printer.await.unwrap_or(0);
    info!(
        published,
        emitted,
        dropped = report.dropped_events,
        "Replay finished"
    );
    Ok(())
}

async fn lexicon_backend(cli: &Cli, config: &ServiceConfig) -> Result<Arc<dyn LexiconBackend>> {
    if let Some(endpoint) = &config.resolver.endpoint {
        let backend = HttpLexiconBackend::new(endpoint.clone(), config.resolver.timeout_ms)
            .context("Failed to build lexicon client")?;
        return Ok(Arc::new(backend));
    }

    let lexicon = InMemoryLexicon::new(
        config.resolver.prefix_max_edits,
        config.resolver.fuzzy_max_edits,
    );
    match &cli.lexicon {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read lexicon {}", path.display()))?;
            let entries = InMemoryLexicon::parse_entries(&json)?;
            lexicon.extend(entries);
            info!(entries = lexicon.len(), "Lexicon loaded");
        }
        None => warn!("No lexicon configured, every word will be unresolved"),
    }
    Ok(Arc::new(lexicon))
}

async fn publish_lines(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    provider: &MemoryStreamProvider,
) -> Result<u64> {
    let mut lines = reader.lines();
    let mut previous_ts: Option<i64> = None;
    let mut published = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let header: LineHeader = match serde_json::from_str(line) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "Skipping unparseable input line");
                continue;
            }
        };

        let timestamp_ms = header.timestamp.as_ref().and_then(EventTimestamp::to_millis);
        if let (Some(prev), Some(ts)) = (previous_ts, timestamp_ms) {
            let gap = (ts - prev).clamp(0, MAX_REPLAY_GAP_MS);
            if gap > 0 {
                tokio::time::sleep(Duration::from_millis(gap as u64)).await;
            }
        }
        if timestamp_ms.is_some() {
            previous_ts = timestamp_ms;
        }

        let key = header.session_id.unwrap_or_default();
        provider.publish(&key, line.as_bytes().to_vec())?;
        published += 1;
    }
    Ok(published)
}
