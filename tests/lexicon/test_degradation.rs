// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Backend trouble degrades to an unresolved raw word

use super::common::{hit, FixedBackend};
use glossa_resolver::lexicon::{LexiconResolver, ResolverConfig, ResolverError, SearchMode};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config(timeout_ms: u64) -> ResolverConfig {
    ResolverConfig {
        timeout_ms,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_slow_backend_times_out_to_raw_word() {
    let backend = FixedBackend::new(vec![hit("HELLO", 1.0, &[])]).slow(Duration::from_secs(2));
    let resolver = LexiconResolver::new(Arc::new(backend), config(50));

    let start = Instant::now();
    let resolution = resolver.resolve("HELO", "user-1").await;

    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(resolution.unresolved);
    assert!(resolution.candidates.is_empty());
    assert_eq!(resolution.raw_word, "HELO");
    assert_eq!(resolution.search_mode, Some(SearchMode::Fuzzy));
}

#[tokio::test]
async fn test_backend_error_returns_raw_word() {
    let backend = FixedBackend::new(vec![]).failing(ResolverError::Unavailable {
        message: "connection refused".to_string(),
    });
    let resolver = LexiconResolver::new(Arc::new(backend), config(2_000));

    let resolution = resolver.resolve("AWS", "user-1").await;
    assert!(resolution.unresolved);
    assert_eq!(resolution.raw_word, "AWS");
    assert_eq!(resolution.search_mode, Some(SearchMode::Prefix));
}

#[tokio::test]
async fn test_no_hits_is_unresolved() {
    let resolver = LexiconResolver::new(Arc::new(FixedBackend::new(vec![])), config(2_000));
    let resolution = resolver.resolve("ZZZZ", "user-1").await;
    assert!(resolution.unresolved);
    assert_eq!(resolution.search_mode, Some(SearchMode::Fuzzy));
}

#[tokio::test]
async fn test_blank_word_skips_backend() {
    let backend = Arc::new(FixedBackend::new(vec![hit("A", 1.0, &[])]));
    let resolver = LexiconResolver::new(backend.clone(), config(2_000));

    let resolution = resolver.resolve(" - ", "user-1").await;
    assert!(resolution.unresolved);
    assert_eq!(resolution.search_mode, None);
    assert_eq!(resolution.raw_word, " - ");
    assert_eq!(backend.calls(), 0);
}
