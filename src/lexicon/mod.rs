// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lexicon resolution
//!
//! Maps a raw fingerspelled string to ranked candidate words using prefix or
//! fuzzy search plus alias confidence.

pub mod backend;
pub mod config;
pub mod distance;
pub mod http;
pub mod memory;
pub mod resolver;
pub mod scoring;
pub mod types;

pub use backend::LexiconBackend;
pub use config::ResolverConfig;
pub use distance::{levenshtein, normalize, prefix_distance};
pub use http::HttpLexiconBackend;
pub use memory::InMemoryLexicon;
pub use resolver::LexiconResolver;
pub use scoring::{alias_confidence, rank, HybridWeights};
pub use types::{
    Alias, LexiconEntry, Resolution, ResolutionCandidate, ResolverError, SearchHit, SearchMode,
};
