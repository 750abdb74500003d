// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod aggregator;
pub mod cli;
pub mod clock;
pub mod config;
pub mod lexicon;
pub mod pipeline;
pub mod session;
pub mod stream;

pub use aggregator::{
    CommitConfig, CommitDecision, CommitEngine, FinalizeTrigger, FinalizedWord, Finalizer,
    FinalizerConfig, RepeatPolicy,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ServiceConfig};
pub use lexicon::{
    InMemoryLexicon, LexiconBackend, LexiconEntry, LexiconResolver, Resolution,
    ResolutionCandidate, ResolverConfig, ResolverError, SearchMode,
};
pub use pipeline::{ResolvedWord, ResolverService, RunningService};
pub use session::{MemorySessionStore, SessionState, SessionStore};
pub use stream::{LetterEvent, MemoryStreamProvider, StreamConfig, StreamConsumer, StreamProvider};
