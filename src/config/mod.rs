// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every section can come from a TOML file, from environment variables, or
//! fall back to defaults. Missing keys in a TOML file keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::aggregator::{CommitConfig, FinalizerConfig};
use crate::lexicon::ResolverConfig;
use crate::pipeline::PipelineConfig;
use crate::session::SessionConfig;
use crate::stream::StreamConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {section} configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub stream: StreamConfig,
    pub commit: CommitConfig,
    pub finalizer: FinalizerConfig,
    pub resolver: ResolverConfig,
    pub session: SessionConfig,
    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            stream: StreamConfig::from_env(),
            commit: CommitConfig::from_env(),
            finalizer: FinalizerConfig::from_env(),
            resolver: ResolverConfig::from_env(),
            session: SessionConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sections: [(&'static str, Result<(), String>); 6] = [
            ("stream", self.stream.validate()),
            ("commit", self.commit.validate()),
            ("finalizer", self.finalizer.validate()),
            ("resolver", self.resolver.validate()),
            ("session", self.session.validate()),
            ("pipeline", self.pipeline.validate()),
        ];
        for (section, result) in sections {
            result.map_err(|message| ConfigError::Invalid { section, message })?;
        }
        Ok(())
    }

    /// Session store capacity across all shards
    pub fn session_capacity(&self) -> usize {
        self.session
            .max_sessions_per_shard
            .saturating_mul(self.pipeline.session_shards)
    }
}
