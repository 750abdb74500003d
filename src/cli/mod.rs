// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod replay;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::ServiceConfig;

/// Glossa letter stream resolver
#[derive(Parser, Debug)]
#[command(name = "glossa-resolver")]
#[command(version)]
#[command(about = "Replay fingerspelling letter events and resolve finalized words", long_about = None)]
pub struct Cli {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(long, env = "GLOSSA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lexicon JSON file for the in-memory backend
    #[arg(long, env = "LEXICON_FILE", conflicts_with = "lexicon_url")]
    pub lexicon: Option<PathBuf>,

    /// Remote lexicon search endpoint
    #[arg(long, env = "LEXICON_ENDPOINT")]
    pub lexicon_url: Option<String>,

    /// Lexicon scope applied to every session
    #[arg(long, env = "LEXICON_SCOPE")]
    pub scope: Option<String>,

    /// Letter events as JSON lines, `-` for stdin
    #[arg(long, default_value = "-")]
    pub input: String,

    /// Partitions of the in-process letter stream
    #[arg(long, default_value_t = 2)]
    pub partitions: usize,
}

impl Cli {
    /// Effective service configuration: file or environment, then flag overrides
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ServiceConfig::from_env(),
        };
        if let Some(url) = &self.lexicon_url {
            config.resolver.endpoint = Some(url.clone());
        }
        if let Some(scope) = &self.scope {
            config.pipeline.lexicon_scope = Some(scope.clone());
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Execute the replay
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.service_config()?;
    replay::run(&cli, config).await
}
