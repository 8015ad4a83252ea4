//! Process configuration
//!
//! Command-line flags with environment-variable fallbacks, resolved into a
//! [`ServiceConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};

use crate::browser::{DeploymentMode, LaunchConfig};
use crate::error::{Error, Result};
use crate::service::{ServiceSettings, DEFAULT_ACCEPT_LANGUAGE};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RuntimeEnv {
    /// Local development
    #[default]
    Development,
    /// Managed production host
    Production,
}

/// rendershot screenshot server
#[derive(Parser, Debug, Clone)]
#[command(name = "rendershot")]
#[command(version)]
#[command(about = "Screenshot service that waits for WebGL scenes to finish rendering")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to Chrome/Chromium executable
    #[arg(long, env = "CHROME_BIN")]
    pub chrome_path: Option<PathBuf>,

    /// Run with container launch arguments; any non-falsey DOCKER_ENV enables it
    #[arg(long, env = "DOCKER_ENV", value_parser = FalseyValueParser::new())]
    pub container: bool,

    /// Runtime environment
    #[arg(long = "env", env = "RENDERSHOT_ENV", value_enum, default_value_t = RuntimeEnv::Development)]
    pub environment: RuntimeEnv,

    /// Accept-Language header sent with page requests
    #[arg(long, env = "ACCEPT_LANGUAGE", default_value = DEFAULT_ACCEPT_LANGUAGE)]
    pub accept_language: String,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", value_parser = FalseyValueParser::new())]
    pub log_json: bool,
}

/// Resolved process configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// Browser launch settings
    pub launch: LaunchConfig,
    /// Capture pipeline settings
    pub settings: ServiceSettings,
    /// Debug-level logging
    pub verbose: bool,
    /// JSON log output
    pub log_json: bool,
}

impl Args {
    /// Deployment mode implied by the flags
    pub fn mode(&self) -> DeploymentMode {
        if self.container {
            DeploymentMode::Container
        } else if self.environment == RuntimeEnv::Production {
            DeploymentMode::Production
        } else {
            DeploymentMode::Local
        }
    }

    /// Resolve into a [`ServiceConfig`]
    pub fn into_config(self) -> Result<ServiceConfig> {
        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::invalid(format!("invalid listen address {}: {}", self.host, e)))?;

        let mut launch = LaunchConfig::builder()
            .mode(self.mode())
            .headless(!self.headful);
        if let Some(path) = &self.chrome_path {
            launch = launch.chrome_path(path);
        }

        let settings = ServiceSettings {
            accept_language: self.accept_language.clone(),
            ..Default::default()
        };

        Ok(ServiceConfig {
            addr,
            launch: launch.build(),
            settings,
            verbose: self.verbose,
            log_json: self.log_json,
        })
    }
}
