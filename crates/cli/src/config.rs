use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine::PipelineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Where log events go. Stdout is left to the artifact path and the run
/// summary by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stderr,
    Stdout,
    File { path: String },
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Folder created under the parent folder for every artifact
    pub folder_name: String,
    /// Leave per-input, merged and ordered files next to the final artifact
    pub keep_intermediates: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder_name: "ProcessedLogs".to_string(),
            keep_intermediates: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from logweave.{toml,yaml,json} and environment variables
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // 1. /etc/logweave/logweave (system-wide)
        // 2. config/logweave (working directory)
        for path in ["/etc/logweave/logweave", "config/logweave"] {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        // Double underscore for nested keys: LOGWEAVE__PIPELINE__WORKER_COUNT
        builder = builder.add_source(
            config::Environment::with_prefix("LOGWEAVE")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid pipeline configuration")?;

        let folder = Path::new(&self.output.folder_name);
        if self.output.folder_name.is_empty()
            || folder.components().count() != 1
            || self.output.folder_name == "."
            || self.output.folder_name == ".."
        {
            anyhow::bail!(
                "output.folder_name must be a single directory name, got '{}'",
                self.output.folder_name
            );
        }

        if let LogOutput::File { path } = &self.logging.output {
            if path.is_empty() {
                anyhow::bail!("logging.output file path is empty");
            }
        }

        Ok(())
    }

    /// Path of the artifact folder under `parent`.
    pub fn output_dir(&self, parent: &Path) -> PathBuf {
        parent.join(&self.output.folder_name)
    }
}
