use std::env;

use log::debug;

pub const API_HOST_VAR: &str = "KFP_API_HOST_AND_PORT";
pub const UI_HOST_VAR: &str = "KFP_UI_HOST_AND_PORT";
pub const PACKAGE_PATH_VAR: &str = "KFP_PACKAGE_PATH";

pub const DEFAULT_API_HOST: &str = "http://host.docker.internal:8888";
pub const DEFAULT_UI_HOST: &str = "http://host.docker.internal:8080";

/// Where the pipeline service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub api_host: String,
    pub ui_host: String,
    /// Read and logged, never used.
    pub package_path: Option<String>,
}

impl PipelineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to the defaults for missing keys.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, if set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            api_host: lookup(API_HOST_VAR).unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            ui_host: lookup(UI_HOST_VAR).unwrap_or_else(|| DEFAULT_UI_HOST.to_string()),
            package_path: lookup(PACKAGE_PATH_VAR),
        };

        debug!("{config:?}");
        config
    }
}
