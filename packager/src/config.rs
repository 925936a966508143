//! Packager configuration
//!
//! [`PackagerConfig`] is the construction-time configuration shared by
//! packaging and building: the value encoder, the value decoder and the length of
//! generated Refs. [`PackagerSettings`] is its on-disk form, loaded from TOML:
//!
//! ```toml
//! ref_length = 8
//! schema_path = "api-dump.json"
//! ```
//!
//! `PACKAGER_REF_LENGTH` and `PACKAGER_SCHEMA` override the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{DefaultDecoder, DefaultEncoder, ValueDecoder, ValueEncoder};

pub const DEFAULT_REF_LENGTH: usize = 8;
pub const MIN_REF_LENGTH: usize = 4;
pub const MAX_REF_LENGTH: usize = 32;

pub const REF_LENGTH_ENV: &str = "PACKAGER_REF_LENGTH";
pub const SCHEMA_ENV: &str = "PACKAGER_SCHEMA";

/// Errors loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

impl SettingsError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Settings file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagerSettings {
    /// Length of generated Refs
    pub ref_length: usize,
    /// API dump used as the schema provider
    pub schema_path: Option<PathBuf>,
}

impl Default for PackagerSettings {
    fn default() -> Self {
        Self {
            ref_length: DEFAULT_REF_LENGTH,
            schema_path: None,
        }
    }
}

impl PackagerSettings {
    /// Load settings from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)?.with_env_overrides()
    }

    /// Parse and validate settings without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `PACKAGER_REF_LENGTH` and `PACKAGER_SCHEMA`
    pub fn with_env_overrides(self) -> Result<Self, SettingsError> {
        self.with_overrides(
            std::env::var(REF_LENGTH_ENV).ok().as_deref(),
            std::env::var(SCHEMA_ENV).ok().as_deref(),
        )
    }

    /// Apply raw override values as they would come from the environment
    pub fn with_overrides(
        mut self,
        ref_length: Option<&str>,
        schema_path: Option<&str>,
    ) -> Result<Self, SettingsError> {
        if let Some(raw) = ref_length {
            self.ref_length = raw
                .trim()
                .parse()
                .map_err(|_| SettingsError::invalid(REF_LENGTH_ENV, format!("'{raw}' is not a number")))?;
        }
        if let Some(raw) = schema_path.filter(|s| !s.is_empty()) {
            self.schema_path = Some(PathBuf::from(raw));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_REF_LENGTH..=MAX_REF_LENGTH).contains(&self.ref_length) {
            return Err(SettingsError::invalid(
                "ref_length",
                format!(
                    "{} is outside {MIN_REF_LENGTH}..={MAX_REF_LENGTH}",
                    self.ref_length
                ),
            ));
        }
        Ok(())
    }
}

/// Configuration for packaging and building
#[derive(Clone)]
pub struct PackagerConfig {
    encoder: Arc<dyn ValueEncoder>,
    decoder: Arc<dyn ValueDecoder>,
    ref_length: usize,
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            encoder: Arc::new(DefaultEncoder),
            decoder: Arc::new(DefaultDecoder),
            ref_length: DEFAULT_REF_LENGTH,
        }
    }
}

impl fmt::Debug for PackagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagerConfig")
            .field("ref_length", &self.ref_length)
            .finish_non_exhaustive()
    }
}

impl PackagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &PackagerSettings) -> Self {
        Self::default().with_ref_length(settings.ref_length)
    }

    pub fn with_encoder(mut self, encoder: impl ValueEncoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    pub fn with_decoder(mut self, decoder: impl ValueDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn with_ref_length(mut self, ref_length: usize) -> Self {
        self.ref_length = ref_length;
        self
    }

    pub fn encoder(&self) -> &dyn ValueEncoder {
        self.encoder.as_ref()
    }

    pub fn decoder(&self) -> &dyn ValueDecoder {
        self.decoder.as_ref()
    }

    pub fn ref_length(&self) -> usize {
        self.ref_length
    }
}
