//! Upload and orchestrator configuration.
//!
//! [`UploadConfig`] carries the admission rules and can be loaded from a
//! JSON file (camelCase keys, all optional) or from `DROPZONE_*`
//! environment variables. [`OrchestratorOptions`] carries behaviour
//! switches that are not admission rules.
//!
//! Both are validated eagerly; nothing downstream re-checks them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// 10 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1;

/// Admission rules applied to every selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadConfig {
    /// Maximum file size in bytes
    pub max_size: u64,
    /// Allowed MIME types; empty means unrestricted
    pub allowed_types: BTreeSet<String>,
    /// Maximum image width in pixels
    pub max_width: u32,
    /// Maximum image height in pixels
    pub max_height: u32,
    /// Maximum live entries (multi-file mode only)
    pub max_files: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            allowed_types: BTreeSet::new(),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl UploadConfig {
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Check every value, returning the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidMaxSize);
        }
        if self.max_width == 0 {
            return Err(ConfigError::InvalidDimension("maxWidth"));
        }
        if self.max_height == 0 {
            return Err(ConfigError::InvalidDimension("maxHeight"));
        }
        if self.max_files == 0 {
            return Err(ConfigError::InvalidMaxFiles);
        }
        if let Some(bad) = self.allowed_types.iter().find(|t| !is_mime_like(t)) {
            return Err(ConfigError::InvalidMimeType(bad.clone()));
        }
        Ok(())
    }

    /// Whether `mime` passes the allow-list.
    pub fn allows_type(&self, mime: &str) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(mime)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Defaults overridden by `DROPZONE_*` environment variables (and `.env`).
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `DROPZONE_*` overrides on top of `self`, then validate.
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        self.with_overrides_from(|name| env::var(name).ok())
    }

    /// Apply `DROPZONE_*` overrides read through `lookup`, then validate.
    ///
    /// `DROPZONE_ALLOWED_TYPES` is a comma-separated list; blank items are
    /// skipped.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<u64, _>(&lookup, "DROPZONE_MAX_SIZE")? {
            self.max_size = v;
        }
        if let Some(types) = lookup("DROPZONE_ALLOWED_TYPES") {
            self.allowed_types = types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "DROPZONE_MAX_WIDTH")? {
            self.max_width = v;
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "DROPZONE_MAX_HEIGHT")? {
            self.max_height = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "DROPZONE_MAX_FILES")? {
            self.max_files = v;
        }

        self.validate()?;
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        None => Ok(None),
    }
}

/// `type/subtype` with both halves non-empty and no whitespace.
fn is_mime_like(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

// =============================================================================
// Orchestrator Options
// =============================================================================

/// Single-file or multi-file selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// One entry at a time; a new selection replaces the current one
    Single,
    /// Up to `maxFiles` live entries
    #[default]
    Multiple,
}

/// Behaviour switches for an orchestrator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorOptions {
    pub mode: SelectionMode,
    /// Enqueue valid entries as soon as they are admitted
    pub auto_upload: bool,
    /// Allocate previews for valid image entries
    pub generate_previews: bool,
    /// Maximum uploads in flight
    pub concurrency_limit: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Multiple,
            auto_upload: true,
            generate_previews: true,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl OrchestratorOptions {
    pub fn single() -> Self {
        Self {
            mode: SelectionMode::Single,
            ..Self::default()
        }
    }

    pub fn with_auto_upload(mut self, auto_upload: bool) -> Self {
        self.auto_upload = auto_upload;
        self
    }

    pub fn with_previews(mut self, generate_previews: bool) -> Self {
        self.generate_previews = generate_previews;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_size, 10 * 1024 * 1024);
        assert_eq!((config.max_width, config.max_height), (1920, 1080));
        assert_eq!(config.max_files, 10);
        assert!(config.allowed_types.is_empty());
        assert!(config.validate().is_ok());

        let options = OrchestratorOptions::default();
        assert_eq!(options.concurrency_limit, 1);
        assert!(options.auto_upload);
    }

    #[test]
    fn test_empty_allow_list_is_unrestricted() {
        let config = UploadConfig::default();
        assert!(config.allows_type("application/x-anything"));

        let config = config.with_allowed_types(["image/png"]);
        assert!(config.allows_type("image/png"));
        assert!(!config.allows_type("image/jpeg"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = UploadConfig::from_json(r#"{ "maxSize": 1024, "allowedTypes": ["image/png"] }"#).unwrap();
        assert_eq!(config.max_size, 1024);
        assert_eq!(config.max_width, DEFAULT_MAX_WIDTH);
        assert!(config.allowed_types.contains("image/png"));
    }

    #[test]
    fn test_non_positive_values_rejected() {
        assert!(matches!(
            UploadConfig::from_json(r#"{ "maxSize": 0 }"#),
            Err(ConfigError::InvalidMaxSize)
        ));
        assert!(matches!(
            UploadConfig::from_json(r#"{ "maxHeight": 0 }"#),
            Err(ConfigError::InvalidDimension("maxHeight"))
        ));
        assert!(matches!(
            UploadConfig::from_json(r#"{ "maxFiles": 0 }"#),
            Err(ConfigError::InvalidMaxFiles)
        ));
        // negative numbers fail to deserialize into unsigned fields
        assert!(matches!(
            UploadConfig::from_json(r#"{ "maxSize": -5 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_non_string_allowed_type_rejected() {
        assert!(matches!(
            UploadConfig::from_json(r#"{ "allowedTypes": ["image/png", 42] }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            UploadConfig::from_json(r#"{ "allowedTypes": ["png"] }"#),
            Err(ConfigError::InvalidMimeType(t)) if t == "png"
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let options = OrchestratorOptions::default().with_concurrency_limit(0);
        assert!(matches!(options.validate(), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.json");
        std::fs::write(&path, r#"{ "maxFiles": 3 }"#).unwrap();

        let config = UploadConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_files, 3);

        assert!(matches!(
            UploadConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_overrides_replace_fields() {
        let config = UploadConfig::default()
            .with_overrides_from(vars(&[
                ("DROPZONE_MAX_SIZE", " 2048 "),
                ("DROPZONE_ALLOWED_TYPES", "image/png, image/jpeg,,application/pdf "),
                ("DROPZONE_MAX_WIDTH", "800"),
                ("DROPZONE_MAX_FILES", "3"),
            ]))
            .unwrap();

        assert_eq!(config.max_size, 2048);
        assert_eq!(
            config.allowed_types.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["application/pdf", "image/jpeg", "image/png"]
        );
        assert_eq!((config.max_width, config.max_height), (800, DEFAULT_MAX_HEIGHT));
        assert_eq!(config.max_files, 3);
    }

    #[test]
    fn test_no_overrides_keeps_base() {
        let base = UploadConfig::default().with_max_files(4);
        assert_eq!(base.clone().with_overrides_from(vars(&[])).unwrap(), base);
    }

    #[test]
    fn test_unparsable_override_rejected() {
        let err = UploadConfig::default()
            .with_overrides_from(vars(&[("DROPZONE_MAX_HEIGHT", "tall")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: "DROPZONE_MAX_HEIGHT", ref value } if value == "tall"
        ));

        assert!(matches!(
            UploadConfig::default().with_overrides_from(vars(&[("DROPZONE_MAX_SIZE", "-1")])),
            Err(ConfigError::InvalidEnv { name: "DROPZONE_MAX_SIZE", .. })
        ));
    }

    #[test]
    fn test_overrides_are_validated() {
        assert!(matches!(
            UploadConfig::default().with_overrides_from(vars(&[("DROPZONE_MAX_FILES", "0")])),
            Err(ConfigError::InvalidMaxFiles)
        ));
        assert!(matches!(
            UploadConfig::default().with_overrides_from(vars(&[("DROPZONE_ALLOWED_TYPES", "png")])),
            Err(ConfigError::InvalidMimeType(t)) if t == "png"
        ));
    }

    #[test]
    fn test_env_overrides_read_process_environment() {
        // The only test touching the process environment
        std::env::set_var("DROPZONE_MAX_WIDTH", "640");
        let config = UploadConfig::from_env();
        std::env::remove_var("DROPZONE_MAX_WIDTH");

        assert_eq!(config.unwrap().max_width, 640);
    }

    #[test]
    fn test_mime_shape() {
        assert!(is_mime_like("image/png"));
        assert!(is_mime_like("application/vnd.ms-excel"));
        assert!(!is_mime_like("image/"));
        assert!(!is_mime_like("/png"));
        assert!(!is_mime_like("image png"));
        assert!(!is_mime_like("a/b/c"));
    }
}
