//! Configuration management for Quill.
//!
//! Parses `quill.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Path values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `build.source_dir`
//! - `build.output_dir`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the output directory for rendered pages.
    pub output_dir: Option<PathBuf>,
    /// Override the PBKDF2 iteration count.
    pub iterations: Option<u32>,
    /// Override strict handling of password-less encrypted blocks.
    pub strict_passwords: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quill.toml";

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Default container nesting limit for the block scanner.
pub const DEFAULT_MAX_CONTAINER_DEPTH: usize = 10;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build paths (relative strings from TOML).
    build: BuildConfigRaw,
    /// Markup extension switches.
    pub markup: MarkupConfig,
    /// Build-time encryption settings.
    pub encryption: EncryptionConfig,
    /// Decryption widget settings.
    pub widget: WidgetConfig,

    /// Resolved build configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw build configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
}

/// Resolved build configuration with absolute paths.
#[derive(Debug, Default)]
pub struct BuildConfig {
    /// Directory holding markdown posts.
    pub source_dir: PathBuf,
    /// Directory rendered HTML is written to.
    pub output_dir: PathBuf,
}

/// Markup extension switches.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Recognize `:::`, `+++` and `;;;` container directives.
    pub containers: bool,
    /// Recognize `{% links %}` and `{% media %}` tag pairs.
    pub hexo_tags: bool,
    /// Apply ruby, spoiler, ins, mark, sub and sup rewrites.
    pub inline_syntax: bool,
    /// Attach `{.class #id key=value}` annotations.
    pub attributes: bool,
    /// Nesting limit for container directives.
    pub max_container_depth: usize,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            containers: true,
            hexo_tags: true,
            inline_syntax: true,
            attributes: true,
            max_container_depth: DEFAULT_MAX_CONTAINER_DEPTH,
        }
    }
}

/// Build-time encryption settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub iterations: u32,
    /// Fail the build when an encrypted block has no password.
    ///
    /// When disabled the block is published unencrypted with a warning.
    pub strict_passwords: bool,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            strict_passwords: true,
        }
    }
}

/// Decryption widget settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// How long the error state is shown before reverting to locked.
    pub error_revert_ms: u64,
}

impl WidgetConfig {
    /// Error display duration.
    #[must_use]
    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            error_revert_ms: 2000,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`build.output_dir`").
        field: String,
        /// Error message (e.g., "${`BLOG_OUT`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quill.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, so CLI
    /// arguments take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(output_dir) = &settings.output_dir {
            self.build_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(iterations) = settings.iterations {
            self.encryption.iterations = iterations;
        }
        if let Some(strict) = settings.strict_passwords {
            self.encryption.strict_passwords = strict;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            build: BuildConfigRaw::default(),
            markup: MarkupConfig::default(),
            encryption: EncryptionConfig::default(),
            widget: WidgetConfig::default(),
            build_resolved: BuildConfig {
                source_dir: base.join("source"),
                output_dir: base.join("public"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_markup()?;
        self.validate_encryption()?;

        if self.widget.error_revert_ms == 0 {
            return Err(ConfigError::Validation(
                "widget.error_revert_ms must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_markup(&self) -> Result<(), ConfigError> {
        const MAX_DEPTH: usize = 64;

        let depth = self.markup.max_container_depth;
        if depth == 0 {
            return Err(ConfigError::Validation(
                "markup.max_container_depth must be greater than 0".to_owned(),
            ));
        }
        if depth > MAX_DEPTH {
            return Err(ConfigError::Validation(format!(
                "markup.max_container_depth cannot exceed {MAX_DEPTH}"
            )));
        }
        Ok(())
    }

    fn validate_encryption(&self) -> Result<(), ConfigError> {
        const MIN_ITERATIONS: u32 = 1000;

        if self.encryption.iterations < MIN_ITERATIONS {
            return Err(ConfigError::Validation(format!(
                "encryption.iterations must be at least {MIN_ITERATIONS}"
            )));
        }
        Ok(())
    }

    /// Expand environment variable references in path strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.build.source_dir {
            self.build.source_dir = Some(expand::expand_env(dir, "build.source_dir")?);
        }
        if let Some(ref dir) = self.build.output_dir {
            self.build.output_dir = Some(expand::expand_env(dir, "build.output_dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.build_resolved = BuildConfig {
            source_dir: resolve(self.build.source_dir.as_deref(), "source"),
            output_dir: resolve(self.build.output_dir.as_deref(), "public"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/blog"));
        assert_eq!(config.build_resolved.source_dir, PathBuf::from("/blog/source"));
        assert_eq!(config.build_resolved.output_dir, PathBuf::from("/blog/public"));
        assert!(config.markup.containers);
        assert!(config.markup.hexo_tags);
        assert_eq!(config.markup.max_container_depth, 10);
        assert_eq!(config.encryption.iterations, 100_000);
        assert!(config.encryption.strict_passwords);
        assert_eq!(config.widget.error_revert(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.markup.inline_syntax);
        assert_eq!(config.encryption.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_parse_markup_section() {
        let toml = r"
[markup]
hexo_tags = false
max_container_depth = 4
";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.markup.hexo_tags);
        assert!(config.markup.containers);
        assert_eq!(config.markup.max_container_depth, 4);
    }

    #[test]
    fn test_parse_encryption_and_widget() {
        let toml = r"
[encryption]
iterations = 250000
strict_passwords = false

[widget]
error_revert_ms = 500
";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.encryption.iterations, 250_000);
        assert!(!config.encryption.strict_passwords);
        assert_eq!(config.widget.error_revert(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let toml = r#"
[encryption]
iterations = "many"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_resolves_paths_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(
            &path,
            r#"
[build]
source_dir = "posts"
output_dir = "dist"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.build_resolved.source_dir, dir.path().join("posts"));
        assert_eq!(config.build_resolved.output_dir, dir.path().join("dist"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_expands_env_in_paths() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("QUILL_TEST_OUT_DIR", "site-out");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(
            &path,
            "[build]\noutput_dir = \"${QUILL_TEST_OUT_DIR}\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.build_resolved.output_dir, dir.path().join("site-out"));
        unsafe {
            std::env::remove_var("QUILL_TEST_OUT_DIR");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "[encryption]\niterations = 10\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("encryption.iterations"));
    }

    #[test]
    fn test_cli_settings_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "[encryption]\nstrict_passwords = true\n").unwrap();

        let settings = CliSettings {
            output_dir: Some(PathBuf::from("/tmp/out")),
            iterations: Some(5000),
            strict_passwords: Some(false),
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();
        assert_eq!(config.build_resolved.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.encryption.iterations, 5000);
        assert!(!config.encryption.strict_passwords);
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            iterations: Some(1),
            ..Default::default()
        };
        assert!(Config::load(Some(&path), Some(&settings)).is_err());
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/blog"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_depth_zero() {
        let mut config = Config::default_with_base(Path::new("/blog"));
        config.markup.max_container_depth = 0;
        assert_validation_error(&config, &["max_container_depth", "greater than 0"]);
    }

    #[test]
    fn test_validate_depth_too_large() {
        let mut config = Config::default_with_base(Path::new("/blog"));
        config.markup.max_container_depth = 1000;
        assert_validation_error(&config, &["max_container_depth", "64"]);
    }

    #[test]
    fn test_validate_low_iterations() {
        let mut config = Config::default_with_base(Path::new("/blog"));
        config.encryption.iterations = 999;
        assert_validation_error(&config, &["encryption.iterations"]);
    }

    #[test]
    fn test_validate_zero_revert_delay() {
        let mut config = Config::default_with_base(Path::new("/blog"));
        config.widget.error_revert_ms = 0;
        assert_validation_error(&config, &["widget.error_revert_ms"]);
    }
}
