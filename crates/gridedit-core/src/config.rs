//! Editor configuration.
//!
//! ## Learning: Serde Defaults
//!
//! Every struct here carries `#[serde(default)]`, so a config file only
//! needs the keys it changes. A file holding just `[editor]\nrequired = true`
//! still yields the standard section types and timing values.

use gridedit_model::{
    AreaDefinition, ContentData, ContentKind, ContentTypeDefinition, ContentTypeRegistry,
    SectionDefinition, SectionTypeRegistry, SourceHooks, TextHooks,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::CoreResult;

/// Default spacing unit between areas and around sections.
pub const MARGIN_DEFAULT: f64 = 1.0;

/// Main editor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editor behavior settings
    pub editor: EditorConfig,

    /// Debounce and throttle intervals
    pub timing: TimingConfig,

    /// Resize behavior
    pub resize: ResizeConfig,

    /// Section types, in registration order
    pub section_types: Vec<SectionTypeConfig>,

    /// Declarative content types (empty means the standard text, media
    /// and embed types)
    pub content_types: Vec<ContentTypeConfig>,
}

impl Config {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_default()
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("gridedit").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Builds the section type registry.
    pub fn section_registry(&self) -> CoreResult<SectionTypeRegistry> {
        let mut registry = SectionTypeRegistry::new();
        for entry in &self.section_types {
            registry.register(entry.name.clone(), entry.definition())?;
        }
        Ok(registry)
    }

    /// Builds the content type registry.
    ///
    /// Hooks are attached by kind: text-like types get [`TextHooks`], media
    /// and embed types get [`SourceHooks`].
    pub fn content_registry(&self) -> CoreResult<ContentTypeRegistry> {
        if self.content_types.is_empty() {
            return Ok(ContentTypeRegistry::standard());
        }

        let mut registry = ContentTypeRegistry::new();
        for entry in &self.content_types {
            registry.register(entry.definition())?;
        }
        Ok(registry)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default(),
            timing: TimingConfig::default(),
            resize: ResizeConfig::default(),
            section_types: SectionTypeConfig::standard(),
            content_types: Vec::new(),
        }
    }
}

/// Editor behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Margin given to new sections
    pub margin: f64,

    /// An empty value is invalid once the user interacted
    pub required: bool,

    /// Force every section to full width (small screens)
    pub narrow_view: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            margin: MARGIN_DEFAULT,
            required: false,
            narrow_view: false,
        }
    }
}

/// Debounce and throttle intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet period before the emptiness scan runs (ms)
    pub empty_check_debounce_ms: u64,

    /// Minimum spacing of applied pointer moves (ms)
    pub pointer_throttle_ms: u64,
}

impl TimingConfig {
    pub fn empty_check_debounce(&self) -> Duration {
        Duration::from_millis(self.empty_check_debounce_ms)
    }

    pub fn pointer_throttle(&self) -> Duration {
        Duration::from_millis(self.pointer_throttle_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            empty_check_debounce_ms: 500,
            pointer_throttle_ms: 25,
        }
    }
}

/// Resize configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Smallest size a coupled area may shrink to (percentage points)
    pub min_area_size: f64,

    /// Handle movement per arrow key press (px)
    pub keyboard_step_px: f64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            min_area_size: 10.0,
            keyboard_step_px: 5.0,
        }
    }
}

/// A named section type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTypeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    pub height: f64,
    pub areas: Vec<AreaDefinition>,
}

impl SectionTypeConfig {
    /// One, two and three column rows.
    pub fn standard() -> Vec<Self> {
        SectionTypeRegistry::standard()
            .iter()
            .map(|(name, definition)| Self {
                name: name.to_string(),
                width: definition.width,
                height: definition.height,
                areas: definition.areas.clone(),
            })
            .collect()
    }

    fn definition(&self) -> SectionDefinition {
        SectionDefinition {
            width: self.width,
            height: self.height,
            areas: self.areas.clone(),
        }
    }
}

/// A content type declared in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeConfig {
    pub name: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub auto_height: bool,
    #[serde(default)]
    pub accepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub defaults: ContentData,
}

impl ContentTypeConfig {
    fn definition(&self) -> ContentTypeDefinition {
        let definition = ContentTypeDefinition::new(self.name.clone(), self.kind, self.defaults.clone())
            .auto_height(self.auto_height)
            .accepting(self.accepts.iter().cloned())
            .max_files(self.max_files);

        match self.kind {
            ContentKind::Html | ContentKind::Text => definition.with_hooks(Arc::new(TextHooks)),
            ContentKind::Media => definition.with_hooks(Arc::new(SourceHooks { require_scheme: false })),
            ContentKind::Embed => definition.with_hooks(Arc::new(SourceHooks { require_scheme: true })),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.editor.margin, 1.0);
        assert!(!config.editor.required);
        assert_eq!(config.timing.empty_check_debounce(), Duration::from_millis(500));
        assert_eq!(config.resize.min_area_size, 10.0);
        assert_eq!(config.section_types.len(), 3);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.section_types, config.section_types);
        assert_eq!(parsed.timing.pointer_throttle_ms, 25);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str("[editor]\nrequired = true\n").unwrap();
        assert!(config.editor.required);
        assert_eq!(config.editor.margin, MARGIN_DEFAULT);
        assert_eq!(config.section_registry().unwrap().first().unwrap().0, "single");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.editor.narrow_view = true;
        config.resize.keyboard_step_px = 8.0;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.editor.narrow_view);
        assert_eq!(loaded.resize.keyboard_step_px, 8.0);
    }

    #[test]
    fn test_declared_content_types() {
        let config: Config = toml::from_str(
            r#"
            [[content_types]]
            name = "quote"
            kind = "text"
            auto_height = true
            defaults = { src = "" }

            [[content_types]]
            name = "photo"
            kind = "media"
            accepts = ["image/*"]
            max_files = 1
            defaults = { url = "", width = 0, height = 0 }
            "#,
        )
        .unwrap();

        let registry = config.content_registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.text_type().unwrap().name, "quote");
        let photo = registry.get("photo").unwrap();
        assert!(photo.accepts_mime("image/png"));
        assert_eq!(photo.max_files, Some(1));
        assert!(!photo.validate("url", &serde_json::json!("<p>no</p>")));
    }

    #[test]
    fn test_duplicate_section_types_rejected() {
        let mut config = Config::default();
        config.section_types.push(config.section_types[0].clone());
        assert!(config.section_registry().is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
