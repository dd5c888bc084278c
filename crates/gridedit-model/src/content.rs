//! Content records and the content type registry.
//!
//! ## Learning: Data Plus Behaviour
//!
//! A content type is mostly data (a name, a kind, a blank record), plus a
//! handful of optional lifecycle callbacks. The data half derives `Serialize`
//! so it can live in a config file; the behaviour half is a trait object
//! (`Arc<dyn ContentHooks>`) attached in code. Every callback has a default
//! body, so a type only overrides the hooks it cares about.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::{ModelError, ModelResult};

/// The payload of a content record: a flat JSON object.
pub type ContentData = serde_json::Map<String, Value>;

/// What an area currently holds: a content type name and its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Registered content type name (`"text"`, `"media"`, ...)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type specific data
    pub data: ContentData,
}

impl ContentRecord {
    /// Creates a record.
    pub fn new(type_name: impl Into<String>, data: ContentData) -> Self {
        Self {
            type_name: type_name.into(),
            data,
        }
    }

    /// Returns a numeric field of the data, if present and positive.
    pub fn dimension(&self, key: &str) -> Option<f64> {
        self.data
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| *v > 0.0)
    }

    /// Returns a string field of the data, if present and non-empty.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Broad family a content type belongs to.
///
/// Ingestion uses the kind to decide which registered type receives media,
/// embeds or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Media,
    Html,
    Text,
    Embed,
}

impl ContentKind {
    /// Returns true for the two kinds edited as rich text.
    pub fn is_textual(&self) -> bool {
        matches!(self, ContentKind::Html | ContentKind::Text)
    }
}

/// Lifecycle callbacks of a content type.
///
/// ## Learning: Default Trait Methods
///
/// Each method has a default, so implementors only write the hooks they
/// need. `Send + Sync` lets a registry be shared with async ingestion tasks.
pub trait ContentHooks: Send + Sync {
    /// Normalizes data coming from the renderer before it is stored.
    fn on_type_change(&self, data: ContentData) -> ContentData {
        data
    }

    /// Validates a single field value (for example a media `url`).
    fn validate(&self, _key: &str, _value: &Value) -> bool {
        true
    }

    /// Called when content of this type is removed from an area.
    fn on_remove(&self, _data: &ContentData) {}

    /// Returns true when replacing this content should ask for confirmation.
    fn warn_on_remove(&self, _data: &ContentData) -> bool {
        false
    }
}

/// A registered content type.
#[derive(Clone)]
pub struct ContentTypeDefinition {
    /// Unique type name
    pub name: String,
    /// Content family
    pub kind: ContentKind,
    /// Blank record returned by [`ContentTypeDefinition::create`]
    pub defaults: ContentData,
    /// Height follows content flow instead of the section ratio
    pub auto_height: bool,
    /// MIME patterns accepted from file drops (`"image/*"`, `"video/webm"`)
    pub accepts: Vec<String>,
    /// Maximum number of files accepted in a single drop
    pub max_files: Option<usize>,
    hooks: Option<Arc<dyn ContentHooks>>,
}

impl fmt::Debug for ContentTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentTypeDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("defaults", &self.defaults)
            .field("auto_height", &self.auto_height)
            .field("accepts", &self.accepts)
            .field("max_files", &self.max_files)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl ContentTypeDefinition {
    /// Creates a definition without hooks.
    pub fn new(name: impl Into<String>, kind: ContentKind, defaults: ContentData) -> Self {
        Self {
            name: name.into(),
            kind,
            defaults,
            auto_height: false,
            accepts: Vec::new(),
            max_files: None,
            hooks: None,
        }
    }

    /// Marks the type as auto-height.
    pub fn auto_height(mut self, auto_height: bool) -> Self {
        self.auto_height = auto_height;
        self
    }

    /// Sets the accepted MIME patterns.
    pub fn accepting<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepts = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Caps the number of files accepted per drop.
    pub fn max_files(mut self, max: Option<usize>) -> Self {
        self.max_files = max;
        self
    }

    /// Attaches lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn ContentHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Returns a fresh blank record.
    pub fn create(&self) -> ContentData {
        self.defaults.clone()
    }

    /// Runs the `on_type_change` hook.
    pub fn on_type_change(&self, data: ContentData) -> ContentData {
        match &self.hooks {
            Some(hooks) => hooks.on_type_change(data),
            None => data,
        }
    }

    /// Runs the `validate` hook. Types without hooks accept every value.
    pub fn validate(&self, key: &str, value: &Value) -> bool {
        self.hooks
            .as_ref()
            .is_none_or(|hooks| hooks.validate(key, value))
    }

    /// Runs the `on_remove` hook.
    pub fn on_remove(&self, data: &ContentData) {
        if let Some(hooks) = &self.hooks {
            hooks.on_remove(data);
        }
    }

    /// Runs the `warn_on_remove` hook.
    pub fn warn_on_remove(&self, data: &ContentData) -> bool {
        self.hooks
            .as_ref()
            .is_some_and(|hooks| hooks.warn_on_remove(data))
    }

    /// Returns true when a file with this MIME type may be dropped in.
    ///
    /// A blank MIME type is accepted by any type that accepts files at all,
    /// since some platforms report nothing for HEIC images.
    pub fn accepts_mime(&self, mime: &str) -> bool {
        if self.accepts.is_empty() {
            return false;
        }
        if mime.is_empty() {
            return true;
        }
        self.accepts
            .iter()
            .any(|pattern| mime.starts_with(pattern.trim_end_matches('*')))
    }

    /// Returns the key the type stores its source url under.
    pub fn source_key(&self) -> &'static str {
        if self.defaults.contains_key("src") {
            "src"
        } else {
            "url"
        }
    }

    // ==================== Standard Types ====================

    /// Rich text, flowing height. Warns on remove when it holds text.
    pub fn text() -> Self {
        let mut defaults = ContentData::new();
        defaults.insert("src".into(), Value::from("<p>&#8203;</p>"));
        Self::new("text", ContentKind::Html, defaults)
            .auto_height(true)
            .with_hooks(Arc::new(TextHooks))
    }

    /// Images and videos with intrinsic pixel dimensions.
    pub fn media() -> Self {
        let mut defaults = ContentData::new();
        defaults.insert("url".into(), Value::Null);
        defaults.insert("videoUrl".into(), Value::Null);
        defaults.insert("alt".into(), Value::Null);
        defaults.insert("width".into(), Value::from(0));
        defaults.insert("height".into(), Value::from(0));
        Self::new("media", ContentKind::Media, defaults)
            .accepting([
                "image/*",
                "image/apng",
                "image/avif",
                "image/webp",
                "image/heic",
                "video/*",
                "video/webm",
                "video/av1",
            ])
            .with_hooks(Arc::new(SourceHooks { require_scheme: false }))
    }

    /// Third-party players referenced by url.
    pub fn embed() -> Self {
        let mut defaults = ContentData::new();
        defaults.insert("src".into(), Value::Null);
        defaults.insert("width".into(), Value::from(0));
        defaults.insert("height".into(), Value::from(0));
        Self::new("embed", ContentKind::Embed, defaults)
            .with_hooks(Arc::new(SourceHooks { require_scheme: true }))
    }
}

/// Hooks of the standard text type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextHooks;

impl ContentHooks for TextHooks {
    fn warn_on_remove(&self, data: &ContentData) -> bool {
        data.get("src")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    }
}

/// Hooks of the standard media and embed types: validates source urls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceHooks {
    /// Only absolute `http(s)` or protocol-relative urls pass
    pub require_scheme: bool,
}

impl ContentHooks for SourceHooks {
    fn validate(&self, key: &str, value: &Value) -> bool {
        if key != "url" && key != "src" {
            return true;
        }
        let Some(url) = value.as_str().map(str::trim) else {
            return false;
        };
        if url.is_empty() || url.starts_with('<') || url.contains(char::is_whitespace) {
            return false;
        }
        !self.require_scheme
            || url.starts_with("https://")
            || url.starts_with("http://")
            || url.starts_with("//")
    }
}

/// Ordered set of content types, validated on registration.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeRegistry {
    types: Vec<ContentTypeDefinition>,
}

impl ContentTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard text, media and embed types.
    pub fn standard() -> Self {
        Self {
            types: vec![
                ContentTypeDefinition::text(),
                ContentTypeDefinition::media(),
                ContentTypeDefinition::embed(),
            ],
        }
    }

    /// Registers a type. Names must be unique.
    pub fn register(&mut self, definition: ContentTypeDefinition) -> ModelResult<()> {
        if self.get(&definition.name).is_some() {
            return Err(ModelError::DuplicateContentType(definition.name));
        }
        self.types.push(definition);
        Ok(())
    }

    /// Builder-style [`ContentTypeRegistry::register`].
    pub fn with(mut self, definition: ContentTypeDefinition) -> ModelResult<Self> {
        self.register(definition)?;
        Ok(self)
    }

    /// Looks a type up by name.
    pub fn get(&self, name: &str) -> Option<&ContentTypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Looks a type up by name, failing with an invalid-configuration error.
    pub fn require(&self, name: &str) -> ModelResult<&ContentTypeDefinition> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownContentType(name.to_string()))
    }

    /// First registered type, used when an empty area is clicked.
    pub fn first(&self) -> Option<&ContentTypeDefinition> {
        self.types.first()
    }

    /// First registered type of a kind.
    pub fn first_of_kind(&self, kind: ContentKind) -> Option<&ContentTypeDefinition> {
        self.types.iter().find(|t| t.kind == kind)
    }

    /// Type receiving pasted text: `text` kind first, then `html`.
    pub fn text_type(&self) -> Option<&ContentTypeDefinition> {
        self.first_of_kind(ContentKind::Text)
            .or_else(|| self.first_of_kind(ContentKind::Html))
    }

    /// Returns true when the named type is auto-height.
    pub fn is_auto_height(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.auto_height)
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ContentTypeDefinition> {
        self.types.iter()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
