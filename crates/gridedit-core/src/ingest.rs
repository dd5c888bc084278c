//! Content ingestion: pasted HTML, dropped files and copied areas.
//!
//! ## Learning: Fallible Strategies as `Option`
//!
//! A pasted segment is tried as media, then as an embed, then as text. Each
//! attempt returns `Option<ContentRecord>`, so the fall-through chain is just
//! `or_else`. Nothing here is an error for the user: a failed attempt is
//! logged at `debug` and the next strategy runs.
//!
//! ## Learning: Async Traits at the Edges
//!
//! Measuring an image, resolving an embed url and uploading files happen
//! outside this crate. They are `#[async_trait]` traits, so the host can plug
//! in a network client and tests can plug in a stub returning fixed values.

use async_trait::async_trait;
use gridedit_model::{
    Area, AreaId, ContentData, ContentKind, ContentRecord, ContentTypeDefinition,
    ContentTypeRegistry, Dimensions, IdGenerator, Section, SectionId, SectionTypeRegistry,
    number_value,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{CoreError, CoreResult};

/// Size assumed for iframes that declare no pixel size.
pub const EMBED_FALLBACK_SIZE: Dimensions = Dimensions {
    width: 960.0,
    height: 540.0,
};

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<img[^>]*>|<video[^>]*></video>|<iframe[^>]*></iframe>)").expect("valid regex")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("valid regex"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z][a-zA-Z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));

static STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

// ==================== Collaborators ====================

/// Measures the natural pixel size of an image or video.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, url: &str) -> CoreResult<Dimensions>;
}

/// Turns a pasted url or player address into an embeddable source.
#[async_trait]
pub trait EmbedResolver: Send + Sync {
    async fn resolve(&self, source: &str) -> CoreResult<String>;
}

/// Uploads dropped files for one content type and returns their data.
#[async_trait]
pub trait UploadPipeline: Send + Sync {
    async fn upload(&self, type_name: &str, files: Vec<DroppedFile>) -> CoreResult<Vec<ContentData>>;
}

/// Probe for hosts that cannot load media: only sizes written in the
/// markup are known, other media is placed with its size pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

#[async_trait]
impl MediaProbe for NoProbe {
    async fn probe(&self, url: &str) -> CoreResult<Dimensions> {
        Err(CoreError::Ingest(format!("cannot measure {}", url)))
    }
}

/// Resolver that keeps every source as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl EmbedResolver for PassthroughResolver {
    async fn resolve(&self, source: &str) -> CoreResult<String> {
        Ok(source.to_string())
    }
}

// ==================== Incoming Content ====================

/// Something to place into the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A typed record, from ingestion or an upload
    Content(ContentRecord),
    /// A copied area; only its content travels
    Area(Area),
}

impl Incoming {
    fn apply_to(&self, registry: &ContentTypeRegistry, target: &Area) -> CoreResult<Area> {
        match self {
            Incoming::Content(record) => {
                Ok(target.add_content_type(registry, &record.type_name, Some(&record.data))?)
            }
            Incoming::Area(area) => Ok(target.with_content(area.content.clone())),
        }
    }
}

impl From<ContentRecord> for Incoming {
    fn from(record: ContentRecord) -> Self {
        Incoming::Content(record)
    }
}

/// The drag payload of an area being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragPayload {
    pub area_id: AreaId,
}

impl DragPayload {
    pub fn new(area_id: AreaId) -> Self {
        Self { area_id }
    }

    /// Serializes to `{"areaId": n}`.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a payload, `None` for anything that is not one.
    pub fn decode(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!("Ignoring drop payload: {}", e);
                None
            }
        }
    }
}

// ==================== Files ====================

/// A file dropped onto the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    /// MIME type as reported by the platform, possibly empty
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

/// Why a file was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// No content type accepts its MIME type
    WrongType,
    /// Every type accepting it already got its maximum number of files
    TooMany,
}

/// A file that was not accepted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub name: String,
    pub reason: RejectionReason,
}

/// Files accepted by one content type.
#[derive(Debug, Clone, PartialEq)]
pub struct FileBatch {
    pub type_name: String,
    pub files: Vec<DroppedFile>,
}

/// Splits dropped files among the content types that accept them.
///
/// Each type takes the files matching its MIME patterns, up to its
/// `max_files`. A file taken by no type is rejected.
pub fn files_result(files: &[DroppedFile], registry: &ContentTypeRegistry) -> (Vec<FileBatch>, Vec<FileRejection>) {
    let mut batches = Vec::new();
    let mut taken = vec![false; files.len()];
    let mut capped = vec![false; files.len()];

    for definition in registry.iter().filter(|t| !t.accepts.is_empty()) {
        let mut batch = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if taken[i] || !definition.accepts_mime(&file.mime) {
                continue;
            }
            if definition.max_files.is_some_and(|max| batch.len() >= max) {
                capped[i] = true;
                continue;
            }
            taken[i] = true;
            batch.push(file.clone());
        }
        if !batch.is_empty() {
            batches.push(FileBatch {
                type_name: definition.name.clone(),
                files: batch,
            });
        }
    }

    let rejections: Vec<FileRejection> = files
        .iter()
        .enumerate()
        .filter(|(i, _)| !taken[*i])
        .map(|(i, file)| FileRejection {
            name: file.name.clone(),
            reason: if capped[i] {
                RejectionReason::TooMany
            } else {
                RejectionReason::WrongType
            },
        })
        .collect();

    if !rejections.is_empty() {
        tracing::warn!("{} dropped file(s) rejected", rejections.len());
    }

    (batches, rejections)
}

/// Uploads accepted files and returns their records and the rejections.
///
/// Fails only when nothing at all was accepted.
pub async fn ingest_files(
    files: &[DroppedFile],
    registry: &ContentTypeRegistry,
    upload: &dyn UploadPipeline,
) -> CoreResult<(Vec<ContentRecord>, Vec<FileRejection>)> {
    let (batches, rejections) = files_result(files, registry);

    let mut records = Vec::new();
    for batch in batches {
        match upload.upload(&batch.type_name, batch.files).await {
            Ok(datas) => records.extend(
                datas
                    .into_iter()
                    .map(|data| ContentRecord::new(batch.type_name.clone(), data)),
            ),
            Err(e) => tracing::debug!("Upload for {} rejected: {}", batch.type_name, e),
        }
    }

    if records.is_empty() {
        return Err(CoreError::FilesNotAccepted(rejections));
    }
    Ok((records, rejections))
}

// ==================== HTML ====================

/// Splits HTML on `<img>`, `<video></video>` and `<iframe></iframe>` tags,
/// keeping the tags as their own segments. Blank segments are dropped.
pub fn segment_html(html: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut last = 0;
    for found in SEGMENT.find_iter(html) {
        segments.push(&html[last..found.start()]);
        segments.push(found.as_str());
        last = found.end();
    }
    segments.push(&html[last..]);

    segments.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Collapses whitespace and strips stray break and anchor tags from the
/// ends of a text segment.
pub fn sanitize_text(content: &str) -> String {
    const TRIM_BOTH: [&str; 4] = ["<br />", "<br>", "<br/>", "</a>"];
    const TRIM_START: [&str; 2] = ["</a>", "</p>"];
    const TRIM_END: [&str; 2] = ["<a>", "<p>"];

    let mut trimmed = WHITESPACE.replace_all(content, " ").trim().to_string();

    while let Some(tag) = TRIM_BOTH.iter().chain(&TRIM_START).find(|t| trimmed.starts_with(**t)) {
        trimmed = trimmed[tag.len()..].trim().to_string();
    }
    while let Some(tag) = TRIM_BOTH.iter().chain(&TRIM_END).find(|t| trimmed.ends_with(**t)) {
        trimmed = trimmed[..trimmed.len() - tag.len()].trim().to_string();
    }

    trimmed
}

/// Removes markup, dropping `<script>` and `<style>` with their content.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT.replace_all(html, "");
    let without_styles = STYLE.replace_all(&without_scripts, "");
    let text = ANY_TAG.replace_all(&without_styles, "");

    text.replace("&nbsp;", " ")
        .replace("&#8203;", "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Carries the text of one textual type over to another.
///
/// Html to text strips the markup; every other direction copies the source
/// unchanged. Returns `None` when either side is not textual or the target
/// has no `src` field.
pub fn convert_text(
    from: &ContentTypeDefinition,
    to: &ContentTypeDefinition,
    data: &ContentData,
) -> Option<ContentData> {
    if !from.kind.is_textual() || !to.kind.is_textual() || !to.defaults.contains_key("src") {
        return None;
    }

    let source = data.get("src").and_then(Value::as_str)?;
    let converted = match (from.kind, to.kind) {
        (ContentKind::Html, ContentKind::Text) => strip_tags(source),
        _ => source.to_string(),
    };

    let mut out = ContentData::new();
    out.insert("src".into(), Value::from(converted));
    Some(out)
}

/// An opening tag and its attributes.
#[derive(Debug, Clone, PartialEq)]
struct Tag {
    name: String,
    attributes: HashMap<String, String>,
}

impl Tag {
    fn parse(segment: &str) -> Option<Self> {
        let captures = TAG.captures(segment)?;
        let name = captures.get(1)?.as_str().to_lowercase();
        let attributes = ATTRIBUTE
            .captures_iter(captures.get(2).map_or("", |m| m.as_str()))
            .filter_map(|c| {
                let key = c.get(1)?.as_str().to_lowercase();
                let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?.as_str();
                Some((key, value.to_string()))
            })
            .collect();
        Some(Self { name, attributes })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn style(&self, key: &str) -> Option<&str> {
        self.attribute("style")?.split(';').find_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            (name.trim().eq_ignore_ascii_case(key)).then(|| value.trim())
        })
    }

    /// Pixel size from the width/height attributes, else the inline style.
    /// Percentages count as unknown.
    fn pixel_size(&self) -> Option<Dimensions> {
        let from = |width: Option<&str>, height: Option<&str>| {
            let width = pixel_value(width?)?;
            let height = pixel_value(height?)?;
            Some(Dimensions::new(width, height))
        };
        from(self.attribute("width"), self.attribute("height"))
            .or_else(|| from(self.style("width"), self.style("height")))
    }
}

/// Leading integer of a CSS or attribute length, like `parseInt`.
fn pixel_value(value: &str) -> Option<f64> {
    if value.contains('%') {
        return None;
    }
    let digits: String = value.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Turns HTML into content records, one per non-blank segment.
pub struct HtmlIngestor<'a> {
    registry: &'a ContentTypeRegistry,
    probe: &'a dyn MediaProbe,
    resolver: &'a dyn EmbedResolver,
}

impl<'a> HtmlIngestor<'a> {
    pub fn new(registry: &'a ContentTypeRegistry, probe: &'a dyn MediaProbe, resolver: &'a dyn EmbedResolver) -> Self {
        Self {
            registry,
            probe,
            resolver,
        }
    }

    /// Records for every segment that produced content, in document order.
    pub async fn records(&self, html: &str) -> Vec<ContentRecord> {
        let mut records = Vec::new();
        for segment in segment_html(html) {
            if let Some(record) = self.segment(segment).await {
                records.push(record);
            }
        }
        records
    }

    async fn segment(&self, segment: &str) -> Option<ContentRecord> {
        let trimmed = segment.trim_start().to_lowercase();
        let attempt = if trimmed.starts_with("<img") || trimmed.starts_with("<video") {
            self.media(segment).await
        } else {
            self.embed(segment).await
        };

        attempt.or_else(|| self.text(segment))
    }

    async fn media(&self, segment: &str) -> Option<ContentRecord> {
        let Some(definition) = self.registry.first_of_kind(ContentKind::Media) else {
            tracing::debug!("No media type registered");
            return None;
        };

        let tag = Tag::parse(segment)?;
        let src = tag.attribute("src")?.to_string();
        let key = definition.source_key();
        if !definition.validate(key, &Value::from(src.as_str())) {
            tracing::debug!("Media source rejected: {}", src);
            return None;
        }

        let size = match tag.pixel_size() {
            Some(size) => Some(size),
            None => match self.probe.probe(&src).await {
                Ok(size) => Some(size),
                Err(e) => {
                    tracing::debug!("Media probe failed: {}", e);
                    None
                }
            },
        };

        // Unmeasured media keeps the type's default size until the renderer
        // resolves it.
        let mut data = definition.create();
        data.insert(key.into(), Value::from(src));
        match size.filter(|s| s.width > 0.0 && s.height > 0.0) {
            Some(size) => {
                data.insert("width".into(), number_value(size.width));
                data.insert("height".into(), number_value(size.height));
            }
            None => tracing::debug!("Media size pending for {}", definition.name),
        }
        Some(ContentRecord::new(definition.name.clone(), data))
    }

    async fn embed(&self, segment: &str) -> Option<ContentRecord> {
        let Some(definition) = self.registry.first_of_kind(ContentKind::Embed) else {
            tracing::debug!("No embed type registered");
            return None;
        };

        let iframe = Tag::parse(segment).filter(|t| t.name == "iframe");
        let src = match &iframe {
            Some(tag) => tag.attribute("src")?.to_string(),
            None => segment.trim().to_string(),
        };

        let key = definition.source_key();
        if !definition.validate(key, &Value::from(src.as_str())) {
            tracing::debug!("Not an embed: {}", src);
            return None;
        }

        let resolved = match self.resolver.resolve(&src).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Embed not resolved: {}", e);
                return None;
            }
        };

        let mut data = definition.create();
        data.insert(key.into(), Value::from(resolved));
        if let Some(tag) = &iframe {
            let size = tag.pixel_size().unwrap_or(EMBED_FALLBACK_SIZE);
            data.insert("width".into(), number_value(size.width));
            data.insert("height".into(), number_value(size.height));
        }
        Some(ContentRecord::new(definition.name.clone(), data))
    }

    fn text(&self, segment: &str) -> Option<ContentRecord> {
        let definition = self.registry.text_type()?;

        let trimmed = sanitize_text(segment);
        if trimmed.is_empty() {
            return None;
        }

        let mut chunk = ContentData::new();
        chunk.insert("src".into(), Value::from(trimmed));
        let data = definition.on_type_change(chunk);

        data.get("src")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
            .then(|| ContentRecord::new(definition.name.clone(), data))
    }
}

/// Converts a legacy HTML value into sections, one single-area section per
/// segment, using the first registered section type.
pub async fn parse_unknown(
    html: &str,
    context: &PlacementContext<'_>,
    probe: &dyn MediaProbe,
    resolver: &dyn EmbedResolver,
    narrow_view: bool,
) -> CoreResult<Vec<Section>> {
    if html.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records = HtmlIngestor::new(context.content_types, probe, resolver)
        .records(html)
        .await;
    let incoming: Vec<Incoming> = records.into_iter().map(Incoming::from).collect();

    let placement = place(&[], &[], incoming, context)?;
    Ok(gridedit_model::parse(placement.sections, narrow_view))
}

// ==================== Placement ====================

/// Registries and id source needed to place content.
#[derive(Clone, Copy)]
pub struct PlacementContext<'a> {
    pub ids: &'a IdGenerator,
    pub section_types: &'a SectionTypeRegistry,
    pub content_types: &'a ContentTypeRegistry,
    pub margin: f64,
}

/// Result of placing content.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// The full new value
    pub sections: Vec<Section>,
    /// Sections that received content, in placement order
    pub affected: Vec<SectionId>,
}

/// Empty target areas for incoming content, in placement order.
///
/// Active empty areas come first, then empty visible areas after the last
/// active position.
pub fn placement_targets(
    sections: &[Section],
    active: &[AreaId],
    section_types: &SectionTypeRegistry,
) -> Vec<AreaId> {
    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut targets = Vec::new();
    let mut position: Option<(u32, u32)> = None;

    for section in &ordered {
        let mut section_active: Vec<&Area> = section
            .areas
            .iter()
            .filter(|a| active.contains(&a.id))
            .collect();
        if section_active.is_empty() {
            continue;
        }
        section_active.sort_by_key(|a| a.order);

        let last_area = section_active.iter().map(|a| a.order).max().unwrap_or(0);
        position = Some((section.order, last_area));
        targets.extend(section_active.iter().filter(|a| a.is_empty()).map(|a| a.id));
    }

    for section in &ordered {
        let visible = match section_types.get(&section.type_name) {
            Some(definition) => section.visible_areas(definition),
            None => &section.areas[..],
        };

        let mut after: Vec<&Area> = visible
            .iter()
            .filter(|a| a.is_empty())
            .filter(|a| match position {
                None => true,
                Some((section_order, area_order)) => {
                    section.order > section_order || (section.order == section_order && a.order > area_order)
                }
            })
            .collect();
        after.sort_by_key(|a| a.order);
        targets.extend(after.iter().map(|a| a.id));
    }

    targets
}

/// Routes incoming content into the layout.
///
/// Fills the [`placement_targets`] first; whatever remains becomes new
/// sections of the first registered type, appended after the highest order
/// and fitted to their content.
pub fn place(
    sections: &[Section],
    active: &[AreaId],
    incoming: Vec<Incoming>,
    context: &PlacementContext<'_>,
) -> CoreResult<Placement> {
    let mut value = sections.to_vec();
    let mut affected = Vec::new();

    let targets = placement_targets(sections, active, context.section_types);
    let mut incoming = incoming.into_iter();

    for target_id in targets {
        let Some(item) = incoming.next() else {
            break;
        };

        let Some(section) = value.iter_mut().find(|s| s.area(target_id).is_some()) else {
            continue;
        };
        let Some(target) = section.area(target_id) else {
            continue;
        };

        let area = item.apply_to(context.content_types, target)?;
        *section = section.with_area(area).adjusted_to_areas();
        if !affected.contains(&section.id) {
            affected.push(section.id);
        }
    }

    let remaining: Vec<Incoming> = incoming.collect();
    if remaining.is_empty() {
        return Ok(Placement {
            sections: value,
            affected,
        });
    }

    let (type_name, definition) = context.section_types.first().ok_or(CoreError::NoSectionTypes)?;
    let mut next_order = value.iter().map(|s| s.order + 1).max().unwrap_or(0);

    for item in remaining {
        let blank = Area::create(context.ids, 100.0, 100.0, 0, definition.height, None);
        let area = item.apply_to(context.content_types, &blank)?;
        let section = Section::create(
            context.ids,
            type_name,
            definition,
            next_order,
            context.margin,
            vec![area],
        );
        affected.push(section.id);
        value.push(section);
        next_order += 1;
    }

    Ok(Placement {
        sections: value,
        affected,
    })
}
