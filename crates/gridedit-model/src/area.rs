//! A single content cell of a section.
//!
//! ## Learning: Returning New Values
//!
//! Every operation here takes `&self` and returns a fresh `Area`. The editor
//! compares values by id after each change, so nothing is mutated in place
//! across a public call. Rust makes this cheap to express: `Clone` plus
//! struct update syntax (`Area { content, ..self.clone() }`).

use serde::{Deserialize, Serialize};

use crate::content::{ContentData, ContentRecord, ContentTypeRegistry};
use crate::id::{AreaId, IdGenerator};
use crate::{ModelError, ModelResult};

/// Decimal places kept on derived ratios.
pub const RATIO_ACCURACY: i32 = 5;

/// Derived width:height ratios of an area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ratios {
    /// Outer box ratio
    pub width_height_ratio: Option<f64>,
    /// Content box ratio
    pub width_height_ratio_content: Option<f64>,
}

/// Rounds to [`RATIO_ACCURACY`] decimal places.
pub(crate) fn round_ratio(value: f64) -> f64 {
    let factor = 10f64.powi(RATIO_ACCURACY);
    (value * factor).round() / factor
}

/// Computes the ratios of an area of `width` x `height` percent inside a
/// section of height `section_height`.
///
/// Returns empty ratios while the section height is unknown (zero).
pub fn calculate_ratios(width: f64, height: f64, section_height: f64) -> Ratios {
    if section_height == 0.0 || !section_height.is_finite() {
        return Ratios::default();
    }

    let outer_height = section_height * (height / 100.0);
    if outer_height == 0.0 {
        return Ratios::default();
    }

    // Content box equals the outer box while areas carry no inner padding.
    let content_height = outer_height;

    Ratios {
        width_height_ratio: Some(round_ratio(width / outer_height)),
        width_height_ratio_content: Some(round_ratio(width / content_height)),
    }
}

/// A content cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Unique id, stable across mutations
    pub id: AreaId,
    /// Slot index within the section type
    pub order: u32,
    /// Width in percent of the section
    #[serde(serialize_with = "crate::number::serialize")]
    pub width: f64,
    /// Height in percent of the section
    #[serde(serialize_with = "crate::number::serialize")]
    pub height: f64,
    /// Cached outer ratio
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::number::serialize_option"
    )]
    pub width_height_ratio: Option<f64>,
    /// Cached content ratio
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::number::serialize_option"
    )]
    pub width_height_ratio_content: Option<f64>,
    /// What the area holds, `None` when unoccupied
    #[serde(rename = "contents", with = "contents_array", default)]
    pub content: Option<ContentRecord>,
}

impl Area {
    /// Creates an area with a fresh id.
    pub fn create(
        ids: &IdGenerator,
        width: f64,
        height: f64,
        order: u32,
        section_height: f64,
        content: Option<ContentRecord>,
    ) -> Self {
        let area = Self {
            id: ids.area(),
            order,
            width,
            height,
            width_height_ratio: None,
            width_height_ratio_content: None,
            content,
        };
        area.with_ratios(section_height)
    }

    /// Returns a copy with ratios recomputed for `section_height`.
    pub fn with_ratios(&self, section_height: f64) -> Self {
        let ratios = calculate_ratios(self.width, self.height, section_height);
        Self {
            width_height_ratio: ratios.width_height_ratio,
            width_height_ratio_content: ratios.width_height_ratio_content,
            ..self.clone()
        }
    }

    /// Returns a copy resized and with ratios recomputed.
    pub fn resized(&self, width: f64, height: f64, section_height: f64) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
        .with_ratios(section_height)
    }

    /// Returns a copy with the given content and everything else kept.
    pub fn with_content(&self, content: Option<ContentRecord>) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }

    /// Returns the same slot, emptied.
    pub fn reset(&self, section_height: f64) -> Self {
        self.with_content(None).with_ratios(section_height)
    }

    /// Replaces the content with the blank record of `type_name`, then merges
    /// `data` over it through [`Area::set_content_value`].
    pub fn add_content_type(
        &self,
        registry: &ContentTypeRegistry,
        type_name: &str,
        data: Option<&ContentData>,
    ) -> ModelResult<Self> {
        let definition = registry.require(type_name)?;
        let fresh = self.with_content(Some(ContentRecord::new(type_name, definition.create())));

        match data {
            Some(data) => fresh.set_content_value(registry, type_name, data),
            None => Ok(fresh),
        }
    }

    /// Shallow-merges `data` into the current record of `type_name`.
    ///
    /// Every key must exist in the type's blank record. The area must
    /// already hold `type_name`: switching types goes through
    /// [`Area::add_content_type`].
    pub fn set_content_value(
        &self,
        registry: &ContentTypeRegistry,
        type_name: &str,
        data: &ContentData,
    ) -> ModelResult<Self> {
        let definition = registry.require(type_name)?;

        let current = self
            .content
            .as_ref()
            .filter(|c| c.type_name == type_name)
            .ok_or_else(|| ModelError::ContentTypeMismatch {
                expected: type_name.to_string(),
                found: self.content.as_ref().map(|c| c.type_name.clone()),
            })?;

        if let Some(key) = data.keys().find(|k| !definition.defaults.contains_key(*k)) {
            return Err(ModelError::InvalidContentData {
                type_name: type_name.to_string(),
                key: key.clone(),
            });
        }

        let mut merged = current.data.clone();
        for (key, value) in data {
            merged.insert(key.clone(), value.clone());
        }

        Ok(self.with_content(Some(ContentRecord::new(type_name, merged))))
    }

    /// Returns true when the area holds nothing.
    pub fn is_empty(&self) -> bool {
        is_empty(self.content.as_ref())
    }

    /// Names of the content types held.
    pub fn types(&self) -> Vec<&str> {
        self.content
            .iter()
            .map(|c| c.type_name.as_str())
            .collect()
    }

    /// Intrinsic pixel size of the content, when it declares one.
    pub fn content_dimensions(&self) -> (Option<f64>, Option<f64>) {
        match &self.content {
            Some(record) => (record.dimension("width"), record.dimension("height")),
            None => (None, None),
        }
    }
}

/// Returns true when there is no content record.
pub fn is_empty(content: Option<&ContentRecord>) -> bool {
    content.is_none()
}

/// Serializes `Option<ContentRecord>` as the zero or one element `contents`
/// array of the interchange format.
mod contents_array {
    use super::ContentRecord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S>(content: &Option<ContentRecord>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let records: &[ContentRecord] = match content {
            Some(record) => std::slice::from_ref(record),
            None => &[],
        };
        records.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<ContentRecord>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let records = Vec::<ContentRecord>::deserialize(deserializer)?;
        if records.len() > 1 {
            let dropped: Vec<&str> = records[1..].iter().map(|r| r.type_name.as_str()).collect();
            tracing::warn!(
                "Area holds {} content records, keeping the first and dropping {:?}",
                records.len(),
                dropped
            );
        }
        Ok(records.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: serde_json::Value) -> ContentData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_calculate_ratios() {
        let ratios = calculate_ratios(50.0, 100.0, 28.125);
        assert_eq!(ratios.width_height_ratio, Some(1.77778));
        assert_eq!(ratios.width_height_ratio_content, Some(1.77778));

        assert_eq!(calculate_ratios(50.0, 100.0, 0.0), Ratios::default());
    }

    #[test]
    fn test_ratios_are_pure() {
        let first = calculate_ratios(33.3, 80.0, 41.7);
        let second = calculate_ratios(33.3, 80.0, 41.7);
        assert_eq!(first, second);
    }

    #[test]
    fn test_create_stamps_fresh_ids() {
        let ids = IdGenerator::new();
        let a = Area::create(&ids, 50.0, 100.0, 0, 55.0, None);
        let b = Area::create(&ids, 50.0, 100.0, 1, 55.0, None);
        assert_ne!(a.id, b.id);
        assert!(a.is_empty());
        assert!(a.width_height_ratio.is_some());
    }

    #[test]
    fn test_add_content_type() {
        let ids = IdGenerator::new();
        let registry = ContentTypeRegistry::standard();
        let area = Area::create(&ids, 100.0, 100.0, 0, 55.0, None);

        let with_text = area
            .add_content_type(&registry, "text", Some(&data(json!({"src": "<p>Hi</p>"}))))
            .unwrap();
        assert_eq!(with_text.id, area.id);
        assert_eq!(with_text.types(), vec!["text"]);
        assert_eq!(with_text.content.as_ref().unwrap().text("src"), Some("<p>Hi</p>"));

        // Adding another type replaces the record entirely.
        let with_media = with_text.add_content_type(&registry, "media", None).unwrap();
        assert_eq!(with_media.types(), vec!["media"]);
    }

    #[test]
    fn test_add_unknown_type_fails() {
        let ids = IdGenerator::new();
        let area = Area::create(&ids, 100.0, 100.0, 0, 55.0, None);
        let err = area
            .add_content_type(&ContentTypeRegistry::standard(), "chart", None)
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownContentType(_)));
    }

    #[test]
    fn test_set_content_value_rejects_unknown_keys() {
        let ids = IdGenerator::new();
        let registry = ContentTypeRegistry::standard();
        let area = Area::create(&ids, 100.0, 100.0, 0, 55.0, None)
            .add_content_type(&registry, "text", None)
            .unwrap();
        let before = area.clone();

        let err = area
            .set_content_value(&registry, "text", &data(json!({"unknownKey": 1})))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidContentData { ref key, .. } if key == "unknownKey"));
        assert_eq!(area, before);
    }

    #[test]
    fn test_set_content_value_requires_same_type() {
        let ids = IdGenerator::new();
        let registry = ContentTypeRegistry::standard();
        let area = Area::create(&ids, 100.0, 100.0, 0, 55.0, None)
            .add_content_type(&registry, "text", None)
            .unwrap();

        let err = area
            .set_content_value(&registry, "media", &data(json!({"width": 10})))
            .unwrap_err();
        assert!(matches!(err, ModelError::ContentTypeMismatch { .. }));
    }

    #[test]
    fn test_set_content_value_merges() {
        let ids = IdGenerator::new();
        let registry = ContentTypeRegistry::standard();
        let area = Area::create(&ids, 100.0, 100.0, 0, 55.0, None)
            .add_content_type(&registry, "media", Some(&data(json!({"url": "a.png"}))))
            .unwrap()
            .set_content_value(&registry, "media", &data(json!({"width": 1920, "height": 1080})))
            .unwrap();

        let record = area.content.unwrap();
        assert_eq!(record.text("url"), Some("a.png"));
        assert_eq!(record.dimension("width"), Some(1920.0));
    }

    #[test]
    fn test_contents_serialize_as_array() {
        let ids = IdGenerator::new();
        let empty = Area::create(&ids, 100.0, 100.0, 0, 0.0, None);
        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["contents"], json!([]));
        assert_eq!(json["width"], json!(100));
        assert!(json.get("widthHeightRatio").is_none());

        let parsed: Area = serde_json::from_value(json!({
            "id": 9, "order": 0, "width": 100, "height": 100,
            "contents": [{"type": "text", "data": {"src": "a"}}, {"type": "media", "data": {}}]
        }))
        .unwrap();
        assert_eq!(parsed.id, AreaId(9));
        assert_eq!(parsed.types(), vec!["text"]);
    }
}
