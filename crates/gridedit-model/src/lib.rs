//! # Gridedit Model
//!
//! The layout data model of the grid editor: sections (rows) made of areas
//! (cells), each area optionally holding one content record.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Values, Not Objects
//! - Every mutation returns a new `Section` or `Area`
//! - Callers swap the result into the editor's value and diff by id
//! - `Clone` plus struct update syntax keeps this short
//!
//! ### Registries
//! - Section types and content types are validated once on registration
//! - Lookups return `Option`, and `require` turns a miss into a `ModelError`
//!
//! ### Serde
//! - The value round-trips through JSON without losing unknown content keys
//! - `#[serde(with = ...)]` adapts the `contents` array to an `Option`

mod area;
mod content;
mod id;
mod number;
mod section;
mod value;

use serde::{Deserialize, Serialize};

pub use area::{Area, RATIO_ACCURACY, Ratios, calculate_ratios, is_empty};
pub use content::{
    ContentData, ContentHooks, ContentKind, ContentRecord, ContentTypeDefinition,
    ContentTypeRegistry, SourceHooks, TextHooks,
};
pub use id::{AreaId, IdGenerator, SectionId};
pub use number::number_value;
pub use section::{
    AreaDefinition, AreaMeta, NamedSectionType, SECTION_MIN_PERCENTAGE, Section, SectionData,
    SectionDefinition, SectionTypeRegistry, area_count, dimensions_fit_to_areas, type_area_metas,
};
pub use value::{
    MediaReference, collect_media, from_json_value, has_dense_order, is_unknown_value,
    is_value_empty, max_id, parse, renumber, to_json_value,
};

/// A width and a height: percentages for sections and areas, pixels for
/// intrinsic media sizes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    /// Creates a new size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    #[error("Content type {type_name} has no field {key}")]
    InvalidContentData { type_name: String, key: String },

    #[error("Area holds {found:?}, expected content type {expected}")]
    ContentTypeMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("Unknown section type: {0}")]
    UnknownSectionType(String),

    #[error("Content type {0} is registered twice")]
    DuplicateContentType(String),

    #[error("Section type {0} is registered twice")]
    DuplicateSectionType(String),

    #[error("Section type {0} defines no areas")]
    EmptySectionType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
