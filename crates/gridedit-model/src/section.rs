//! Sections: rows of areas shaped by a section type.
//!
//! ## Learning: Registries Validated Up Front
//!
//! A section refers to its type by name. Rather than checking the name on
//! every use, [`SectionTypeRegistry::register`] rejects malformed types once,
//! and lookups afterwards return `Option` so callers decide what a missing
//! type means for them.

use serde::{Deserialize, Serialize};

use crate::area::{Area, round_ratio};
use crate::content::ContentTypeRegistry;
use crate::id::{AreaId, IdGenerator, SectionId};
use crate::{Dimensions, ModelError, ModelResult};

/// Narrowest a section may be, in percent.
pub const SECTION_MIN_PERCENTAGE: f64 = 25.0;

/// Default slot of a section type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDefinition {
    /// Default width in percent
    pub width: f64,
}

/// Shape of a row: its default height and slot widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    /// Default width in percent (100 when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Default height in percent of the width
    pub height: f64,
    /// Slots, left to right
    pub areas: Vec<AreaDefinition>,
}

impl SectionDefinition {
    /// Creates a definition from slot widths.
    pub fn new(height: f64, widths: &[f64]) -> Self {
        Self {
            width: None,
            height,
            areas: widths.iter().map(|&width| AreaDefinition { width }).collect(),
        }
    }

    /// Number of slots.
    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Layout metadata of every slot.
    pub fn area_metas(&self) -> Vec<AreaMeta> {
        type_area_metas(self)
    }

    /// Metadata of the slot with the given order.
    pub fn area_meta(&self, order: u32) -> Option<AreaMeta> {
        self.area_metas().into_iter().find(|m| m.order == order)
    }
}

/// Slot layout metadata, derived from a [`SectionDefinition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaMeta {
    pub width: f64,
    pub height: f64,
    pub order: u32,
    pub column: u32,
    pub is_top: bool,
    pub is_bottom: bool,
    pub is_left: bool,
    pub is_right: bool,
}

/// Derives the slot metadata of a section type.
///
/// Every slot spans the full row height, so all of them touch both the top
/// and the bottom edge.
pub fn type_area_metas(definition: &SectionDefinition) -> Vec<AreaMeta> {
    let last = definition.areas.len().saturating_sub(1);
    definition
        .areas
        .iter()
        .enumerate()
        .map(|(i, slot)| AreaMeta {
            width: slot.width,
            height: 100.0,
            order: i as u32,
            column: i as u32 + 1,
            is_top: true,
            is_bottom: true,
            is_left: i == 0,
            is_right: i == last,
        })
        .collect()
}

/// A named section type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSectionType {
    pub name: String,
    #[serde(flatten)]
    pub definition: SectionDefinition,
}

/// Ordered section types. The first one is used for appended sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionTypeRegistry {
    types: Vec<NamedSectionType>,
}

impl SectionTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// One column, two columns and three columns.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (name, definition) in [
            ("single", SectionDefinition::new(55.0, &[100.0])),
            ("bunny", SectionDefinition::new(28.125, &[50.0, 50.0])),
            ("triple", SectionDefinition::new(25.0, &[33.333, 33.333, 33.334])),
        ] {
            // Names above are distinct and non-empty.
            let _ = registry.register(name, definition);
        }
        registry
    }

    /// Registers a type. Names must be unique and types need a slot.
    pub fn register(&mut self, name: impl Into<String>, definition: SectionDefinition) -> ModelResult<()> {
        let name = name.into();
        if definition.areas.is_empty() {
            return Err(ModelError::EmptySectionType(name));
        }
        if self.get(&name).is_some() {
            return Err(ModelError::DuplicateSectionType(name));
        }
        self.types.push(NamedSectionType { name, definition });
        Ok(())
    }

    /// Re-validates a registry built through deserialization.
    pub fn validated(self) -> ModelResult<Self> {
        let mut registry = Self::new();
        for entry in self.types {
            registry.register(entry.name, entry.definition)?;
        }
        Ok(registry)
    }

    /// Looks a type up by name.
    pub fn get(&self, name: &str) -> Option<&SectionDefinition> {
        self.types
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.definition)
    }

    /// Looks a type up by name, failing with an invalid-configuration error.
    pub fn require(&self, name: &str) -> ModelResult<&SectionDefinition> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownSectionType(name.to_string()))
    }

    /// First registered type.
    pub fn first(&self) -> Option<(&str, &SectionDefinition)> {
        self.types
            .first()
            .map(|t| (t.name.as_str(), &t.definition))
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionDefinition)> {
        self.types.iter().map(|t| (t.name.as_str(), &t.definition))
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

/// Per-section data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionData {
    /// Spacing unit between areas and around the row
    #[serde(serialize_with = "crate::number::serialize")]
    pub margin: f64,
}

/// A row of areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique id
    pub id: SectionId,
    /// Dense rank among sibling sections
    pub order: u32,
    /// Section type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Width in percent
    #[serde(serialize_with = "crate::number::serialize")]
    pub width: f64,
    /// Height in percent of the width
    #[serde(serialize_with = "crate::number::serialize")]
    pub height: f64,
    /// Spacing
    pub data: SectionData,
    /// Areas, one per slot (extras are kept but not interactive)
    pub areas: Vec<Area>,
}

impl Section {
    /// Builds a section of `type_name`.
    ///
    /// Areas whose order matches a slot are re-created with the slot's
    /// default size, keeping their id and content. Areas without a slot are
    /// kept verbatim. Missing slots are padded with empty areas, and a single
    /// area holding sized media fits the section to it.
    pub fn create(
        ids: &IdGenerator,
        type_name: &str,
        definition: &SectionDefinition,
        order: u32,
        margin: f64,
        areas: Vec<Area>,
    ) -> Self {
        let mut section = Self {
            id: ids.section(),
            order,
            type_name: type_name.to_string(),
            width: definition.width.unwrap_or(100.0),
            height: if definition.height > 0.0 { definition.height } else { 100.0 },
            data: SectionData { margin },
            areas: Vec::with_capacity(definition.area_count()),
        };

        let metas = definition.area_metas();
        for area in areas {
            let rekeyed = match metas.iter().find(|m| m.order == area.order) {
                Some(meta) => area.resized(meta.width, meta.height, section.height),
                None => area,
            };
            section.areas.push(rekeyed);
        }

        section = section.with_areas_padded(ids, definition);

        if let Some(fit) = dimensions_fit_to_areas(&section.areas, section.data.margin) {
            if fit.width > 0.0 {
                section.width = fit.width;
            }
            if fit.height > 0.0 {
                section.height = fit.height;
            }
        }

        section.with_ratios()
    }

    /// Returns a copy with every area's ratios recomputed.
    pub fn with_ratios(&self) -> Self {
        Self {
            areas: self.areas.iter().map(|a| a.with_ratios(self.height)).collect(),
            ..self.clone()
        }
    }

    /// Re-fits a single-area section to its content's intrinsic size.
    ///
    /// Sections with several areas keep their size.
    pub fn adjusted_to_areas(&self) -> Self {
        let Some(fit) = dimensions_fit_to_areas(&self.areas, self.data.margin) else {
            return self.clone();
        };

        let mut section = self.clone();
        if fit.width > 0.0 {
            section.width = fit.width;
        }
        if fit.height > 0.0 {
            section.height = fit.height;
            section = section.with_ratios();
        }
        section
    }

    /// Resizes the section, keeping the width within
    /// `[SECTION_MIN_PERCENTAGE, 100]`.
    ///
    /// When the width had to be clamped the height is rescaled so the
    /// rendered height stays the same.
    pub fn set_dimensions(&self, Dimensions { width, height }: Dimensions) -> Self {
        let requested = width;
        let width = width.clamp(SECTION_MIN_PERCENTAGE, 100.0);

        let height = if requested != width {
            (height * (requested / width)).max(SECTION_MIN_PERCENTAGE)
        } else {
            height
        };

        Self {
            width,
            height,
            ..self.clone()
        }
        .with_ratios()
    }

    /// Appends empty areas for every slot order the section lacks.
    pub fn with_areas_padded(&self, ids: &IdGenerator, definition: &SectionDefinition) -> Self {
        let mut section = self.clone();
        for meta in definition.area_metas() {
            if !section.areas.iter().any(|a| a.order == meta.order) {
                section.areas.push(Area::create(
                    ids,
                    meta.width,
                    meta.height,
                    meta.order,
                    section.height,
                    None,
                ));
            }
        }
        section
    }

    /// Returns true when every visible area holds only auto-height content.
    pub fn has_auto_height_only(&self, definition: &SectionDefinition, registry: &ContentTypeRegistry) -> bool {
        if self.is_empty() {
            return false;
        }

        self.visible_areas(definition).iter().all(|area| {
            area.content
                .as_ref()
                .is_some_and(|c| registry.is_auto_height(&c.type_name))
        })
    }

    /// Returns true when no area holds content.
    pub fn is_empty(&self) -> bool {
        self.areas.iter().all(Area::is_empty)
    }

    /// Areas within the type's slot count.
    pub fn visible_areas(&self, definition: &SectionDefinition) -> &[Area] {
        let count = definition.area_count().min(self.areas.len());
        &self.areas[..count]
    }

    /// Finds an area by id.
    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == id)
    }

    /// Returns a copy with the area of the same id replaced.
    pub fn with_area(&self, area: Area) -> Self {
        Self {
            areas: self
                .areas
                .iter()
                .map(|a| if a.id == area.id { area.clone() } else { a.clone() })
                .collect(),
            ..self.clone()
        }
    }

    /// Returns a copy with a new order.
    pub fn with_order(&self, order: u32) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }

    /// Switches the section to another type, keeping its id and areas.
    pub fn with_type(&self, ids: &IdGenerator, type_name: &str, definition: &SectionDefinition) -> Self {
        Self {
            id: self.id,
            ..Self::create(
                ids,
                type_name,
                definition,
                self.order,
                self.data.margin,
                self.areas.clone(),
            )
        }
    }
}

/// Number of slots a type defines.
pub fn area_count(definition: &SectionDefinition) -> usize {
    definition.area_count()
}

/// Size a section should take to match its single area's content.
///
/// Width is the content width capped at 100, height the content aspect in
/// percent plus the margin. Returns `None` unless there is exactly one area
/// and its content declares a width.
pub fn dimensions_fit_to_areas(areas: &[Area], margin: f64) -> Option<Dimensions> {
    let [area] = areas else {
        return None;
    };

    let (width, height) = area.content_dimensions();
    let width = width?;

    let fit_height = match height {
        Some(height) => round_ratio(height / width * 100.0) + margin / 100.0,
        None => 0.0,
    };

    Some(Dimensions {
        width: width.min(100.0),
        height: fit_height,
    })
}
