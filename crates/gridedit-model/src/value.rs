//! The ordered section value and its JSON interchange form.

use serde::Serialize;
use std::collections::HashSet;

use crate::content::ContentKind;
use crate::content::ContentTypeRegistry;
use crate::section::Section;
use crate::ModelResult;

/// Parses a stored value.
///
/// Any value starting with `[`, compact or pretty-printed, is treated as
/// JSON; anything else (legacy HTML, blank strings) yields an empty value.
/// Malformed JSON is an error.
pub fn from_json_value(value: &str) -> ModelResult<Vec<Section>> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    Ok(Vec::new())
}

/// Returns true for a non-empty stored value that is not a JSON section
/// array, i.e. legacy HTML that must go through ingestion first.
pub fn is_unknown_value(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.starts_with('[')
}

/// Serializes a value to its interchange form.
pub fn to_json_value(sections: &[Section]) -> ModelResult<String> {
    Ok(serde_json::to_string(sections)?)
}

/// Normalizes a loaded value: sorted by order, ratios recomputed, and
/// forced to full width on narrow views.
pub fn parse(mut sections: Vec<Section>, narrow_view: bool) -> Vec<Section> {
    sections.sort_by_key(|s| s.order);
    sections
        .into_iter()
        .map(|s| {
            let s = s.with_ratios();
            if narrow_view { Section { width: 100.0, ..s } } else { s }
        })
        .collect()
}

/// Sorts by order and renumbers densely from zero.
pub fn renumber(mut sections: Vec<Section>) -> Vec<Section> {
    sections.sort_by_key(|s| s.order);
    for (i, section) in sections.iter_mut().enumerate() {
        section.order = i as u32;
    }
    sections
}

/// Returns true when orders are exactly `0..len`.
pub fn has_dense_order(sections: &[Section]) -> bool {
    let mut orders: Vec<u32> = sections.iter().map(|s| s.order).collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, &o)| o == i as u32)
}

/// Largest section or area id in the value.
pub fn max_id(sections: &[Section]) -> Option<u64> {
    sections
        .iter()
        .flat_map(|s| std::iter::once(s.id.0).chain(s.areas.iter().map(|a| a.id.0)))
        .max()
}

/// Returns true when no section holds content.
pub fn is_value_empty(sections: &[Section]) -> bool {
    sections.iter().all(Section::is_empty)
}

/// A media reference found in a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub url: Option<String>,
    pub video_url: Option<String>,
    pub name: String,
}

/// Collects media and embed references, unique by url.
pub fn collect_media(sections: &[Section], registry: &ContentTypeRegistry) -> Vec<MediaReference> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();

    for area in sections.iter().flat_map(|s| s.areas.iter()) {
        let Some(record) = &area.content else {
            continue;
        };
        let is_media = registry
            .get(&record.type_name)
            .is_some_and(|t| matches!(t.kind, ContentKind::Media | ContentKind::Embed));
        if !is_media {
            continue;
        }

        let url = record
            .text("url")
            .or_else(|| record.text("src"))
            .map(str::to_string);
        if !seen.insert(url.clone()) {
            continue;
        }

        media.push(MediaReference {
            url,
            video_url: record.text("videoUrl").map(str::to_string),
            name: record.text("alt").unwrap_or_default().to_string(),
        });
    }

    media
}
