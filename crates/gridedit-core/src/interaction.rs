//! Resizing and swapping.
//!
//! ## Learning: Capture, Then Derive
//!
//! A resize gesture captures every start size once, in [`ResizeSession::begin`].
//! Each pointer move is then a pure function of those starts and the current
//! pointer position, so a dropped or reordered move event can never make the
//! sizes drift.

use gridedit_model::{
    AreaId, ContentTypeRegistry, Dimensions, Section, SectionDefinition, SectionId,
};

use crate::keymap::Key;

/// A pointer position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn offset(&self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }
}

/// Resize handles of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Top,
    Left,
    Right,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl Handle {
    pub fn is_bottom(&self) -> bool {
        matches!(self, Handle::Bottom | Handle::BottomLeft | Handle::BottomRight)
    }

    fn is_corner(&self) -> bool {
        matches!(self, Handle::BottomLeft | Handle::BottomRight)
    }

    /// +1 when dragging right grows the target, -1 when it shrinks it.
    fn horizontal_sign(&self) -> f64 {
        match self {
            Handle::Left | Handle::BottomLeft => -1.0,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Coupling {
    /// The handle moves the border shared with a sibling
    Sibling {
        sibling: AreaId,
        same_start: f64,
        opposite_start: f64,
    },
    /// The handle resizes the whole section
    Section { start: Dimensions },
}

/// Where a resize gesture took hold of an area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grip {
    pub area_id: AreaId,
    pub handle: Handle,
    /// Pointer position at pointer down
    pub start: Point,
    /// Rendered size of the section's content box in pixels
    pub rendered: Dimensions,
}

impl Grip {
    pub fn new(area_id: AreaId, handle: Handle, start: Point, rendered: Dimensions) -> Self {
        Self {
            area_id,
            handle,
            start,
            rendered,
        }
    }
}

/// One resize gesture, from pointer down to pointer up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    pub area_id: AreaId,
    pub section_id: SectionId,
    pub handle: Handle,
    start: Point,
    /// Rendered size of the section's content box in pixels
    rendered: Dimensions,
    coupling: Coupling,
    keyboard_offset: Point,
    min_area_size: f64,
}

impl ResizeSession {
    /// Starts a resize of `area_id` in `section`.
    ///
    /// Returns `None` for gestures that do nothing: the top handle, bottom
    /// handles on auto-height sections, unknown areas and sections that are
    /// not rendered yet.
    pub fn begin(
        section: &Section,
        definition: &SectionDefinition,
        registry: &ContentTypeRegistry,
        grip: Grip,
        min_area_size: f64,
    ) -> Option<Self> {
        let Grip {
            area_id,
            handle,
            start,
            rendered,
        } = grip;
        if handle == Handle::Top || rendered.width <= 0.0 || rendered.height <= 0.0 {
            return None;
        }
        if handle.is_bottom() && section.has_auto_height_only(definition, registry) {
            tracing::debug!("Section {} follows its content height", section.id);
            return None;
        }

        let area = section.area(area_id)?;
        let neighbour_order = match handle {
            Handle::Left => area.order.checked_sub(1),
            Handle::Right => Some(area.order + 1),
            _ => None,
        };
        let sibling = neighbour_order.and_then(|order| {
            section
                .visible_areas(definition)
                .iter()
                .find(|a| a.order == order)
        });

        let coupling = match sibling {
            Some(sibling) => Coupling::Sibling {
                sibling: sibling.id,
                same_start: area.width,
                opposite_start: sibling.width,
            },
            None => Coupling::Section {
                start: Dimensions::new(section.width, section.height),
            },
        };

        Some(Self {
            area_id,
            section_id: section.id,
            handle,
            start,
            rendered,
            coupling,
            keyboard_offset: Point::default(),
            min_area_size,
        })
    }

    /// Returns true when the handle moves a border between two areas.
    pub fn is_coupled(&self) -> bool {
        matches!(self.coupling, Coupling::Sibling { .. })
    }

    /// Applies the pointer at `point` to the section as it was at the start.
    pub fn apply(&self, section: &Section, point: Point) -> Section {
        let dx = (point.x - self.start.x) / self.rendered.width * 100.0;
        let dy = (point.y - self.start.y) / self.rendered.height * 100.0;

        match self.coupling {
            Coupling::Sibling {
                sibling,
                same_start,
                opposite_start,
            } => {
                let size = same_start + opposite_start;
                let min = self.min_area_size;
                if size < min * 2.0 {
                    return section.clone();
                }

                let delta = dx * self.handle.horizontal_sign();
                let same = (same_start + delta).clamp(min, size - min);
                let opposite = (opposite_start - delta).clamp(min, size - min);

                let mut resized = section.clone();
                for area in resized.areas.iter_mut() {
                    if area.id == self.area_id {
                        *area = area.resized(same, area.height, section.height);
                    } else if area.id == sibling {
                        *area = area.resized(opposite, area.height, section.height);
                    }
                }
                resized
            }
            Coupling::Section { start } => {
                let size = match self.handle {
                    Handle::Bottom => Dimensions::new(start.width, start.height + start.height * dy / 100.0),
                    handle => {
                        let width = start.width + start.width * dx * handle.horizontal_sign() * 2.0 / 100.0;
                        let height = if handle.is_corner() || width <= 0.0 {
                            start.height
                        } else {
                            start.height / (width / start.width)
                        };
                        Dimensions::new(width, height)
                    }
                };
                section.set_dimensions(size)
            }
        }
    }

    /// Pointer position for a keyboard step from the gesture start.
    ///
    /// Arrow keys move the handle by `step` pixels; other keys return
    /// `None`.
    pub fn key_step(&mut self, key: Key, step: f64) -> Option<Point> {
        let by = match key {
            Key::Left => Point::new(-step, 0.0),
            Key::Right => Point::new(step, 0.0),
            Key::Up => Point::new(0.0, -step),
            Key::Down => Point::new(0.0, step),
            _ => return None,
        };
        self.keyboard_offset = self.keyboard_offset.offset(by);
        Some(self.start.offset(self.keyboard_offset))
    }
}

/// Swaps the content of two areas, anywhere in the value.
///
/// Only the content records move; ids and sizes stay. Single-area sections
/// are re-fitted to their new content. Returns `None` when either area is
/// missing or both ids are the same.
pub fn swap_contents(sections: &[Section], first: AreaId, second: AreaId) -> Option<Vec<Section>> {
    if first == second {
        return None;
    }

    let find = |id: AreaId| {
        sections
            .iter()
            .find_map(|s| s.area(id))
            .map(|a| a.content.clone())
    };
    let first_content = find(first)?;
    let second_content = find(second)?;

    Some(
        sections
            .iter()
            .map(|section| {
                if section.area(first).is_none() && section.area(second).is_none() {
                    return section.clone();
                }
                let mut swapped = section.clone();
                for area in swapped.areas.iter_mut() {
                    if area.id == first {
                        *area = area.with_content(second_content.clone());
                    } else if area.id == second {
                        *area = area.with_content(first_content.clone());
                    }
                }
                swapped.adjusted_to_areas()
            })
            .collect(),
    )
}
