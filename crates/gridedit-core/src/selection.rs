//! Active areas and click-outside deactivation.
//!
//! The host reports what a pointer hit as a [`HitTarget`]; the selection
//! decides which active areas survive a click. Deactivated areas then go
//! through [`check_empty`], which is where abandoned empty rows disappear.

use gridedit_model::{AreaId, Section, SectionId};

/// What a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// The floating toolbar
    Toolbar,
    /// Popups, dialogs and tooltips rendered outside the editor's tree
    Detached,
    /// The page around the editor
    Page,
    /// Editor chrome that belongs to no area
    EditorBackground,
    /// Content inside an area
    Area(AreaId),
    /// The bare surface of an area, not its content
    AreaSurface(AreaId),
    /// An input or button inside an area
    AreaControl(AreaId),
    /// The control strip of a section
    SectionControls(SectionId),
}

impl HitTarget {
    /// The area the target belongs to.
    pub fn area(&self) -> Option<AreaId> {
        match self {
            HitTarget::Area(id) | HitTarget::AreaSurface(id) | HitTarget::AreaControl(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true for targets inside the editor.
    pub fn is_in_editor(&self) -> bool {
        !matches!(self, HitTarget::Toolbar | HitTarget::Detached | HitTarget::Page)
    }
}

/// Pointer precision reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerKind {
    /// Mouse or pen
    #[default]
    Fine,
    /// Touch
    Coarse,
}

/// The set of active areas.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    active: Vec<AreaId>,
    down_target: Option<HitTarget>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[AreaId] {
        &self.active
    }

    pub fn is_active(&self, id: AreaId) -> bool {
        self.active.contains(&id)
    }

    /// Replaces the active set. Returns true when it changed.
    pub fn set_active(&mut self, ids: Vec<AreaId>) -> bool {
        let same = ids.len() == self.active.len() && ids.iter().all(|id| self.active.contains(id));
        if same {
            return false;
        }
        self.active = ids;
        true
    }

    /// Makes `id` the sole active area and returns the areas that lost
    /// activity.
    pub fn activate(&mut self, id: AreaId) -> Vec<AreaId> {
        let was_active: Vec<AreaId> = self.active.iter().copied().filter(|a| *a != id).collect();
        self.set_active(vec![id]);
        was_active
    }

    /// Removes `id` from the active set. Returns true when it was active.
    pub fn deactivate(&mut self, id: AreaId) -> bool {
        let before = self.active.len();
        self.active.retain(|a| *a != id);
        self.active.len() != before
    }

    /// Keeps only the active areas matching `keep`.
    pub fn retain(&mut self, keep: impl Fn(AreaId) -> bool) -> bool {
        let before = self.active.len();
        self.active.retain(|a| keep(*a));
        self.active.len() != before
    }

    /// Remembers where the current click started.
    pub fn pointer_down(&mut self, target: HitTarget) {
        self.down_target = Some(target);
    }

    /// Forgets the pointer-down target once a click was handled elsewhere.
    pub fn clear_pointer_down(&mut self) {
        self.down_target = None;
    }

    /// Handles a click that did not land on an area.
    ///
    /// Clicks on the toolbar or on detached popups keep everything. Inside
    /// the editor an area stays active when the click, or the pointer-down
    /// that started it, hit the area itself, or when the click hit its
    /// section's controls. A click on the page outside the editor
    /// deactivates everything. Returns the deactivated areas.
    pub fn click_outside(
        &mut self,
        target: HitTarget,
        section_of: impl Fn(AreaId) -> Option<SectionId>,
    ) -> Vec<AreaId> {
        let down = self.down_target.take();

        if self.active.is_empty() || matches!(target, HitTarget::Toolbar | HitTarget::Detached) {
            return Vec::new();
        }

        let inside = target.is_in_editor() || down.is_some_and(|d| d.is_in_editor());

        let (kept, dropped): (Vec<AreaId>, Vec<AreaId>) = self.active.iter().partition(|&&id| {
            if !inside {
                return false;
            }
            if target.area() == Some(id) || down.and_then(|d| d.area()) == Some(id) {
                return true;
            }
            match (target, section_of(id)) {
                (HitTarget::SectionControls(clicked), Some(section)) => clicked == section,
                _ => false,
            }
        });

        self.active = kept;
        dropped
    }
}

/// Resets the given areas when they are empty and drops every section left
/// with a single empty area, renumbering what remains.
///
/// Returns `None` when none of the areas was empty, so callers can skip a
/// value change.
pub fn check_empty(sections: &[Section], area_ids: &[AreaId]) -> Option<Vec<Section>> {
    let mut updated = false;

    let kept: Vec<Section> = sections
        .iter()
        .map(|section| {
            let mut section = section.clone();
            for area in section.areas.iter_mut() {
                if area_ids.contains(&area.id) && area.is_empty() {
                    updated = true;
                    *area = area.reset(section.height);
                }
            }
            section
        })
        .filter(|section| !matches!(section.areas.as_slice(), [only] if only.is_empty()))
        .collect();

    if !updated {
        return None;
    }

    let dropped = sections.len() - kept.len();
    if dropped > 0 {
        tracing::debug!("Empty check dropped {} section(s)", dropped);
    }
    Some(gridedit_model::renumber(kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridedit_model::{Area, ContentRecord, ContentTypeRegistry, IdGenerator, SectionDefinition};

    fn text_area(ids: &IdGenerator) -> Area {
        let registry = ContentTypeRegistry::standard();
        let record = ContentRecord::new("text", registry.require("text").unwrap().create());
        Area::create(ids, 100.0, 100.0, 0, 55.0, Some(record))
    }

    #[test]
    fn test_activate_replaces_set() {
        let mut selection = Selection::new();
        assert!(selection.activate(AreaId(1)).is_empty());
        assert!(selection.set_active(vec![AreaId(1), AreaId(2)]));
        assert!(!selection.set_active(vec![AreaId(2), AreaId(1)]));

        let lost = selection.activate(AreaId(3));
        assert_eq!(lost, vec![AreaId(1), AreaId(2)]);
        assert_eq!(selection.active(), &[AreaId(3)]);
        assert!(selection.deactivate(AreaId(3)));
        assert!(!selection.deactivate(AreaId(3)));
    }

    #[test]
    fn test_click_outside_shelters() {
        let section_of = |id: AreaId| (id.0 < 10).then_some(SectionId(100));
        let mut selection = Selection::new();
        selection.set_active(vec![AreaId(1), AreaId(2), AreaId(11)]);

        assert!(selection.click_outside(HitTarget::Toolbar, section_of).is_empty());
        assert!(selection.click_outside(HitTarget::Detached, section_of).is_empty());

        // Section controls keep both areas of that section; the other goes.
        let dropped = selection.click_outside(HitTarget::SectionControls(SectionId(100)), section_of);
        assert_eq!(dropped, vec![AreaId(11)]);

        // The pointer went down on area 2 and was released elsewhere.
        selection.pointer_down(HitTarget::Area(AreaId(2)));
        let dropped = selection.click_outside(HitTarget::EditorBackground, section_of);
        assert_eq!(dropped, vec![AreaId(1)]);
        assert_eq!(selection.active(), &[AreaId(2)]);
    }

    #[test]
    fn test_click_on_page_deactivates_everything() {
        let mut selection = Selection::new();
        selection.set_active(vec![AreaId(1)]);
        let dropped = selection.click_outside(HitTarget::Page, |_| None);
        assert_eq!(dropped, vec![AreaId(1)]);
        assert!(selection.active().is_empty());
    }

    #[test]
    fn test_check_empty_drops_abandoned_row() {
        let ids = IdGenerator::new();
        let single = SectionDefinition::new(55.0, &[100.0]);
        let sections = vec![
            Section::create(&ids, "single", &single, 0, 1.0, vec![text_area(&ids)]),
            Section::create(&ids, "single", &single, 1, 1.0, vec![]),
            Section::create(&ids, "single", &single, 2, 1.0, vec![text_area(&ids)]),
        ];
        let empty = sections[1].areas[0].id;

        let result = check_empty(&sections, &[empty]).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, sections[0].id);
        assert_eq!(result[1].id, sections[2].id);
        assert_eq!(result[1].order, 1);
    }

    #[test]
    fn test_check_empty_keeps_partial_rows() {
        let ids = IdGenerator::new();
        let bunny = SectionDefinition::new(28.125, &[50.0, 50.0]);
        let sections = vec![Section::create(&ids, "bunny", &bunny, 0, 1.0, vec![])];
        let first = sections[0].areas[0].id;

        let result = check_empty(&sections, &[first]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].areas[0].id, first);

        // Nothing to reset, nothing to report.
        let filled = vec![Section::create(&ids, "single", &SectionDefinition::new(55.0, &[100.0]), 0, 1.0, vec![text_area(&ids)])];
        let filled_area = filled[0].areas[0].id;
        assert!(check_empty(&filled, &[filled_area]).is_none());
    }
}
