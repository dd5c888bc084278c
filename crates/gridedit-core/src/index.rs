//! Id lookups over the section value.
//!
//! Rebuilt from scratch after every change: values are small and a fresh
//! index can never disagree with the value it was built from.

use gridedit_model::{Area, AreaId, Section, SectionId};
use std::collections::HashMap;

/// Maps section and area ids to their position in a section slice.
#[derive(Debug, Clone, Default)]
pub struct LayoutIndex {
    sections: HashMap<SectionId, usize>,
    areas: HashMap<AreaId, (usize, usize)>,
}

impl LayoutIndex {
    /// Indexes `sections`.
    pub fn build(sections: &[Section]) -> Self {
        let mut index = Self::default();
        for (si, section) in sections.iter().enumerate() {
            index.sections.insert(section.id, si);
            for (ai, area) in section.areas.iter().enumerate() {
                index.areas.insert(area.id, (si, ai));
            }
        }
        index
    }

    /// Position of a section.
    pub fn section_position(&self, id: SectionId) -> Option<usize> {
        self.sections.get(&id).copied()
    }

    /// Section and area position of an area.
    pub fn area_position(&self, id: AreaId) -> Option<(usize, usize)> {
        self.areas.get(&id).copied()
    }

    /// Looks a section up in the slice the index was built from.
    pub fn section<'a>(&self, sections: &'a [Section], id: SectionId) -> Option<&'a Section> {
        sections.get(self.section_position(id)?)
    }

    /// Looks an area up in the slice the index was built from.
    pub fn area<'a>(&self, sections: &'a [Section], id: AreaId) -> Option<&'a Area> {
        let (si, ai) = self.area_position(id)?;
        sections.get(si)?.areas.get(ai)
    }

    /// Section holding an area.
    pub fn section_of<'a>(&self, sections: &'a [Section], id: AreaId) -> Option<&'a Section> {
        let (si, _) = self.area_position(id)?;
        sections.get(si)
    }

    pub fn contains_area(&self, id: AreaId) -> bool {
        self.areas.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridedit_model::{IdGenerator, SectionDefinition};

    #[test]
    fn test_lookup() {
        let ids = IdGenerator::new();
        let bunny = SectionDefinition::new(28.125, &[50.0, 50.0]);
        let sections = vec![
            Section::create(&ids, "bunny", &bunny, 0, 1.0, vec![]),
            Section::create(&ids, "bunny", &bunny, 1, 1.0, vec![]),
        ];
        let index = LayoutIndex::build(&sections);

        let target = sections[1].areas[1].id;
        assert_eq!(index.area_position(target), Some((1, 1)));
        assert_eq!(index.section_of(&sections, target).unwrap().id, sections[1].id);
        assert_eq!(index.area(&sections, target).unwrap().id, target);
        assert_eq!(index.section(&sections, sections[0].id).unwrap().order, 0);
        assert!(!index.contains_area(AreaId(999)));
        assert_eq!(index.len(), 2);
    }
}
