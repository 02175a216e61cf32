//! User-defined sections grouping visualizations, optionally pinned to a
//! report other than the main one.

use serde::{Deserialize, Serialize};

use logdash_shared::constants::DEFAULT_SECTION_TITLE;
use logdash_shared::{Guid, ReportCode};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: Guid,
    pub title: String,
    #[serde(default)]
    pub index: usize,
    /// `None` shows the main report.
    #[serde(default)]
    pub code: Option<ReportCode>,
}

fn reindex(sections: &mut [Section]) {
    for (index, section) in sections.iter_mut().enumerate() {
        section.index = index;
    }
}

fn find_mut(sections: &mut [Section], id: Guid) -> Result<&mut Section> {
    sections
        .iter_mut()
        .find(|section| section.id == id)
        .ok_or(ClientError::UnknownSection(id))
}

pub fn create(sections: &mut Vec<Section>) -> Guid {
    let section = Section {
        id: Guid::new(),
        title: DEFAULT_SECTION_TITLE.to_string(),
        index: sections.len(),
        code: None,
    };
    let id = section.id;
    sections.push(section);
    id
}

pub fn delete(sections: &mut Vec<Section>, id: Guid) -> Result<Section> {
    let pos = sections
        .iter()
        .position(|section| section.id == id)
        .ok_or(ClientError::UnknownSection(id))?;
    let removed = sections.remove(pos);
    reindex(sections);
    Ok(removed)
}

pub fn set_title(sections: &mut [Section], id: Guid, title: impl Into<String>) -> Result<()> {
    find_mut(sections, id)?.title = title.into();
    Ok(())
}

pub fn set_code(sections: &mut [Section], id: Guid, code: Option<ReportCode>) -> Result<()> {
    find_mut(sections, id)?.code = code;
    Ok(())
}

/// Remove the section at `old_index` and insert it at `new_index`.
pub fn reorder(sections: &mut Vec<Section>, old_index: usize, new_index: usize) -> Result<()> {
    let len = sections.len();
    for index in [old_index, new_index] {
        if index >= len {
            return Err(ClientError::InvalidIndex { index, len });
        }
    }
    let section = sections.remove(old_index);
    sections.insert(new_index, section);
    reindex(sections);
    Ok(())
}

/// Sort by stored index and renumber, for sections loaded from disk.
pub fn normalize(sections: &mut [Section]) {
    sections.sort_by_key(|section| section.index);
    reindex(sections);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_delete() {
        let mut sections = Vec::new();
        let a = create(&mut sections);
        let b = create(&mut sections);
        assert_eq!(sections[0].title, "Untitled");
        assert_eq!(sections[1].index, 1);

        delete(&mut sections, a).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, b);
        assert_eq!(sections[0].index, 0);
        assert!(delete(&mut sections, a).is_err());
    }

    #[test]
    fn test_setters() {
        let mut sections = Vec::new();
        let id = create(&mut sections);
        set_title(&mut sections, id, "Progression").unwrap();
        set_code(&mut sections, id, Some(ReportCode::new("XYZ").unwrap())).unwrap();
        assert_eq!(sections[0].title, "Progression");
        assert_eq!(sections[0].code.as_ref().unwrap().as_str(), "XYZ");
        assert!(set_title(&mut sections, Guid::new(), "x").is_err());
    }

    #[test]
    fn test_reorder() {
        let mut sections = Vec::new();
        let ids: Vec<Guid> = (0..3).map(|_| create(&mut sections)).collect();
        reorder(&mut sections, 2, 0).unwrap();
        let order: Vec<Guid> = sections.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
        assert!(sections.iter().enumerate().all(|(i, s)| s.index == i));
        assert!(reorder(&mut sections, 5, 0).is_err());
    }
}
