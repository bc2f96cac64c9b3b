//! Document outline (bookmarks) builder for PDF generation.
//!
//! Bookmarks are recorded as a flat list tagged with a nesting level, the
//! way callers add them while writing pages. [`Outlines::resolve`] turns that
//! list into the parent/sibling/child links of PDF 32000-1, 12.3.3.
//!
//! # Example
//!
//! ```ignore
//! use pdf_forge::writer::Outlines;
//!
//! let mut outlines = Outlines::default();
//! outlines.add("Chapter 1", 0, 1, 800.0)?;
//! outlines.add("Section 1.1", 1, 1, 600.0)?;
//! outlines.add("Chapter 2", 0, 2, 800.0)?;
//! ```

use crate::error::{Error, Result};
use crate::fonts::encoding::utf16be_with_bom;
use crate::object::{dict, Dict, Object, ObjectRef};

/// A bookmark as recorded while writing.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    /// Display title
    pub title: String,
    /// Nesting level, 0 for top-level entries
    pub level: usize,
    /// 1-based page number
    pub page: usize,
    /// Vertical destination in points from the bottom of the page
    pub y: f64,
}

/// Resolved tree links of one entry, as indices into the entry list.
/// `parent == None` means the outline root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlineLinks {
    /// Parent entry
    pub parent: Option<usize>,
    /// Previous sibling
    pub prev: Option<usize>,
    /// Next sibling
    pub next: Option<usize>,
    /// First child
    pub first: Option<usize>,
    /// Last child
    pub last: Option<usize>,
}

/// Flat, level-tagged bookmark list.
#[derive(Debug, Clone, Default)]
pub struct Outlines {
    entries: Vec<OutlineEntry>,
}

impl Outlines {
    /// Record a bookmark. A level may exceed the previous entry's level by
    /// at most one, and the first entry must be top-level.
    pub fn add(&mut self, title: impl Into<String>, level: usize, page: usize, y: f64) -> Result<()> {
        let max_level = self.entries.last().map(|e| e.level + 1).unwrap_or(0);
        if level > max_level {
            return Err(Error::InvalidConfig(format!(
                "bookmark level {} skips a level (at most {} allowed here)",
                level, max_level
            )));
        }
        self.entries.push(OutlineEntry {
            title: title.into(),
            level,
            page,
            y,
        });
        Ok(())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no bookmarks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the tree links from the level tags.
    pub fn resolve(&self) -> Vec<OutlineLinks> {
        let mut links = vec![OutlineLinks::default(); self.entries.len()];
        // most recent entry seen at each level
        let mut recent: Vec<usize> = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            recent.truncate(entry.level + 1);

            if entry.level > 0 {
                let parent = recent[entry.level - 1];
                links[i].parent = Some(parent);
                if links[parent].first.is_none() {
                    links[parent].first = Some(i);
                }
                links[parent].last = Some(i);
            }

            if let Some(&prev) = recent.get(entry.level) {
                links[prev].next = Some(i);
                links[i].prev = Some(prev);
                recent[entry.level] = i;
            } else {
                recent.push(i);
            }
        }
        links
    }

    /// Build the entry dictionaries and the outline root. Entries take ids
    /// `first_id..first_id + len`, the root takes the id right after them.
    /// `page_ref` maps a 1-based page number to its page object.
    pub fn build(&self, first_id: u32, page_ref: impl Fn(usize) -> ObjectRef) -> (Vec<Dict>, Dict) {
        let links = self.resolve();
        let root_id = first_id + self.entries.len() as u32;
        let id_of = |i: usize| Object::Reference(ObjectRef::new(first_id + i as u32, 0));

        let items = self
            .entries
            .iter()
            .zip(&links)
            .map(|(entry, link)| {
                let mut d = dict([
                    ("Title", Object::String(utf16be_with_bom(&entry.title))),
                    (
                        "Parent",
                        link.parent
                            .map(id_of)
                            .unwrap_or(Object::Reference(ObjectRef::new(root_id, 0))),
                    ),
                ]);
                for (key, target) in [
                    ("Prev", link.prev),
                    ("Next", link.next),
                    ("First", link.first),
                    ("Last", link.last),
                ] {
                    if let Some(t) = target {
                        d.insert(key.to_string(), id_of(t));
                    }
                }
                d.insert(
                    "Dest".to_string(),
                    Object::Array(vec![
                        Object::Reference(page_ref(entry.page)),
                        Object::name("XYZ"),
                        Object::Integer(0),
                        Object::Real(entry.y),
                        Object::Null,
                    ]),
                );
                d.insert("Count".to_string(), Object::Integer(0));
                d
            })
            .collect();

        let mut root = dict([("Type", Object::name("Outlines"))]);
        let top_level: Vec<usize> = (0..self.entries.len())
            .filter(|i| links[*i].parent.is_none())
            .collect();
        if let (Some(first), Some(last)) = (top_level.first(), top_level.last()) {
            root.insert("First".to_string(), id_of(*first));
            root.insert("Last".to_string(), id_of(*last));
        }
        root.insert("Count".to_string(), Object::Integer(top_level.len() as i64));
        (items, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Outlines {
        let mut o = Outlines::default();
        o.add("Chapter 1", 0, 1, 800.0).unwrap();
        o.add("Section 1.1", 1, 1, 700.0).unwrap();
        o.add("Section 1.2", 1, 2, 600.0).unwrap();
        o.add("Detail", 2, 2, 500.0).unwrap();
        o.add("Chapter 2", 0, 3, 800.0).unwrap();
        o
    }

    #[test]
    fn test_resolve_links() {
        let links = sample().resolve();
        assert_eq!(links[0].parent, None);
        assert_eq!(links[0].first, Some(1));
        assert_eq!(links[0].last, Some(2));
        assert_eq!(links[0].next, Some(4));
        assert_eq!(links[1].next, Some(2));
        assert_eq!(links[2].prev, Some(1));
        assert_eq!(links[2].first, Some(3));
        assert_eq!(links[3].parent, Some(2));
        assert_eq!(links[3].next, None);
        assert_eq!(links[4].prev, Some(0));
        assert_eq!(links[4].first, None);
    }

    #[test]
    fn test_sibling_after_deeper_level() {
        let mut o = Outlines::default();
        o.add("A", 0, 1, 0.0).unwrap();
        o.add("A.1", 1, 1, 0.0).unwrap();
        o.add("A.1.a", 2, 1, 0.0).unwrap();
        o.add("B", 0, 1, 0.0).unwrap();
        o.add("B.1", 1, 1, 0.0).unwrap();
        let links = o.resolve();
        // B.1 must not chain to A.1
        assert_eq!(links[4].prev, None);
        assert_eq!(links[1].next, None);
        assert_eq!(links[4].parent, Some(3));
    }

    #[test]
    fn test_level_skip_rejected() {
        let mut o = Outlines::default();
        assert!(o.add("deep", 1, 1, 0.0).is_err());
        o.add("top", 0, 1, 0.0).unwrap();
        assert!(o.add("too deep", 2, 1, 0.0).is_err());
        assert_eq!(o.len(), 1);
    }

    #[test]
    fn test_build_objects() {
        let (items, root) = sample().build(20, |p| ObjectRef::new(2 + 2 * p as u32, 0));
        assert_eq!(items.len(), 5);
        assert_eq!(root.get("First"), Some(&Object::Reference(ObjectRef::new(20, 0))));
        assert_eq!(root.get("Last"), Some(&Object::Reference(ObjectRef::new(24, 0))));
        assert_eq!(root.get("Count"), Some(&Object::Integer(2)));
        assert_eq!(items[0].get("Parent"), Some(&Object::Reference(ObjectRef::new(25, 0))));
        assert_eq!(items[1].get("Parent"), Some(&Object::Reference(ObjectRef::new(20, 0))));

        let dest = items[2].get("Dest").and_then(Object::as_array).unwrap();
        assert_eq!(dest[0], Object::Reference(ObjectRef::new(6, 0)));
        assert_eq!(dest[1], Object::name("XYZ"));

        match items[0].get("Title") {
            Some(Object::String(bytes)) => assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0x00, b'C']),
            other => panic!("unexpected title {:?}", other),
        }
    }
}
