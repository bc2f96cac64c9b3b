//! Internal and external links.
//!
//! Internal links are allocated before their destination is known
//! (`add_link`), placed on pages, and pointed at a page and height later
//! (`set_link`). Destinations still unset at output are dropped.

use crate::error::{Error, Result};

/// Where a link goes.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// Internal link created by `add_link`
    Internal(usize),
    /// External URI
    Uri(String),
}

/// A link area on a page, rectangle in points.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    /// `[llx lly urx ury]`
    pub rect: [f64; 4],
    /// Destination
    pub target: LinkTarget,
}

/// Destination of an internal link. `page == 0` means not yet set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkDest {
    /// 1-based page
    pub page: usize,
    /// Points from the bottom of the page
    pub y: f64,
}

/// Internal link destinations, 1-based.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    dests: Vec<LinkDest>,
}

impl LinkTable {
    /// Allocate a new link with no destination yet.
    pub fn add(&mut self) -> usize {
        self.dests.push(LinkDest::default());
        self.dests.len()
    }

    /// Point a link at a page and height.
    pub fn set(&mut self, link: usize, dest: LinkDest) -> Result<()> {
        match link.checked_sub(1).and_then(|i| self.dests.get_mut(i)) {
            Some(slot) => {
                *slot = dest;
                Ok(())
            },
            None => Err(Error::Sequence(format!("link {} was never created", link))),
        }
    }

    /// Destination of a link, if it was set.
    pub fn get(&self, link: usize) -> Option<LinkDest> {
        link.checked_sub(1)
            .and_then(|i| self.dests.get(i))
            .copied()
            .filter(|d| d.page > 0)
    }

    /// True if `link` was allocated.
    pub fn contains(&self, link: usize) -> bool {
        link >= 1 && link <= self.dests.len()
    }

    /// Number of allocated links.
    pub fn len(&self) -> usize {
        self.dests.len()
    }

    /// True when no link was allocated.
    pub fn is_empty(&self) -> bool {
        self.dests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_lifecycle() {
        let mut links = LinkTable::default();
        let a = links.add();
        let b = links.add();
        assert_eq!((a, b), (1, 2));
        assert!(links.get(a).is_none());
        links.set(a, LinkDest { page: 3, y: 100.0 }).unwrap();
        assert_eq!(links.get(a), Some(LinkDest { page: 3, y: 100.0 }));
        assert!(links.get(b).is_none());
        assert!(matches!(links.set(9, LinkDest::default()), Err(Error::Sequence(_))));
        assert!(links.set(0, LinkDest::default()).is_err());
        assert!(!links.contains(0));
    }
}
