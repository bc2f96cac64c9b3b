//! Compact `/W` width arrays for CID fonts.
//!
//! The used CIDs are scanned in ascending order and split into runs of
//! consecutive CIDs. Inside a run, a stretch of at least [`MIN_RANGE_RUN`]
//! equal widths becomes a `first last width` range; anything shorter is folded
//! into an explicit `first [w0 w1 ...]` list, extending the previous list when
//! the CIDs continue it.

use std::collections::BTreeMap;

use crate::object::Object;

/// Shortest equal-width stretch written as a range.
pub const MIN_RANGE_RUN: usize = 4;

/// One record of a `/W` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidthEntry {
    /// `first last width`
    Range {
        /// First CID
        first: u32,
        /// Last CID (inclusive)
        last: u32,
        /// Shared width
        width: u32,
    },
    /// `first [w0 w1 ...]`
    List {
        /// First CID
        first: u32,
        /// Widths of `first`, `first + 1`, ...
        widths: Vec<u32>,
    },
}

impl WidthEntry {
    /// First CID covered.
    pub fn first(&self) -> u32 {
        match self {
            WidthEntry::Range { first, .. } | WidthEntry::List { first, .. } => *first,
        }
    }

    /// Last CID covered.
    pub fn last(&self) -> u32 {
        match self {
            WidthEntry::Range { last, .. } => *last,
            WidthEntry::List { first, widths } => first + widths.len() as u32 - 1,
        }
    }
}

/// Coalesce `(cid, width)` pairs into `/W` records.
///
/// Pairs may arrive in any order; duplicates keep the last width.
pub fn coalesce_widths(pairs: impl IntoIterator<Item = (u32, u32)>) -> Vec<WidthEntry> {
    let sorted: Vec<(u32, u32)> = pairs.into_iter().collect::<BTreeMap<_, _>>().into_iter().collect();
    let mut out: Vec<WidthEntry> = Vec::new();

    let mut i = 0;
    while i < sorted.len() {
        let (first, width) = sorted[i];
        let mut j = i + 1;
        while j < sorted.len() && sorted[j].0 == sorted[j - 1].0 + 1 && sorted[j].1 == width {
            j += 1;
        }

        if j - i >= MIN_RANGE_RUN {
            out.push(WidthEntry::Range {
                first,
                last: sorted[j - 1].0,
                width,
            });
        } else {
            let stretch = sorted[i..j].iter().map(|(_, w)| *w);
            match out.last_mut() {
                Some(WidthEntry::List {
                    first: list_first,
                    widths,
                }) if *list_first + widths.len() as u32 == first => widths.extend(stretch),
                _ => out.push(WidthEntry::List {
                    first,
                    widths: stretch.collect(),
                }),
            }
        }
        i = j;
    }
    out
}

/// Expand records back into a CID to width map.
pub fn decode_widths(entries: &[WidthEntry]) -> BTreeMap<u32, u32> {
    let mut map = BTreeMap::new();
    for entry in entries {
        match entry {
            WidthEntry::Range { first, last, width } => {
                for cid in *first..=*last {
                    map.insert(cid, *width);
                }
            },
            WidthEntry::List { first, widths } => {
                for (k, w) in widths.iter().enumerate() {
                    map.insert(first + k as u32, *w);
                }
            },
        }
    }
    map
}

/// Flatten records into the `/W` array object.
pub fn widths_to_object(entries: &[WidthEntry]) -> Object {
    let mut items = Vec::with_capacity(entries.len() * 3);
    for entry in entries {
        match entry {
            WidthEntry::Range { first, last, width } => {
                items.push(Object::from(*first));
                items.push(Object::from(*last));
                items.push(Object::from(*width));
            },
            WidthEntry::List { first, widths } => {
                items.push(Object::from(*first));
                items.push(Object::Array(widths.iter().map(|w| Object::from(*w)).collect()));
            },
        }
    }
    Object::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_run_becomes_range() {
        let entries = coalesce_widths((65..=70).map(|c| (c, 600)));
        assert_eq!(
            entries,
            vec![WidthEntry::Range {
                first: 65,
                last: 70,
                width: 600
            }]
        );
    }

    #[test]
    fn test_varying_run_becomes_list() {
        let entries = coalesce_widths(vec![(65, 667), (66, 667), (67, 722)]);
        assert_eq!(
            entries,
            vec![WidthEntry::List {
                first: 65,
                widths: vec![667, 667, 722]
            }]
        );
    }

    #[test]
    fn test_short_run_after_range_starts_list() {
        let pairs: Vec<(u32, u32)> = vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 9), (6, 8)];
        let entries = coalesce_widths(pairs);
        assert_eq!(
            entries,
            vec![
                WidthEntry::Range {
                    first: 1,
                    last: 4,
                    width: 5
                },
                WidthEntry::List {
                    first: 5,
                    widths: vec![9, 8]
                },
            ]
        );
    }

    #[test]
    fn test_width_change_inside_long_run_splits_range() {
        let mut pairs: Vec<(u32, u32)> = (10..15).map(|c| (c, 500)).collect();
        pairs.extend((15..20).map(|c| (c, 250)));
        let entries = coalesce_widths(pairs);
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[1], WidthEntry::Range { first: 15, last: 19, width: 250 }));
    }

    #[test]
    fn test_gap_splits_lists() {
        let entries = coalesce_widths(vec![(32, 278), (40, 333)]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].last(), 32);
        assert_eq!(entries[1].first(), 40);
    }

    #[test]
    fn test_decode_round_trip() {
        let pairs: Vec<(u32, u32)> = vec![(1, 3), (2, 3), (3, 3), (4, 3), (5, 3), (6, 1), (9, 2), (10, 2)];
        let entries = coalesce_widths(pairs.clone());
        let decoded = decode_widths(&entries);
        assert_eq!(decoded, pairs.into_iter().collect::<BTreeMap<_, _>>());
    }

    #[test]
    fn test_object_layout() {
        let entries = vec![
            WidthEntry::Range {
                first: 1,
                last: 4,
                width: 5,
            },
            WidthEntry::List {
                first: 5,
                widths: vec![9],
            },
        ];
        let obj = widths_to_object(&entries);
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert_eq!(arr[3], Object::Integer(5));
        assert_eq!(arr[4], Object::Array(vec![Object::Integer(9)]));
    }

    #[test]
    fn test_empty() {
        assert!(coalesce_widths(Vec::<(u32, u32)>::new()).is_empty());
    }
}
