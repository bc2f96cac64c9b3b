//! TrueType subsetting for CIDFontType2 embedding.
//!
//! UTF-8 fonts are written with Identity-H, so a CID is the Unicode code
//! point itself. The subsetter keeps only the glyphs reachable from the used
//! code points, renumbers them densely and rebuilds the tables a PDF viewer
//! needs. The `/CIDToGIDMap` stream then maps each CID to its new glyph.
//!
//! Glyph order in the subset:
//! - 0 is always `.notdef`
//! - glyphs of the used code points follow in code point order
//! - components of composite glyphs are appended as they are discovered

use std::collections::{BTreeMap, BTreeSet, HashMap};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use sha2::{Digest, Sha256};

use super::cmap::identity_to_unicode_cmap;
use super::cursor::BinaryCursor;
use super::truetype_parser::TrueTypeFont;
use super::width_ranges::{coalesce_widths, WidthEntry};
use crate::error::{Error, Result};
use crate::utils::compress_data;

/// Entries in the CIDToGIDMap: one per BMP code point.
pub const CID_TO_GID_ENTRIES: usize = 256 * 256;

/// Value stored so that the whole-file checksum becomes this constant.
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Tables copied verbatim when present.
const PASSTHROUGH_TABLES: [&[u8; 4]; 5] = [b"name", b"cvt ", b"fpgm", b"prep", b"OS/2"];

/// Length of a format 3.0 `post` table.
const POST_V3_LEN: usize = 32;

/// Output of [`FontSubsetBuilder::build`].
#[derive(Debug, Clone)]
pub struct FontSubset {
    /// `ABCDEF+PostScriptName`
    pub base_font: String,
    /// Uncompressed subset program
    pub program: Vec<u8>,
    /// Zlib-compressed subset program (`/FontFile2`)
    pub compressed_program: Vec<u8>,
    /// Zlib-compressed CIDToGIDMap
    pub compressed_cid_to_gid: Vec<u8>,
    /// CID (code point) to new glyph index
    pub cid_to_gid: BTreeMap<u32, u16>,
    /// Old glyph index of every new glyph, indexed by new glyph index
    pub glyph_order: Vec<u16>,
    /// `/W` records
    pub widths: Vec<WidthEntry>,
    /// ToUnicode CMap program
    pub to_unicode: Vec<u8>,
}

impl FontSubset {
    /// Value of `/Length1`: the uncompressed program size.
    pub fn length1(&self) -> usize {
        self.program.len()
    }

    /// Number of glyphs in the subset, `.notdef` included.
    pub fn glyph_count(&self) -> usize {
        self.glyph_order.len()
    }
}

/// Builds a subset program from a parsed font and the code points in use.
pub struct FontSubsetBuilder<'a> {
    font: &'a TrueTypeFont,
    used: BTreeSet<u32>,
}

impl<'a> FontSubsetBuilder<'a> {
    /// Create a builder. Code point 0 is dropped from the set.
    pub fn new(font: &'a TrueTypeFont, used: impl IntoIterator<Item = u32>) -> Self {
        let mut used: BTreeSet<u32> = used.into_iter().collect();
        used.remove(&0);
        Self { font, used }
    }

    /// Code points the subset is built from.
    pub fn used(&self) -> &BTreeSet<u32> {
        &self.used
    }

    /// Six-letter tag prefixed to the subset's PostScript name.
    ///
    /// Derived from the font name and used set so that identical subsets get
    /// identical tags.
    pub fn subset_tag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.font.metrics.postscript_name.as_bytes());
        for cp in &self.used {
            hasher.update(cp.to_be_bytes());
        }
        hash_to_tag(&hasher.finalize())
    }

    /// Run the subsetter.
    pub fn build(&self) -> Result<FontSubset> {
        let metrics = &self.font.metrics;

        let mut glyph_order: Vec<u16> = vec![0];
        let mut remap: HashMap<u16, u16> = HashMap::from([(0, 0)]);
        let mut cid_to_gid = BTreeMap::new();

        for &cp in &self.used {
            let Some(old) = metrics.glyph_index(cp) else {
                log::debug!("U+{:04X} has no glyph in '{}', skipped", cp, metrics.postscript_name);
                continue;
            };
            if cp > 0xFFFF {
                log::warn!(
                    "U+{:X} lies outside the two-byte CID range and cannot be embedded",
                    cp
                );
                continue;
            }
            let new = assign(&mut glyph_order, &mut remap, old)?;
            cid_to_gid.insert(cp, new);
        }

        // Composite closure. `glyph_order` grows while it is walked.
        let mut i = 0;
        while i < glyph_order.len() {
            let data = self.font.glyph_data(glyph_order[i])?;
            for component in composite_components(data)? {
                if component >= metrics.num_glyphs {
                    return Err(Error::InvalidFont(format!(
                        "composite glyph {} references missing glyph {}",
                        glyph_order[i], component
                    )));
                }
                assign(&mut glyph_order, &mut remap, component)?;
            }
            i += 1;
        }

        let program = self.build_program(&glyph_order, &remap, &cid_to_gid)?;

        let mut map = vec![0u8; CID_TO_GID_ENTRIES * 2];
        for (&cid, &gid) in &cid_to_gid {
            BigEndian::write_u16(&mut map[cid as usize * 2..], gid);
        }

        let widths = coalesce_widths(
            cid_to_gid
                .keys()
                .filter_map(|cp| metrics.glyph_index(*cp).map(|g| (*cp, metrics.glyph_width(g)))),
        );
        let to_unicode = identity_to_unicode_cmap(cid_to_gid.keys().copied());

        let compressed_program = compress_data(&program)?;
        let compressed_cid_to_gid = compress_data(&map)?;
        let base_font = format!("{}+{}", self.subset_tag(), metrics.postscript_name);

        log::debug!(
            "Subset '{}': {} code points, {} glyphs, {} -> {} bytes",
            base_font,
            cid_to_gid.len(),
            glyph_order.len(),
            self.font.data().len(),
            program.len()
        );

        Ok(FontSubset {
            base_font,
            program,
            compressed_program,
            compressed_cid_to_gid,
            cid_to_gid,
            glyph_order,
            widths,
            to_unicode,
        })
    }

    fn build_program(
        &self,
        glyph_order: &[u16],
        remap: &HashMap<u16, u16>,
        cid_to_gid: &BTreeMap<u32, u16>,
    ) -> Result<Vec<u8>> {
        let font = self.font;
        let count = glyph_order.len() as u16;

        let mut glyf = Vec::new();
        let mut loca = Vec::with_capacity((glyph_order.len() + 1) * 4);
        let mut hmtx = Vec::with_capacity(glyph_order.len() * 4);
        for &old in glyph_order {
            loca.write_u32::<BigEndian>(glyf.len() as u32)?;
            let mut data = font.glyph_data(old)?.to_vec();
            remap_components(&mut data, remap)?;
            glyf.extend_from_slice(&data);
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }

            let advance = font.metrics.advance_widths.get(old as usize).copied().unwrap_or(0);
            hmtx.write_u16::<BigEndian>(advance)?;
            hmtx.write_i16::<BigEndian>(font.left_side_bearing(old))?;
        }
        loca.write_u32::<BigEndian>(glyf.len() as u32)?;

        let mut head = required(font, b"head")?.to_vec();
        patch(&mut head, 8, &[0, 0, 0, 0])?;
        patch(&mut head, 50, &1i16.to_be_bytes())?;

        let mut hhea = required(font, b"hhea")?.to_vec();
        patch(&mut hhea, 34, &count.to_be_bytes())?;

        let mut maxp = required(font, b"maxp")?.to_vec();
        patch(&mut maxp, 4, &count.to_be_bytes())?;

        let mut post = required(font, b"post")?.to_vec();
        post.resize(POST_V3_LEN, 0);
        patch(&mut post, 0, &0x0003_0000u32.to_be_bytes())?;

        let mut sfnt = SfntBuilder::new();
        sfnt.add_table(*b"head", head)
            .add_table(*b"hhea", hhea)
            .add_table(*b"maxp", maxp)
            .add_table(*b"hmtx", hmtx)
            .add_table(*b"loca", loca)
            .add_table(*b"glyf", glyf)
            .add_table(*b"cmap", build_cmap_format4(cid_to_gid)?)
            .add_table(*b"post", post);
        for tag in PASSTHROUGH_TABLES {
            if let Some(table) = font.table(tag) {
                sfnt.add_table(*tag, table.to_vec());
            }
        }
        sfnt.build()
    }
}

/// Give `old` the next free index unless it already has one.
fn assign(order: &mut Vec<u16>, remap: &mut HashMap<u16, u16>, old: u16) -> Result<u16> {
    if let Some(new) = remap.get(&old) {
        return Ok(*new);
    }
    let new = u16::try_from(order.len())
        .map_err(|_| Error::Font("subset exceeds 65535 glyphs".into()))?;
    order.push(old);
    remap.insert(old, new);
    Ok(new)
}

fn required<'f>(font: &'f TrueTypeFont, tag: &[u8; 4]) -> Result<&'f [u8]> {
    font.table(tag).ok_or_else(|| {
        Error::InvalidFont(format!("missing table '{}'", String::from_utf8_lossy(tag)))
    })
}

fn patch(table: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    let size = table.len();
    table
        .get_mut(offset..offset + bytes.len())
        .ok_or(Error::OutOfBounds {
            offset,
            len: bytes.len(),
            size,
        })?
        .copy_from_slice(bytes);
    Ok(())
}

/// Offsets of the glyph index fields of a composite glyph's components.
fn component_offsets(glyph: &[u8]) -> Result<Vec<usize>> {
    if glyph.len() < 10 {
        return Ok(Vec::new());
    }
    let mut cursor = BinaryCursor::new(glyph);
    if cursor.read_i16()? >= 0 {
        return Ok(Vec::new());
    }
    cursor.seek(10)?;

    let mut offsets = Vec::new();
    loop {
        let flags = cursor.read_u16()?;
        offsets.push(cursor.position());
        cursor.skip(2)?;
        cursor.skip(if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 })?;
        if flags & WE_HAVE_A_SCALE != 0 {
            cursor.skip(2)?;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            cursor.skip(4)?;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            cursor.skip(8)?;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(offsets)
}

/// Glyph indices referenced by a composite glyph; empty for simple glyphs.
pub fn composite_components(glyph: &[u8]) -> Result<Vec<u16>> {
    let cursor = BinaryCursor::new(glyph);
    component_offsets(glyph)?
        .into_iter()
        .map(|offset| cursor.u16_at(offset))
        .collect()
}

fn remap_components(glyph: &mut [u8], remap: &HashMap<u16, u16>) -> Result<()> {
    for offset in component_offsets(glyph)? {
        let old = BigEndian::read_u16(&glyph[offset..]);
        let new = remap.get(&old).copied().ok_or_else(|| {
            Error::Font(format!("component glyph {} was not collected", old))
        })?;
        BigEndian::write_u16(&mut glyph[offset..], new);
    }
    Ok(())
}

/// Map a hash to six uppercase letters.
fn hash_to_tag(hash: &[u8]) -> String {
    hash.iter().take(6).map(|b| (b'A' + b % 26) as char).collect()
}

/// Build a `cmap` table with one Windows Unicode BMP subtable in format 4.
///
/// Runs where both the code point and the glyph index increase by one share
/// a segment and are encoded with `idDelta` alone.
pub fn build_cmap_format4(map: &BTreeMap<u32, u16>) -> Result<Vec<u8>> {
    let mut segments: Vec<(u16, u16, u16)> = Vec::new();
    for (&cp, &gid) in map.iter().filter(|(cp, _)| **cp < 0xFFFF) {
        let cp = cp as u16;
        match segments.last_mut() {
            Some((_, end, end_gid)) if *end + 1 == cp && end_gid.wrapping_add(1) == gid => {
                *end = cp;
                *end_gid = gid;
            },
            _ => segments.push((cp, cp, gid)),
        }
    }

    let seg_count = segments.len() + 1;
    let too_sparse = || {
        Error::Font(format!(
            "subset cmap needs {} segments, more than a format 4 subtable can hold",
            seg_count
        ))
    };
    let subtable_len = u16::try_from(16 + seg_count * 8).map_err(|_| too_sparse())?;
    let seg_count_x2 = u16::try_from(seg_count * 2).map_err(|_| too_sparse())?;
    // floor(log2(seg_count)); at most 12 once the length fits in 16 bits
    let entry_selector = (usize::BITS - 1 - seg_count.leading_zeros()) as u16;
    let search_range = 2u16 << entry_selector;

    let mut t = Vec::with_capacity(12 + subtable_len as usize);
    t.write_u16::<BigEndian>(0)?;
    t.write_u16::<BigEndian>(1)?;
    t.write_u16::<BigEndian>(3)?;
    t.write_u16::<BigEndian>(1)?;
    t.write_u32::<BigEndian>(12)?;

    t.write_u16::<BigEndian>(4)?;
    t.write_u16::<BigEndian>(subtable_len)?;
    t.write_u16::<BigEndian>(0)?;
    t.write_u16::<BigEndian>(seg_count_x2)?;
    t.write_u16::<BigEndian>(search_range)?;
    t.write_u16::<BigEndian>(entry_selector)?;
    t.write_u16::<BigEndian>(seg_count_x2 - search_range)?;
    for (_, end, _) in &segments {
        t.write_u16::<BigEndian>(*end)?;
    }
    t.write_u16::<BigEndian>(0xFFFF)?;
    t.write_u16::<BigEndian>(0)?;
    for (start, _, _) in &segments {
        t.write_u16::<BigEndian>(*start)?;
    }
    t.write_u16::<BigEndian>(0xFFFF)?;
    for (start, end, end_gid) in &segments {
        let start_gid = end_gid.wrapping_sub(end - start);
        t.write_u16::<BigEndian>(start_gid.wrapping_sub(*start))?;
    }
    t.write_u16::<BigEndian>(1)?;
    for _ in 0..seg_count {
        t.write_u16::<BigEndian>(0)?;
    }
    Ok(t)
}

/// Sum of a table as big-endian u32 words, zero-padded to a multiple of 4.
pub fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Assembles an sfnt file from tables.
///
/// Tables are written in tag order, each padded to four bytes. When a `head`
/// table is present its `checksumAdjustment` is set after the file is laid
/// out.
#[derive(Debug, Default)]
pub struct SfntBuilder {
    tables: BTreeMap<[u8; 4], Vec<u8>>,
}

impl SfntBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table.
    pub fn add_table(&mut self, tag: [u8; 4], data: Vec<u8>) -> &mut Self {
        self.tables.insert(tag, data);
        self
    }

    /// Write the font file.
    pub fn build(&self) -> Result<Vec<u8>> {
        let num_tables = self.tables.len() as u16;
        let entry_selector = if num_tables == 0 {
            0
        } else {
            15 - num_tables.leading_zeros() as u16
        };
        let search_range = (1u16 << entry_selector) * 16;

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(super::truetype_parser::TRUETYPE_MAGIC)?;
        out.write_u16::<BigEndian>(num_tables)?;
        out.write_u16::<BigEndian>(search_range)?;
        out.write_u16::<BigEndian>(entry_selector)?;
        out.write_u16::<BigEndian>(num_tables * 16 - search_range.min(num_tables * 16))?;

        let mut offset = 12 + 16 * self.tables.len();
        let mut head_offset = None;
        for (tag, data) in &self.tables {
            let checksum = if tag == b"head" {
                head_offset = Some(offset);
                let mut zeroed = data.clone();
                if zeroed.len() >= 12 {
                    zeroed[8..12].fill(0);
                }
                table_checksum(&zeroed)
            } else {
                table_checksum(data)
            };
            out.extend_from_slice(tag);
            out.write_u32::<BigEndian>(checksum)?;
            out.write_u32::<BigEndian>(offset as u32)?;
            out.write_u32::<BigEndian>(data.len() as u32)?;
            offset += padded_len(data.len());
        }

        for (tag, data) in &self.tables {
            let start = out.len();
            out.extend_from_slice(data);
            if tag == b"head" && data.len() >= 12 {
                out[start + 8..start + 12].fill(0);
            }
            out.resize(start + padded_len(data.len()), 0);
        }

        if let Some(head) = head_offset {
            if self.tables.get(b"head").is_some_and(|h| h.len() >= 12) {
                let adjustment = CHECKSUM_MAGIC.wrapping_sub(table_checksum(&out));
                BigEndian::write_u32(&mut out[head + 8..head + 12], adjustment);
            }
        }
        Ok(out)
    }
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::truetype_parser::parse_cmap_format4;

    #[test]
    fn test_hash_to_tag_is_uppercase() {
        let tag = hash_to_tag(&[0, 25, 26, 51, 200, 255, 7]);
        assert_eq!(tag, "AZAZSV");
    }

    #[test]
    fn test_table_checksum_pads_tail() {
        assert_eq!(table_checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        assert_eq!(table_checksum(&[1]), 0x0100_0000);
        assert_eq!(table_checksum(&[0xFF; 8]), 0xFFFF_FFFE);
    }

    #[test]
    fn test_sfnt_directory() {
        let mut b = SfntBuilder::new();
        b.add_table(*b"zzzz", vec![1, 2, 3])
            .add_table(*b"aaaa", vec![9; 8])
            .add_table(*b"mmmm", vec![5; 4]);
        let out = b.build().unwrap();
        let c = BinaryCursor::new(&out);
        assert_eq!(c.u16_at(4).unwrap(), 3);
        assert_eq!(c.u16_at(6).unwrap(), 32);
        assert_eq!(c.u16_at(8).unwrap(), 1);
        assert_eq!(c.u16_at(10).unwrap(), 16);
        // sorted by tag
        assert_eq!(&out[12..16], b"aaaa");
        assert_eq!(&out[28..32], b"mmmm");
        assert_eq!(&out[44..48], b"zzzz");
        // 12 + 3 * 16 header, then 8 + 4 + 4 (padded) bytes of tables
        assert_eq!(out.len(), 60 + 16);
        assert_eq!(out.len() % 4, 0);
    }

    #[test]
    fn test_head_checksum_adjustment() {
        let mut head = vec![0u8; 54];
        head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        head[8..12].copy_from_slice(&[0xAA; 4]);
        let mut b = SfntBuilder::new();
        b.add_table(*b"head", head).add_table(*b"glyf", vec![1, 2, 3, 4, 5]);
        let out = b.build().unwrap();
        assert_eq!(table_checksum(&out), CHECKSUM_MAGIC);
    }

    #[test]
    fn test_cmap_format4_segments() {
        let map: BTreeMap<u32, u16> = [(0x41, 1), (0x42, 2), (0x43, 3), (0x61, 4), (0x63, 5)].into();
        let table = build_cmap_format4(&map).unwrap();
        let c = BinaryCursor::new(&table);
        assert_eq!(c.u16_at(12).unwrap(), 4);
        // three data segments plus the terminator
        assert_eq!(c.u16_at(12 + 6).unwrap(), 8);
        let parsed = parse_cmap_format4(&table, 12).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn test_cmap_format4_empty() {
        let table = build_cmap_format4(&BTreeMap::new()).unwrap();
        assert!(parse_cmap_format4(&table, 12).unwrap().is_empty());
    }

    #[test]
    fn test_cmap_format4_rejects_too_many_segments() {
        let sparse = |n: u32| -> BTreeMap<u32, u16> { (0..n).map(|i| (2 * i, i as u16 + 1)).collect() };
        let table = build_cmap_format4(&sparse(8000)).unwrap();
        let c = BinaryCursor::new(&table);
        assert_eq!(c.u16_at(12 + 6).unwrap(), 16002);
        assert_eq!(c.u16_at(12 + 8).unwrap(), 8192);
        assert_eq!(c.u16_at(12 + 10).unwrap(), 12);
        assert!(matches!(build_cmap_format4(&sparse(8200)), Err(Error::Font(_))));
    }

    fn composite(components: &[(u16, u16)]) -> Vec<u8> {
        let mut g = vec![0xFF, 0xFF, 0, 0, 0, 0, 0, 10, 0, 10];
        for (i, (flags, gid)) in components.iter().enumerate() {
            let more = if i + 1 < components.len() { MORE_COMPONENTS } else { 0 };
            g.extend_from_slice(&(flags | more).to_be_bytes());
            g.extend_from_slice(&gid.to_be_bytes());
            if flags & ARG_1_AND_2_ARE_WORDS != 0 {
                g.extend_from_slice(&[0, 1, 0, 2]);
            } else {
                g.extend_from_slice(&[1, 2]);
            }
            if flags & WE_HAVE_A_SCALE != 0 {
                g.extend_from_slice(&[0x40, 0]);
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                g.extend_from_slice(&[0x40, 0, 0x40, 0]);
            } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                g.extend_from_slice(&[0x40, 0, 0, 0, 0, 0, 0x40, 0]);
            }
        }
        g
    }

    #[test]
    fn test_composite_components_with_transforms() {
        let glyph = composite(&[
            (ARG_1_AND_2_ARE_WORDS | WE_HAVE_A_SCALE, 7),
            (WE_HAVE_AN_X_AND_Y_SCALE, 12),
            (WE_HAVE_A_TWO_BY_TWO, 3),
        ]);
        assert_eq!(composite_components(&glyph).unwrap(), vec![7, 12, 3]);
    }

    #[test]
    fn test_simple_glyph_has_no_components() {
        let mut simple = vec![0, 1, 0, 0, 0, 0, 0, 10, 0, 10];
        simple.extend_from_slice(&[0; 8]);
        assert!(composite_components(&simple).unwrap().is_empty());
        assert!(composite_components(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_remap_components_rewrites_indices() {
        let mut glyph = composite(&[(0, 7), (ARG_1_AND_2_ARE_WORDS, 12)]);
        let remap: HashMap<u16, u16> = [(7, 2), (12, 3)].into();
        remap_components(&mut glyph, &remap).unwrap();
        assert_eq!(composite_components(&glyph).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_remap_missing_component_fails() {
        let mut glyph = composite(&[(0, 9)]);
        assert!(remap_components(&mut glyph, &HashMap::new()).is_err());
    }

    #[test]
    fn test_truncated_composite_is_error() {
        let mut glyph = composite(&[(MORE_COMPONENTS, 4)]);
        glyph.truncate(glyph.len() - 1);
        assert!(composite_components(&glyph).is_err());
    }
}
