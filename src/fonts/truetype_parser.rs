//! TrueType font parser for PDF embedding.
//!
//! Reads the sfnt table directory and the tables needed to embed a font as a
//! CIDFontType2: `head`, `hhea`, `maxp`, `hmtx`, `cmap`, `name`, `OS/2` and
//! `post`. Glyph outlines (`loca`/`glyf`) are kept as raw table data for the
//! subsetter.
//!
//! Only TrueType outlines (`0x00010000`) are accepted. PostScript-flavoured
//! containers (`OTTO`) are rejected before any table is read. The character
//! map must provide a Windows Unicode BMP subtable (platform 3, encoding 1)
//! in format 4.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use super::cursor::BinaryCursor;
use super::font_definition::{FontBBox, FontDescriptor, FontFlags};
use crate::error::{Error, Result};

/// sfnt version of fonts with TrueType outlines.
pub const TRUETYPE_MAGIC: u32 = 0x0001_0000;
/// sfnt version of fonts with CFF outlines.
pub const OPENTYPE_CFF_MAGIC: [u8; 4] = *b"OTTO";
/// Magic number stored in the `head` table.
pub const HEAD_MAGIC: u32 = 0x5F0F_3CF5;

const REQUIRED_TABLES: [&[u8; 4]; 9] = [
    b"head", b"hhea", b"maxp", b"hmtx", b"cmap", b"name", b"post", b"loca", b"glyf",
];

/// One entry of the sfnt table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    /// Table tag
    pub tag: [u8; 4],
    /// Checksum as stored in the directory
    pub checksum: u32,
    /// Offset from the start of the file
    pub offset: u32,
    /// Unpadded length
    pub length: u32,
}

impl TableRecord {
    fn range(&self) -> Range<usize> {
        self.offset as usize..self.offset as usize + self.length as usize
    }
}

/// Metrics derived from a font program, scaled to 1000 units per em where
/// the value ends up in PDF dictionaries.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    /// PostScript name with PDF-unsafe characters removed
    pub postscript_name: String,
    /// Design units per em
    pub units_per_em: u16,
    /// Bounding box, scaled
    pub bbox: FontBBox,
    /// Ascent, scaled
    pub ascent: i32,
    /// Descent, scaled (negative)
    pub descent: i32,
    /// Cap height, scaled
    pub cap_height: i32,
    /// Italic angle in degrees
    pub italic_angle: f64,
    /// Underline position, scaled
    pub underline_position: i32,
    /// Underline thickness, scaled
    pub underline_thickness: i32,
    /// Monospaced font
    pub is_fixed_pitch: bool,
    /// Bold per `OS/2.fsSelection` bit 5 or `head.macStyle`
    pub is_bold: bool,
    /// `OS/2.usWeightClass`, 400 when absent
    pub weight_class: u16,
    /// `OS/2.fsType` embedding permissions
    pub fs_type: u16,
    /// Estimated vertical stem width
    pub stem_v: i32,
    /// Descriptor flags
    pub flags: FontFlags,
    /// Width of glyph 0, scaled
    pub missing_width: u32,
    /// Number of glyphs in the font
    pub num_glyphs: u16,
    /// Number of long horizontal metrics in `hmtx`
    pub num_hmetrics: u16,
    /// Advance width per glyph in design units
    pub advance_widths: Vec<u16>,
    /// Unicode code point to glyph index
    pub char_to_glyph: BTreeMap<u32, u16>,
}

impl FontMetrics {
    /// Scale a design-unit value to 1/1000 em.
    pub fn scale(&self, value: i32) -> i32 {
        scale(value, self.units_per_em)
    }

    /// Advance width of a glyph in 1/1000 em.
    pub fn glyph_width(&self, gid: u16) -> u32 {
        self.advance_widths
            .get(gid as usize)
            .map(|w| self.scale(*w as i32).max(0) as u32)
            .unwrap_or(self.missing_width)
    }

    /// Advance width of a code point in 1/1000 em, `MissingWidth` if unmapped.
    pub fn char_width(&self, cp: u32) -> u32 {
        self.char_to_glyph
            .get(&cp)
            .map(|g| self.glyph_width(*g))
            .unwrap_or(self.missing_width)
    }

    /// Glyph index of a code point.
    pub fn glyph_index(&self, cp: u32) -> Option<u16> {
        self.char_to_glyph.get(&cp).copied()
    }

    /// Build the `/FontDescriptor` metrics.
    pub fn descriptor(&self) -> FontDescriptor {
        FontDescriptor {
            ascent: self.ascent,
            descent: self.descent,
            cap_height: self.cap_height,
            flags: self.flags,
            font_bbox: self.bbox,
            italic_angle: self.italic_angle,
            stem_v: self.stem_v,
            missing_width: self.missing_width,
        }
    }
}

fn scale(value: i32, units_per_em: u16) -> i32 {
    (value as f64 * 1000.0 / units_per_em as f64).round() as i32
}

/// A parsed TrueType program together with its raw bytes.
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    data: bytes::Bytes,
    tables: BTreeMap<[u8; 4], TableRecord>,
    index_to_loc_format: i16,
    left_side_bearings: Vec<i16>,
    /// Derived metrics
    pub metrics: FontMetrics,
}

impl TrueTypeFont {
    /// Parse a TrueType program.
    pub fn parse(data: impl Into<bytes::Bytes>) -> Result<Self> {
        let data: bytes::Bytes = data.into();
        let tables = read_table_directory(&data)?;
        for tag in REQUIRED_TABLES {
            if !tables.contains_key(tag) {
                return Err(Error::InvalidFont(format!(
                    "missing required table '{}'",
                    String::from_utf8_lossy(tag)
                )));
            }
        }

        let mut parser = Parser {
            data: &data,
            tables: &tables,
        };
        let head = parser.parse_head()?;
        let hhea = parser.parse_hhea()?;
        let num_glyphs = parser.parse_maxp()?;
        let (advance_widths, left_side_bearings) = parser.parse_hmtx(hhea.num_hmetrics, num_glyphs)?;
        let char_to_glyph = parser.parse_cmap(num_glyphs)?;
        let postscript_name = parser.parse_name()?;
        let os2 = parser.parse_os2()?;
        let post = parser.parse_post()?;

        if let Some(os2) = &os2 {
            if os2.fs_type == 0x0002 || os2.fs_type & 0x0300 != 0 {
                return Err(Error::UnsupportedFont(format!(
                    "font '{}' cannot be embedded due to license restrictions (fsType {:#06x})",
                    postscript_name, os2.fs_type
                )));
            }
        }

        let upem = head.units_per_em;
        let (raw_ascent, raw_descent) = os2
            .as_ref()
            .map(|o| (o.typo_ascender, o.typo_descender))
            .unwrap_or((hhea.ascender, hhea.descender));
        let ascent = scale(raw_ascent as i32, upem);
        let descent = scale(raw_descent as i32, upem);
        let cap_height = os2
            .as_ref()
            .and_then(|o| o.cap_height)
            .map(|c| scale(c as i32, upem))
            .unwrap_or(ascent);
        let weight_class = os2.as_ref().map(|o| o.weight_class).unwrap_or(400);
        let is_bold = os2.as_ref().map(|o| o.fs_selection & (1 << 5) != 0).unwrap_or(false)
            || head.mac_style & 1 != 0;
        let stem_v = if is_bold {
            (50.0 + (weight_class as f64 / 65.0).powi(2)).round() as i32
        } else {
            70
        };

        let mut flags = FontFlags::SYMBOLIC;
        if post.italic_angle != 0.0 {
            flags |= FontFlags::ITALIC;
        }
        if post.is_fixed_pitch {
            flags |= FontFlags::FIXED_PITCH;
        }
        if is_bold {
            flags |= FontFlags::FORCE_BOLD;
        }

        let missing_width = advance_widths
            .first()
            .map(|w| scale(*w as i32, upem).max(0) as u32)
            .unwrap_or(0);

        let metrics = FontMetrics {
            postscript_name,
            units_per_em: upem,
            bbox: FontBBox {
                xmin: scale(head.bbox[0] as i32, upem),
                ymin: scale(head.bbox[1] as i32, upem),
                xmax: scale(head.bbox[2] as i32, upem),
                ymax: scale(head.bbox[3] as i32, upem),
            },
            ascent,
            descent,
            cap_height,
            italic_angle: post.italic_angle,
            underline_position: scale(post.underline_position as i32, upem),
            underline_thickness: scale(post.underline_thickness as i32, upem),
            is_fixed_pitch: post.is_fixed_pitch,
            is_bold,
            weight_class,
            fs_type: os2.as_ref().map(|o| o.fs_type).unwrap_or(0),
            stem_v,
            flags,
            missing_width,
            num_glyphs,
            num_hmetrics: hhea.num_hmetrics,
            advance_widths,
            char_to_glyph,
        };

        log::debug!(
            "Parsed TrueType font '{}': {} glyphs, {} mapped code points, {} units/em",
            metrics.postscript_name,
            metrics.num_glyphs,
            metrics.char_to_glyph.len(),
            upem
        );

        Ok(Self {
            index_to_loc_format: head.index_to_loc_format,
            left_side_bearings,
            metrics,
            data,
            tables,
        })
    }

    /// Raw font bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Directory entry of a table.
    pub fn table_record(&self, tag: &[u8; 4]) -> Option<&TableRecord> {
        self.tables.get(tag)
    }

    /// Raw bytes of a table.
    pub fn table(&self, tag: &[u8; 4]) -> Option<&[u8]> {
        self.tables.get(tag).map(|r| &self.data[r.range()])
    }

    fn required_table(&self, tag: &[u8; 4]) -> Result<&[u8]> {
        self.table(tag).ok_or_else(|| {
            Error::InvalidFont(format!("missing table '{}'", String::from_utf8_lossy(tag)))
        })
    }

    /// Left side bearing of a glyph in design units.
    pub fn left_side_bearing(&self, gid: u16) -> i16 {
        self.left_side_bearings.get(gid as usize).copied().unwrap_or(0)
    }

    /// Byte range of a glyph inside the `glyf` table.
    pub fn glyph_range(&self, gid: u16) -> Result<Range<usize>> {
        if gid >= self.metrics.num_glyphs {
            return Err(Error::InvalidFont(format!(
                "glyph {} out of range ({} glyphs)",
                gid, self.metrics.num_glyphs
            )));
        }
        let loca = BinaryCursor::new(self.required_table(b"loca")?);
        let glyf_len = self.required_table(b"glyf")?.len();
        let i = gid as usize;
        let (start, end) = if self.index_to_loc_format == 0 {
            (loca.u16_at(i * 2)? as usize * 2, loca.u16_at(i * 2 + 2)? as usize * 2)
        } else {
            let start = loca.slice_at(i * 4, 4)?;
            let end = loca.slice_at(i * 4 + 4, 4)?;
            (
                u32::from_be_bytes([start[0], start[1], start[2], start[3]]) as usize,
                u32::from_be_bytes([end[0], end[1], end[2], end[3]]) as usize,
            )
        };
        if start > end || end > glyf_len {
            return Err(Error::InvalidFont(format!(
                "glyph {} has invalid location {}..{} (glyf holds {} bytes)",
                gid, start, end, glyf_len
            )));
        }
        Ok(start..end)
    }

    /// Outline data of a glyph. Empty glyphs return an empty slice.
    pub fn glyph_data(&self, gid: u16) -> Result<&[u8]> {
        let range = self.glyph_range(gid)?;
        Ok(&self.required_table(b"glyf")?[range])
    }
}

/// Read and validate the sfnt header and table directory.
fn read_table_directory(data: &[u8]) -> Result<BTreeMap<[u8; 4], TableRecord>> {
    let mut cursor = BinaryCursor::new(data);
    let version = cursor.read_tag()?;
    if version == OPENTYPE_CFF_MAGIC {
        return Err(Error::UnsupportedFont(
            "PostScript outlines (OTTO) are not supported, a TrueType font is required".into(),
        ));
    }
    if u32::from_be_bytes(version) != TRUETYPE_MAGIC {
        return Err(Error::InvalidFont(format!(
            "not a TrueType font: version tag {:02X}{:02X}{:02X}{:02X}",
            version[0], version[1], version[2], version[3]
        )));
    }

    let num_tables = cursor.read_u16()?;
    cursor.skip(6)?;
    let mut tables = BTreeMap::new();
    for _ in 0..num_tables {
        let record = TableRecord {
            tag: cursor.read_tag()?,
            checksum: cursor.read_u32()?,
            offset: cursor.read_u32()?,
            length: cursor.read_u32()?,
        };
        let end = record.offset as usize + record.length as usize;
        if end > data.len() {
            return Err(Error::OutOfBounds {
                offset: record.offset as usize,
                len: record.length as usize,
                size: data.len(),
            });
        }
        tables.insert(record.tag, record);
    }
    Ok(tables)
}

struct HeadTable {
    units_per_em: u16,
    bbox: [i16; 4],
    mac_style: u16,
    index_to_loc_format: i16,
}

struct HheaTable {
    ascender: i16,
    descender: i16,
    num_hmetrics: u16,
}

struct Os2Table {
    weight_class: u16,
    fs_type: u16,
    fs_selection: u16,
    typo_ascender: i16,
    typo_descender: i16,
    cap_height: Option<i16>,
}

struct PostTable {
    italic_angle: f64,
    underline_position: i16,
    underline_thickness: i16,
    is_fixed_pitch: bool,
}

struct Parser<'a> {
    data: &'a [u8],
    tables: &'a BTreeMap<[u8; 4], TableRecord>,
}

impl<'a> Parser<'a> {
    fn cursor(&self, tag: &[u8; 4]) -> Result<BinaryCursor<'a>> {
        let record = self.tables.get(tag).ok_or_else(|| {
            Error::InvalidFont(format!("missing table '{}'", String::from_utf8_lossy(tag)))
        })?;
        // Bound reads by the table itself, not by the whole file
        let table = BinaryCursor::new(self.data).slice_at(record.offset as usize, record.length as usize)?;
        Ok(BinaryCursor::new(table))
    }

    fn parse_head(&mut self) -> Result<HeadTable> {
        let mut c = self.cursor(b"head")?;
        c.skip(12)?;
        let magic = c.read_u32()?;
        if magic != HEAD_MAGIC {
            return Err(Error::InvalidFont(format!(
                "head table magic is {:#010x}, expected {:#010x}",
                magic, HEAD_MAGIC
            )));
        }
        c.skip(2)?;
        let units_per_em = c.read_u16()?;
        if units_per_em == 0 {
            return Err(Error::InvalidFont("unitsPerEm is zero".into()));
        }
        c.skip(16)?;
        let bbox = [c.read_i16()?, c.read_i16()?, c.read_i16()?, c.read_i16()?];
        let mac_style = c.read_u16()?;
        c.skip(4)?;
        let index_to_loc_format = c.read_i16()?;
        if !(0..=1).contains(&index_to_loc_format) {
            return Err(Error::InvalidFont(format!(
                "unknown indexToLocFormat {}",
                index_to_loc_format
            )));
        }
        Ok(HeadTable {
            units_per_em,
            bbox,
            mac_style,
            index_to_loc_format,
        })
    }

    fn parse_hhea(&mut self) -> Result<HheaTable> {
        let mut c = self.cursor(b"hhea")?;
        c.skip(4)?;
        let ascender = c.read_i16()?;
        let descender = c.read_i16()?;
        c.skip(26)?;
        let num_hmetrics = c.read_u16()?;
        if num_hmetrics == 0 {
            return Err(Error::InvalidFont("hhea declares zero horizontal metrics".into()));
        }
        Ok(HheaTable {
            ascender,
            descender,
            num_hmetrics,
        })
    }

    fn parse_maxp(&mut self) -> Result<u16> {
        let mut c = self.cursor(b"maxp")?;
        c.skip(4)?;
        c.read_u16()
    }

    /// Advance widths and left side bearings per glyph. Glyphs past the last
    /// long metric repeat its advance.
    fn parse_hmtx(&mut self, num_hmetrics: u16, num_glyphs: u16) -> Result<(Vec<u16>, Vec<i16>)> {
        let mut c = self.cursor(b"hmtx")?;
        let long_count = num_hmetrics.min(num_glyphs.max(1)) as usize;
        let mut widths = Vec::with_capacity(num_glyphs as usize);
        let mut bearings = Vec::with_capacity(num_glyphs as usize);
        for _ in 0..long_count {
            widths.push(c.read_u16()?);
            bearings.push(c.read_i16()?);
        }
        c.seek(num_hmetrics as usize * 4)?;
        let last = widths.last().copied().unwrap_or(0);
        while widths.len() < num_glyphs as usize {
            widths.push(last);
            bearings.push(if c.remaining() >= 2 { c.read_i16()? } else { 0 });
        }
        Ok((widths, bearings))
    }

    fn parse_cmap(&mut self, num_glyphs: u16) -> Result<BTreeMap<u32, u16>> {
        let record = self.tables[b"cmap"];
        let table = BinaryCursor::new(self.data).slice_at(record.offset as usize, record.length as usize)?;
        let mut c = BinaryCursor::new(table);
        c.skip(2)?;
        let num_subtables = c.read_u16()?;
        let mut subtable = None;
        for _ in 0..num_subtables {
            let platform = c.read_u16()?;
            let encoding = c.read_u16()?;
            let offset = c.read_u32()?;
            if platform == 3 && encoding == 1 {
                subtable = Some(offset as usize);
                break;
            }
        }
        let offset = subtable.ok_or_else(|| {
            Error::UnsupportedFont(
                "cmap has no Windows Unicode (platform 3, encoding 1) subtable".into(),
            )
        })?;
        let format = c.u16_at(offset)?;
        if format != 4 {
            return Err(Error::UnsupportedFont(format!(
                "cmap subtable format {} (only format 4 is supported)",
                format
            )));
        }
        let mut map = parse_cmap_format4(table, offset)?;
        map.retain(|_, gid| *gid < num_glyphs);
        Ok(map)
    }

    fn parse_name(&mut self) -> Result<String> {
        let c = self.cursor(b"name")?;
        let count = c.u16_at(2)? as usize;
        let string_offset = c.u16_at(4)? as usize;

        let mut candidates: HashMap<u16, String> = HashMap::new();
        for i in 0..count {
            let base = 6 + i * 12;
            let platform = c.u16_at(base)?;
            let name_id = c.u16_at(base + 6)?;
            if name_id != 6 || candidates.contains_key(&platform) {
                continue;
            }
            let length = c.u16_at(base + 8)? as usize;
            let offset = c.u16_at(base + 10)? as usize;
            let raw = c.slice_at(string_offset + offset, length)?;
            let decoded = match platform {
                0 | 3 => {
                    let units: Vec<u16> = raw
                        .chunks_exact(2)
                        .map(|p| u16::from_be_bytes([p[0], p[1]]))
                        .collect();
                    String::from_utf16_lossy(&units)
                },
                _ => raw.iter().map(|b| *b as char).collect(),
            };
            candidates.insert(platform, decoded);
        }

        let name = [3u16, 1, 0]
            .iter()
            .find_map(|p| candidates.get(p))
            .map(|raw| sanitize_postscript_name(raw))
            .unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidFont("font has no PostScript name (nameID 6)".into()));
        }
        Ok(name)
    }

    fn parse_os2(&mut self) -> Result<Option<Os2Table>> {
        if !self.tables.contains_key(b"OS/2") {
            return Ok(None);
        }
        let c = self.cursor(b"OS/2")?;
        let version = c.u16_at(0)?;
        let cap_height = if version >= 2 {
            Some(c.u16_at(88)? as i16)
        } else {
            None
        };
        Ok(Some(Os2Table {
            weight_class: c.u16_at(4)?,
            fs_type: c.u16_at(8)?,
            fs_selection: c.u16_at(62)?,
            typo_ascender: c.u16_at(68)? as i16,
            typo_descender: c.u16_at(70)? as i16,
            cap_height,
        }))
    }

    fn parse_post(&mut self) -> Result<PostTable> {
        let mut c = self.cursor(b"post")?;
        c.skip(4)?;
        Ok(PostTable {
            italic_angle: c.read_fixed()?,
            underline_position: c.read_i16()?,
            underline_thickness: c.read_i16()?,
            is_fixed_pitch: c.read_u32()? != 0,
        })
    }
}

/// Strip characters that may not appear in a PDF name or font name.
pub fn sanitize_postscript_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '(' | ')' | '<' | '>' | '{' | '}' | '[' | ']' | '/' | '%' | ' '))
        .collect()
}

/// Decode a format 4 subtable located at `offset` within `table`.
///
/// Segments with `idRangeOffset == 0` map `c + idDelta`. Other segments read
/// the glyph index from `glyphIdArray`, addressed relative to the
/// segment's own `idRangeOffset` slot, and add `idDelta` to non-zero results.
/// Glyph 0 and the terminating `0xFFFF` code are never recorded.
pub fn parse_cmap_format4(table: &[u8], offset: usize) -> Result<BTreeMap<u32, u16>> {
    let c = BinaryCursor::new(table);
    let seg_count_x2 = c.u16_at(offset + 6)? as usize;
    let seg_count = seg_count_x2 / 2;
    let end_codes = offset + 14;
    let start_codes = end_codes + seg_count_x2 + 2;
    let id_deltas = start_codes + seg_count_x2;
    let id_range_offsets = id_deltas + seg_count_x2;

    let mut map = BTreeMap::new();
    for seg in 0..seg_count {
        let end = c.u16_at(end_codes + seg * 2)? as u32;
        let start = c.u16_at(start_codes + seg * 2)? as u32;
        let delta = c.u16_at(id_deltas + seg * 2)? as u32;
        let range_offset_pos = id_range_offsets + seg * 2;
        let range_offset = c.u16_at(range_offset_pos)? as usize;
        if start > end {
            continue;
        }
        for code in start..=end {
            if code == 0xFFFF {
                continue;
            }
            let glyph = if range_offset == 0 {
                (code + delta) & 0xFFFF
            } else {
                let addr = range_offset_pos + range_offset + (code - start) as usize * 2;
                match c.u16_at(addr)? as u32 {
                    0 => 0,
                    g => (g + delta) & 0xFFFF,
                }
            };
            if glyph != 0 {
                map.insert(code, glyph as u16);
            }
        }
    }
    Ok(map)
}
