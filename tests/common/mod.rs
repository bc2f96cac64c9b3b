//! Shared helpers for integration tests: a synthetic TrueType program and
//! small PDF inspection utilities.

#![allow(dead_code)]

use std::io::Read;

use flate2::read::ZlibDecoder;

/// Code point to glyph index of the synthetic font.
///
/// Glyph 3 ('C') is a composite that references glyph 4, which no code
/// point maps to. The digits use glyphs 8 to 17.
pub const CHAR_MAP: [(u32, u16); 16] = [
    (0x20, 5),
    (0x30, 8),
    (0x31, 9),
    (0x32, 10),
    (0x33, 11),
    (0x34, 12),
    (0x35, 13),
    (0x36, 14),
    (0x37, 15),
    (0x38, 16),
    (0x39, 17),
    (0x41, 1),
    (0x42, 2),
    (0x43, 3),
    (0xE9, 6),
    (0x3A9, 7),
];

/// Advance width per glyph, 1000 units per em.
pub const ADVANCES: [u16; 18] = [
    500, 600, 650, 700, 300, 250, 600, 800, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
];

/// PostScript name recorded in the `name` table.
pub const POSTSCRIPT_NAME: &str = "Forge Test-Regular";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Options for [`build_font`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FontOptions {
    /// Route every cmap segment through `glyphIdArray`
    pub indirect_cmap: bool,
    /// Use 32-bit `loca` offsets
    pub long_loca: bool,
    /// `OS/2.fsType`
    pub fs_type: u16,
    /// Start the file with `OTTO`
    pub cff_magic: bool,
}

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn head(long_loca: bool) -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000); // version
    be32(&mut t, 0x0001_0000); // fontRevision
    be32(&mut t, 0); // checksumAdjustment
    be32(&mut t, 0x5F0F_3CF5); // magic
    be16(&mut t, 0x000B); // flags
    be16(&mut t, 1000); // unitsPerEm
    t.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 800, 900] {
        be16(&mut t, v as u16);
    }
    be16(&mut t, 0); // macStyle
    be16(&mut t, 8); // lowestRecPPEM
    be16(&mut t, 2); // fontDirectionHint
    be16(&mut t, long_loca as u16); // indexToLocFormat
    be16(&mut t, 0); // glyphDataFormat
    assert_eq!(t.len(), 54);
    t
}

fn hhea() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000);
    be16(&mut t, 800); // ascender
    be16(&mut t, (-200i16) as u16); // descender
    be16(&mut t, 0); // lineGap
    be16(&mut t, 800); // advanceWidthMax
    t.extend_from_slice(&[0; 20]);
    be16(&mut t, 0); // metricDataFormat
    be16(&mut t, ADVANCES.len() as u16); // numberOfHMetrics
    assert_eq!(t.len(), 36);
    t
}

fn maxp() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000);
    be16(&mut t, ADVANCES.len() as u16);
    t.extend_from_slice(&[0; 26]);
    t
}

fn hmtx() -> Vec<u8> {
    let mut t = Vec::new();
    for w in ADVANCES {
        be16(&mut t, w);
        be16(&mut t, 10);
    }
    t
}

/// Format 4 subtable with one segment per mapped code point.
fn cmap(indirect: bool) -> Vec<u8> {
    let seg_count = CHAR_MAP.len() as u16 + 1;
    let glyph_ids: Vec<u16> = if indirect {
        CHAR_MAP.iter().map(|(_, g)| *g).collect()
    } else {
        Vec::new()
    };
    let length = 16 + seg_count as usize * 8 + glyph_ids.len() * 2;

    let mut sub = Vec::new();
    for v in [4, length as u16, 0, seg_count * 2, 0, 0, 0] {
        be16(&mut sub, v);
    }
    for (cp, _) in CHAR_MAP {
        be16(&mut sub, cp as u16);
    }
    be16(&mut sub, 0xFFFF);
    be16(&mut sub, 0); // reservedPad
    for (cp, _) in CHAR_MAP {
        be16(&mut sub, cp as u16);
    }
    be16(&mut sub, 0xFFFF);
    for (cp, gid) in CHAR_MAP {
        let delta = if indirect { 0 } else { gid.wrapping_sub(cp as u16) };
        be16(&mut sub, delta);
    }
    be16(&mut sub, 1);
    for i in 0..CHAR_MAP.len() {
        let offset = if indirect {
            // from this idRangeOffset slot to glyphIdArray[i]
            2 * (seg_count as usize - i) + 2 * i
        } else {
            0
        };
        be16(&mut sub, offset as u16);
    }
    be16(&mut sub, 0);
    for g in glyph_ids {
        be16(&mut sub, g);
    }

    let mut t = Vec::new();
    be16(&mut t, 0);
    be16(&mut t, 1);
    be16(&mut t, 3);
    be16(&mut t, 1);
    be32(&mut t, 12);
    t.extend_from_slice(&sub);
    t
}

fn name() -> Vec<u8> {
    let value: Vec<u8> = POSTSCRIPT_NAME.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
    let mut t = Vec::new();
    be16(&mut t, 0); // format
    be16(&mut t, 1); // count
    be16(&mut t, 6 + 12); // stringOffset
    for v in [3, 1, 0x0409, 6, value.len() as u16, 0] {
        be16(&mut t, v);
    }
    t.extend_from_slice(&value);
    t
}

fn os2(fs_type: u16) -> Vec<u8> {
    let mut t = vec![0u8; 96];
    t[0..2].copy_from_slice(&4u16.to_be_bytes()); // version
    t[4..6].copy_from_slice(&400u16.to_be_bytes()); // usWeightClass
    t[8..10].copy_from_slice(&fs_type.to_be_bytes());
    t[62..64].copy_from_slice(&0x0040u16.to_be_bytes()); // fsSelection REGULAR
    t[68..70].copy_from_slice(&800u16.to_be_bytes()); // sTypoAscender
    t[70..72].copy_from_slice(&(-200i16).to_be_bytes()); // sTypoDescender
    t[88..90].copy_from_slice(&700u16.to_be_bytes()); // sCapHeight
    t
}

fn post() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0003_0000);
    be32(&mut t, 0); // italicAngle
    be16(&mut t, (-100i16) as u16); // underlinePosition
    be16(&mut t, 50); // underlineThickness
    be32(&mut t, 0); // isFixedPitch
    t.extend_from_slice(&[0; 16]);
    t
}

/// A one-point simple glyph.
fn simple_glyph(x_max: i16) -> Vec<u8> {
    let mut g = Vec::new();
    be16(&mut g, 1); // numberOfContours
    for v in [0, 0, x_max, 700] {
        be16(&mut g, v as u16);
    }
    be16(&mut g, 0); // endPtsOfContours[0]
    be16(&mut g, 0); // instructionLength
    g.push(0x01); // on curve, 16-bit coordinates
    be16(&mut g, 0);
    be16(&mut g, 0);
    g
}

/// A composite glyph made of one offset copy of `component`.
fn composite_glyph(component: u16) -> Vec<u8> {
    let mut g = Vec::new();
    be16(&mut g, 0xFFFF); // numberOfContours = -1
    for v in [0, 0, 600, 700] {
        be16(&mut g, v as u16);
    }
    be16(&mut g, 0x0003); // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
    be16(&mut g, component);
    be16(&mut g, 50);
    be16(&mut g, 0);
    g
}

fn glyphs(long_loca: bool) -> (Vec<u8>, Vec<u8>) {
    let mut outlines: Vec<Vec<u8>> = vec![
        Vec::new(),         // .notdef
        simple_glyph(600),  // A
        simple_glyph(650),  // B
        composite_glyph(4), // C
        simple_glyph(300),  // component of C
        Vec::new(),         // space
        simple_glyph(600),  // eacute
        simple_glyph(800),  // Omega
    ];
    outlines.extend((0..10).map(|_| simple_glyph(556)));
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    let push_offset = |loca: &mut Vec<u8>, offset: usize| {
        if long_loca {
            be32(loca, offset as u32);
        } else {
            be16(loca, (offset / 2) as u16);
        }
    };
    for g in outlines {
        push_offset(&mut loca, glyf.len());
        glyf.extend_from_slice(&g);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    push_offset(&mut loca, glyf.len());
    (loca, glyf)
}

/// Assemble an sfnt from `(tag, data)` pairs, tables sorted by tag.
pub fn assemble(magic: [u8; 4], mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    tables.sort_by(|a, b| a.0.cmp(&b.0));
    let num_tables = tables.len() as u16;
    let mut out = Vec::new();
    out.extend_from_slice(&magic);
    be16(&mut out, num_tables);
    let mut pow2 = 1u16;
    let mut log2 = 0u16;
    while pow2 * 2 <= num_tables {
        pow2 *= 2;
        log2 += 1;
    }
    be16(&mut out, pow2 * 16);
    be16(&mut out, log2);
    be16(&mut out, num_tables * 16 - pow2 * 16);

    let mut offset = 12 + tables.len() * 16;
    let mut body = Vec::new();
    for (tag, data) in &tables {
        out.extend_from_slice(tag);
        be32(&mut out, 0);
        be32(&mut out, offset as u32);
        be32(&mut out, data.len() as u32);
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + tables.len() * 16 + body.len();
    }
    out.extend_from_slice(&body);
    out
}

/// Build the synthetic font.
pub fn build_font(options: FontOptions) -> Vec<u8> {
    let (loca, glyf) = glyphs(options.long_loca);
    let magic = if options.cff_magic { *b"OTTO" } else { [0, 1, 0, 0] };
    assemble(
        magic,
        vec![
            (*b"head", head(options.long_loca)),
            (*b"hhea", hhea()),
            (*b"maxp", maxp()),
            (*b"hmtx", hmtx()),
            (*b"cmap", cmap(options.indirect_cmap)),
            (*b"name", name()),
            (*b"OS/2", os2(options.fs_type)),
            (*b"post", post()),
            (*b"loca", loca),
            (*b"glyf", glyf),
        ],
    )
}

/// The synthetic font with default options.
pub fn test_font() -> Vec<u8> {
    build_font(FontOptions::default())
}

/// Decompress a zlib stream.
pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

pub fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

pub fn rfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).rposition(|w| w == needle)
}

/// The dictionary text and raw stream payload of indirect object `id`.
pub fn object(pdf: &[u8], id: u32) -> (String, Option<Vec<u8>>) {
    let header = format!("\n{} 0 obj\n", id);
    let start = find(pdf, header.as_bytes()).unwrap() + header.len();
    let end = start + find(&pdf[start..], b"\nendobj\n").unwrap();
    let body = &pdf[start..end];
    match find(body, b"\nstream\n") {
        Some(s) => {
            let dict = String::from_utf8_lossy(&body[..s]).to_string();
            let data_end = rfind(body, b"\nendstream").unwrap();
            (dict, Some(body[s + 8..data_end].to_vec()))
        },
        None => (String::from_utf8_lossy(body).to_string(), None),
    }
}

/// Parse a `<hex>` string body.
pub fn unhex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

/// Integer value following `/Key ` in a dictionary text.
pub fn dict_int(dict: &str, key: &str) -> Option<i64> {
    let pat = format!("/{} ", key);
    let at = dict.find(&pat)? + pat.len();
    dict[at..]
        .split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .next()?
        .parse()
        .ok()
}

/// Object number of the reference following `/Key `.
pub fn dict_ref(dict: &str, key: &str) -> Option<u32> {
    dict_int(dict, key).map(|v| v as u32)
}
