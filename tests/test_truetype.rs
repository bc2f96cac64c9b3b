//! Integration tests for TrueType parsing.
//!
//! Fonts are synthesized by `common::build_font` and cross-checked against
//! `ttf-parser` where both read the same table.

mod common;

use common::{build_font, test_font, FontOptions, ADVANCES, CHAR_MAP};
use pdf_forge::fonts::font_subsetter::composite_components;
use pdf_forge::fonts::{FontFlags, TrueTypeFont};
use pdf_forge::Error;

#[test]
fn test_parse_metrics() {
    common::init_logging();
    let font = TrueTypeFont::parse(test_font()).unwrap();
    let m = &font.metrics;

    assert_eq!(m.postscript_name, "ForgeTest-Regular");
    assert_eq!(m.units_per_em, 1000);
    assert_eq!(m.num_glyphs, ADVANCES.len() as u16);
    assert_eq!(m.ascent, 800);
    assert_eq!(m.descent, -200);
    assert_eq!(m.cap_height, 700);
    assert_eq!(m.underline_position, -100);
    assert_eq!(m.underline_thickness, 50);
    assert_eq!(m.missing_width, 500);
    assert_eq!(m.stem_v, 70);
    assert!(!m.is_bold);
    assert!(m.flags.contains(FontFlags::SYMBOLIC));
    assert!(!m.flags.contains(FontFlags::ITALIC));
    assert_eq!((m.bbox.xmin, m.bbox.ymin, m.bbox.xmax, m.bbox.ymax), (0, -200, 800, 900));
}

#[test]
fn test_cmap_delta_segments() {
    let font = TrueTypeFont::parse(test_font()).unwrap();
    let expected: Vec<(u32, u16)> = CHAR_MAP.to_vec();
    let actual: Vec<(u32, u16)> = font.metrics.char_to_glyph.iter().map(|(c, g)| (*c, *g)).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_cmap_glyph_id_array_segments() {
    let options = FontOptions {
        indirect_cmap: true,
        ..Default::default()
    };
    let font = TrueTypeFont::parse(build_font(options)).unwrap();
    for (cp, gid) in CHAR_MAP {
        assert_eq!(font.metrics.glyph_index(cp), Some(gid), "U+{:04X}", cp);
    }
    assert_eq!(font.metrics.glyph_index(0x44), None);
}

#[test]
fn test_widths_per_code_point() {
    let font = TrueTypeFont::parse(test_font()).unwrap();
    assert_eq!(font.metrics.char_width(0x41), 600);
    assert_eq!(font.metrics.char_width(0x20), 250);
    assert_eq!(font.metrics.char_width(0x3A9), 800);
    // unmapped falls back to MissingWidth
    assert_eq!(font.metrics.char_width(0x5A), 500);
}

#[test]
fn test_short_and_long_loca_agree() {
    let short = TrueTypeFont::parse(test_font()).unwrap();
    let long = TrueTypeFont::parse(build_font(FontOptions {
        long_loca: true,
        ..Default::default()
    }))
    .unwrap();
    for gid in 0..ADVANCES.len() as u16 {
        assert_eq!(short.glyph_range(gid).unwrap(), long.glyph_range(gid).unwrap());
        assert_eq!(short.glyph_data(gid).unwrap(), long.glyph_data(gid).unwrap());
    }
    assert!(short.glyph_data(0).unwrap().is_empty());
    assert!(short.glyph_range(ADVANCES.len() as u16).is_err());
}

#[test]
fn test_composite_glyph_components() {
    let font = TrueTypeFont::parse(test_font()).unwrap();
    assert_eq!(composite_components(font.glyph_data(3).unwrap()).unwrap(), vec![4]);
    assert!(composite_components(font.glyph_data(1).unwrap()).unwrap().is_empty());
}

#[test]
fn test_rejects_cff_outlines() {
    let data = build_font(FontOptions {
        cff_magic: true,
        ..Default::default()
    });
    let err = TrueTypeFont::parse(data).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFont(_)), "{:?}", err);
}

#[test]
fn test_rejects_unknown_magic() {
    let mut data = test_font();
    data[..4].copy_from_slice(b"wOFF");
    assert!(matches!(TrueTypeFont::parse(data).unwrap_err(), Error::InvalidFont(_)));
}

#[test]
fn test_rejects_restricted_license() {
    for fs_type in [0x0002, 0x0100, 0x0200] {
        let data = build_font(FontOptions {
            fs_type,
            ..Default::default()
        });
        let err = TrueTypeFont::parse(data).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFont(_)), "fsType {:#06x}: {:?}", fs_type, err);
    }
    // editable embedding is allowed
    let data = build_font(FontOptions {
        fs_type: 0x0008,
        ..Default::default()
    });
    assert!(TrueTypeFont::parse(data).is_ok());
}

#[test]
fn test_truncated_directory_is_out_of_bounds() {
    let mut data = test_font();
    // header plus ten directory records, no table data
    data.truncate(12 + 10 * 16);
    let err = TrueTypeFont::parse(data).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds { .. }), "{:?}", err);
}

#[test]
fn test_empty_input_is_error() {
    assert!(TrueTypeFont::parse(Vec::new()).is_err());
    assert!(TrueTypeFont::parse(vec![0, 1, 0]).is_err());
}

#[test]
fn test_missing_required_table() {
    let data = common::assemble([0, 1, 0, 0], vec![(*b"head", vec![0; 54])]);
    let err = TrueTypeFont::parse(data).unwrap_err();
    assert!(matches!(err, Error::InvalidFont(_)), "{:?}", err);
}

#[test]
fn test_agrees_with_ttf_parser() {
    let data = test_font();
    let face = ttf_parser::Face::parse(&data, 0).unwrap();
    let font = TrueTypeFont::parse(data.clone()).unwrap();

    assert_eq!(face.number_of_glyphs(), font.metrics.num_glyphs);
    assert_eq!(face.units_per_em(), font.metrics.units_per_em);
    for (cp, gid) in CHAR_MAP {
        let ch = char::from_u32(cp).unwrap();
        let theirs = face.glyph_index(ch).map(|g| g.0);
        assert_eq!(theirs, Some(gid), "{:?}", ch);
        let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap();
        assert_eq!(advance as u32, font.metrics.glyph_width(gid));
    }
}
