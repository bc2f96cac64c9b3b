//! Font definitions: descriptor, width tables and the JSON interchange format.
//!
//! A [`FontDefinition`] is created when a font is registered and lives as
//! long as the document. Single-byte fonts (core, TrueType, Type1) carry a
//! 256-entry width table indexed by cp1252 code. UTF-8 fonts carry the parsed
//! TrueType program plus the set of code points used so far.
//!
//! Precompiled fonts are exchanged as a JSON document whose field names
//! (`Tp`, `Name`, `Desc`, `Up`, `Ut`, `Cw`, ...) are fixed, paired with a
//! zlib-compressed sidecar holding the glyph program.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use flate2::read::ZlibDecoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::core_fonts::CoreFont;
use super::encoding::{utf16be, utf8_to_cp1252};
use super::truetype_parser::TrueTypeFont;
use crate::error::{Error, Result};

bitflags! {
    /// Font descriptor flags (PDF 32000-1, table 123).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FontFlags: u32 {
        /// All glyphs have the same width
        const FIXED_PITCH = 1 << 0;
        /// Glyphs have serifs
        const SERIF = 1 << 1;
        /// Font uses a symbol character set
        const SYMBOLIC = 1 << 2;
        /// Glyphs resemble cursive handwriting
        const SCRIPT = 1 << 3;
        /// Font uses the standard Latin character set
        const NONSYMBOLIC = 1 << 5;
        /// Glyphs have dominant vertical strokes that are slanted
        const ITALIC = 1 << 6;
        /// No lowercase letters
        const ALL_CAP = 1 << 16;
        /// Lowercase letters are small capitals
        const SMALL_CAP = 1 << 17;
        /// Bold glyphs are painted with extra pixels at small sizes
        const FORCE_BOLD = 1 << 18;
    }
}

mod flag_bits {
    use super::FontFlags;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flags: &FontFlags, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(flags.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FontFlags, D::Error> {
        Ok(FontFlags::from_bits_retain(u32::deserialize(d)?))
    }
}

/// Font bounding box in glyph space (1/1000 em).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FontBBox {
    /// Left
    pub xmin: i32,
    /// Bottom
    pub ymin: i32,
    /// Right
    pub xmax: i32,
    /// Top
    pub ymax: i32,
}

/// Font-wide metrics written to the `/FontDescriptor` dictionary.
///
/// Immutable once derived from a font program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FontDescriptor {
    /// Maximum height above the baseline
    pub ascent: i32,
    /// Maximum depth below the baseline (negative)
    pub descent: i32,
    /// Height of flat capital letters
    pub cap_height: i32,
    /// Descriptor flags
    #[serde(with = "flag_bits")]
    pub flags: FontFlags,
    /// Bounding box
    #[serde(rename = "FontBBox")]
    pub font_bbox: FontBBox,
    /// Angle of dominant vertical strokes, degrees counter-clockwise
    pub italic_angle: f64,
    /// Thickness of dominant vertical stems
    pub stem_v: i32,
    /// Width used for codes missing from the width table
    pub missing_width: u32,
}

/// Kind of font program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontType {
    /// One of the 14 standard fonts, never embedded
    Core,
    /// Single-byte TrueType from a precompiled definition
    TrueType,
    /// Single-byte Type1 from a precompiled definition
    Type1,
    /// Unicode TrueType embedded as a CIDFontType2 subset
    Utf8,
}

impl FontType {
    /// Name used in the JSON interchange format.
    pub fn as_str(self) -> &'static str {
        match self {
            FontType::Core => "Core",
            FontType::TrueType => "TrueType",
            FontType::Type1 => "Type1",
            FontType::Utf8 => "UTF8",
        }
    }
}

impl fmt::Display for FontType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FontType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Core" => Ok(FontType::Core),
            "TrueType" => Ok(FontType::TrueType),
            "Type1" => Ok(FontType::Type1),
            "UTF8" => Ok(FontType::Utf8),
            other => Err(Error::InvalidFont(format!("unknown font type '{}'", other))),
        }
    }
}

/// UTF-8 font state: the parsed program and the code points used so far.
#[derive(Debug, Clone)]
pub struct Utf8Font {
    /// Parsed TrueType program
    pub font: Arc<TrueTypeFont>,
    /// Code points emitted with this font; read only at serialization
    pub used: BTreeSet<u32>,
    /// Whether a page-count alias was written with this font
    pub alias_used: bool,
}

impl Utf8Font {
    /// True when the font maps `ch` to a glyph. Identity-H runs only carry
    /// such characters.
    pub fn has_glyph(&self, ch: char) -> bool {
        let cp = ch as u32;
        cp <= 0xFFFF && self.font.metrics.glyph_index(cp).is_some()
    }
}

/// A registered font.
#[derive(Debug, Clone)]
pub struct FontDefinition {
    /// Program kind
    pub font_type: FontType,
    /// PostScript name
    pub name: String,
    /// Descriptor metrics
    pub desc: FontDescriptor,
    /// Underline position
    pub up: i32,
    /// Underline thickness
    pub ut: i32,
    /// Width table indexed by single-byte code; empty for UTF-8 fonts
    pub cw: Vec<u16>,
    /// Encoding name for single-byte embedded fonts
    pub enc: String,
    /// `/Differences` array body, empty when the base encoding is used as is
    pub diff: String,
    /// Sidecar file name of the compressed program
    pub file: String,
    /// Program length (TrueType) or clear-text segment length (Type1)
    pub size1: u32,
    /// Encrypted segment length (Type1)
    pub size2: u32,
    /// Uncompressed program length
    pub original_size: u32,
    /// Content-addressed identifier, used as the `/F<id>` resource name
    pub id: String,
    /// Compressed program bytes for precompiled embedded fonts
    pub program: Option<bytes::Bytes>,
    /// UTF-8 font state
    pub utf8: Option<Utf8Font>,
}

/// Stable identifier derived from the PostScript name and program kind.
pub fn content_id(name: &str, font_type: FontType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(font_type.as_str().as_bytes());
    hasher.finalize()[..6]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FontDefJson {
    tp: String,
    name: String,
    desc: FontDescriptor,
    up: i32,
    ut: i32,
    cw: Vec<u16>,
    #[serde(default)]
    enc: String,
    #[serde(default)]
    diff: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    size1: u32,
    #[serde(default)]
    size2: u32,
    #[serde(default)]
    original_size: u32,
}

impl FontDefinition {
    /// Definition for a standard font. Nothing is embedded.
    pub fn core(font: CoreFont) -> Self {
        let name = font.postscript_name().to_string();
        let id = content_id(&name, FontType::Core);
        Self {
            font_type: FontType::Core,
            desc: font.descriptor(),
            up: -100,
            ut: 50,
            cw: font.widths().to_vec(),
            enc: String::new(),
            diff: String::new(),
            file: String::new(),
            size1: 0,
            size2: 0,
            original_size: 0,
            id,
            program: None,
            utf8: None,
            name,
        }
    }

    /// Definition for a Unicode TrueType font embedded as a CID subset.
    pub fn from_truetype(font: TrueTypeFont) -> Self {
        let metrics = &font.metrics;
        let name = metrics.postscript_name.clone();
        let id = content_id(&name, FontType::Utf8);
        Self {
            font_type: FontType::Utf8,
            desc: metrics.descriptor(),
            up: metrics.underline_position,
            ut: metrics.underline_thickness,
            cw: Vec::new(),
            enc: String::new(),
            diff: String::new(),
            file: String::new(),
            size1: 0,
            size2: 0,
            original_size: font.data().len() as u32,
            id,
            program: None,
            utf8: Some(Utf8Font {
                font: Arc::new(font),
                used: BTreeSet::new(),
                alias_used: false,
            }),
            name,
        }
    }

    /// Load a precompiled definition and, for embedded kinds, its
    /// zlib-compressed program.
    pub fn from_json(json: &[u8], program: Option<Vec<u8>>) -> Result<Self> {
        let def: FontDefJson = serde_json::from_slice(json)?;
        let font_type: FontType = def.tp.parse()?;
        if font_type == FontType::Utf8 {
            return Err(Error::InvalidFont(
                "UTF8 fonts are registered from TrueType programs, not JSON definitions".into(),
            ));
        }
        if font_type != FontType::Core && def.cw.len() != 256 {
            return Err(Error::InvalidFont(format!(
                "font '{}' width table has {} entries, expected 256",
                def.name,
                def.cw.len()
            )));
        }

        let program = match (font_type, program) {
            (FontType::Core, _) => None,
            (_, None) if !def.file.is_empty() => {
                return Err(Error::FileNotFound(def.file.clone()));
            },
            (_, None) => None,
            (_, Some(bytes)) => {
                check_program(&def.name, &bytes, def.original_size)?;
                Some(bytes::Bytes::from(bytes))
            },
        };

        let id = content_id(&def.name, font_type);
        log::debug!("Loaded {} font definition '{}'", font_type, def.name);
        Ok(Self {
            font_type,
            name: def.name,
            desc: def.desc,
            up: def.up,
            ut: def.ut,
            cw: def.cw,
            enc: def.enc,
            diff: def.diff,
            file: def.file,
            size1: def.size1,
            size2: def.size2,
            original_size: def.original_size,
            id,
            program,
            utf8: None,
        })
    }

    /// Serialize to the JSON interchange format.
    pub fn to_json(&self) -> Result<String> {
        if self.font_type == FontType::Utf8 {
            return Err(Error::Font(format!(
                "font '{}' is a UTF8 font and has no JSON definition",
                self.name
            )));
        }
        let def = FontDefJson {
            tp: self.font_type.as_str().to_string(),
            name: self.name.clone(),
            desc: self.desc.clone(),
            up: self.up,
            ut: self.ut,
            cw: self.cw.clone(),
            enc: self.enc.clone(),
            diff: self.diff.clone(),
            file: self.file.clone(),
            size1: self.size1,
            size2: self.size2,
            original_size: self.original_size,
        };
        Ok(serde_json::to_string(&def)?)
    }

    /// True for Unicode fonts.
    pub fn is_utf8(&self) -> bool {
        self.utf8.is_some()
    }

    /// Width of one character in 1/1000 em.
    pub fn char_width(&self, ch: char) -> u32 {
        match &self.utf8 {
            Some(u) if u.has_glyph(ch) => u.font.metrics.char_width(ch as u32),
            Some(_) => 0,
            None => {
                let code = utf8_to_cp1252(ch.encode_utf8(&mut [0; 4]));
                code.first()
                    .and_then(|c| self.cw.get(*c as usize))
                    .map(|w| *w as u32)
                    .unwrap_or(self.desc.missing_width)
            },
        }
    }

    /// Width of a string in 1/1000 em.
    pub fn string_width(&self, text: &str) -> u32 {
        match &self.utf8 {
            Some(_) => text.chars().map(|c| self.char_width(c)).sum(),
            None => utf8_to_cp1252(text)
                .iter()
                .map(|c| self.cw.get(*c as usize).copied().unwrap_or(0) as u32)
                .sum(),
        }
    }

    /// Encode text as an Identity-H run and record the code points used.
    ///
    /// Characters the font has no glyph for are dropped. Occurrences of
    /// `alias` are kept as written so the page count can replace them at
    /// output; the count's digits are added to the used set then.
    pub fn encode_cids(&mut self, text: &str, alias: &str) -> Vec<u8> {
        let Some(u) = &mut self.utf8 else {
            return utf16be(text);
        };
        let parts: Vec<&str> = if alias.is_empty() {
            vec![text]
        } else {
            text.split(alias).collect()
        };
        let mut out = Vec::with_capacity(text.len() * 2);
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.extend(utf16be(alias));
                u.alias_used = true;
            }
            for ch in part.chars() {
                if !u.has_glyph(ch) {
                    continue;
                }
                u.used.insert(ch as u32);
                out.extend_from_slice(&(ch as u32 as u16).to_be_bytes());
            }
        }
        out
    }
}

/// Inflate a program sidecar to validate it against the declared size.
fn check_program(name: &str, compressed: &[u8], original_size: u32) -> Result<()> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(|e| Error::InvalidFont(format!("font '{}' program is not zlib data: {}", name, e)))?;
    if original_size != 0 && inflated.len() != original_size as usize {
        return Err(Error::InvalidFont(format!(
            "font '{}' program inflates to {} bytes, definition says {}",
            name,
            inflated.len(),
            original_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn sample_json() -> String {
        let cw: Vec<String> = (0..256).map(|i| (500 + i % 7).to_string()).collect();
        format!(
            r#"{{"Tp":"TrueType","Name":"Sample-Regular","Desc":{{"Ascent":905,"Descent":-212,"CapHeight":716,"Flags":32,"FontBBox":{{"Xmin":-665,"Ymin":-325,"Xmax":2000,"Ymax":1006}},"ItalicAngle":0,"StemV":70,"MissingWidth":750}},"Up":-106,"Ut":73,"Cw":[{}],"Enc":"cp1252","Diff":"","File":"sample.z","Size1":4,"Size2":0,"OriginalSize":4}}"#,
            cw.join(",")
        )
    }

    fn compressed(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let program = compressed(b"glyf");
        let def = FontDefinition::from_json(sample_json().as_bytes(), Some(program.clone())).unwrap();
        assert_eq!(def.font_type, FontType::TrueType);
        assert_eq!(def.desc.font_bbox.xmin, -665);
        assert_eq!(def.desc.flags, FontFlags::NONSYMBOLIC);

        let again = FontDefinition::from_json(def.to_json().unwrap().as_bytes(), Some(program)).unwrap();
        assert_eq!(again.cw, def.cw);
        assert_eq!(again.desc, def.desc);
        assert_eq!(again.id, def.id);
    }

    #[test]
    fn test_json_rejects_size_mismatch() {
        let program = compressed(b"longer than four");
        let err = FontDefinition::from_json(sample_json().as_bytes(), Some(program)).unwrap_err();
        assert!(matches!(err, Error::InvalidFont(_)));
    }

    #[test]
    fn test_json_missing_sidecar() {
        let err = FontDefinition::from_json(sample_json().as_bytes(), None).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_content_id_depends_on_type() {
        assert_eq!(content_id("A", FontType::Core), content_id("A", FontType::Core));
        assert_ne!(content_id("A", FontType::Core), content_id("A", FontType::Utf8));
        assert_eq!(content_id("A", FontType::Core).len(), 12);
    }

    #[test]
    fn test_core_string_width() {
        let def = FontDefinition::core(CoreFont::Helvetica);
        // H=722 e=556 l=222 l=222 o=556
        assert_eq!(def.string_width("Hello"), 2278);
        assert_eq!(def.char_width('H'), 722);
    }

    #[test]
    fn test_font_type_parse() {
        assert_eq!("UTF8".parse::<FontType>().unwrap(), FontType::Utf8);
        assert!("OpenType".parse::<FontType>().is_err());
    }
}
