//! Font registry keyed by family and style.
//!
//! Definitions are stored once per content id, so a font registered under two
//! keys (for example `Arial` and `Helvetica`) yields one font object in the
//! output. Keys and definitions both keep registration order, which is the
//! order fonts are serialized in unless catalog sorting is enabled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use super::core_fonts::CoreFont;
use super::font_definition::FontDefinition;
use super::truetype_parser::TrueTypeFont;
use crate::config::FileSource;
use crate::error::{Error, Result};

/// Face within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    /// Upright, normal weight
    Regular,
    /// Bold
    Bold,
    /// Italic
    Italic,
    /// Bold italic
    BoldItalic,
    /// Light weight
    Light,
    /// Semibold weight
    SemiBold,
    /// Extra bold weight
    ExtraBold,
}

impl FontStyle {
    /// Canonical key string.
    pub fn as_key(self) -> &'static str {
        match self {
            FontStyle::Regular => "",
            FontStyle::Bold => "B",
            FontStyle::Italic => "I",
            FontStyle::BoldItalic => "BI",
            FontStyle::Light => "L",
            FontStyle::SemiBold => "SB",
            FontStyle::ExtraBold => "EB",
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Text decorations carried in a style string but not part of the font key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextDecoration {
    /// `U`
    pub underline: bool,
    /// `S`
    pub strike_out: bool,
}

/// Split a caller style string into a face and decorations.
///
/// Accepts the letter form (`""`, `"B"`, `"I"`, `"BI"`, `"IB"`, with any of
/// `U` and `S` mixed in, case-insensitive) and the named faces `regular`,
/// `bold`, `italic`, `bolditalic`, `light`, `semibold` and `extrabold`.
pub fn normalize_style(style: &str) -> Result<(FontStyle, TextDecoration)> {
    let named = match style.to_ascii_lowercase().replace(&[' ', '-', '_'][..], "").as_str() {
        "regular" | "normal" => Some(FontStyle::Regular),
        "bold" => Some(FontStyle::Bold),
        "italic" => Some(FontStyle::Italic),
        "bolditalic" | "italicbold" => Some(FontStyle::BoldItalic),
        "light" => Some(FontStyle::Light),
        "semibold" => Some(FontStyle::SemiBold),
        "extrabold" => Some(FontStyle::ExtraBold),
        _ => None,
    };
    if let Some(face) = named {
        return Ok((face, TextDecoration::default()));
    }

    let mut decoration = TextDecoration::default();
    let (mut bold, mut italic) = (false, false);
    for c in style.chars().map(|c| c.to_ascii_uppercase()) {
        match c {
            'B' => bold = true,
            'I' => italic = true,
            'U' => decoration.underline = true,
            'S' => decoration.strike_out = true,
            _ => {
                return Err(Error::InvalidConfig(format!("unknown font style '{}'", style)));
            },
        }
    }
    let face = match (bold, italic) {
        (false, false) => FontStyle::Regular,
        (true, false) => FontStyle::Bold,
        (false, true) => FontStyle::Italic,
        (true, true) => FontStyle::BoldItalic,
    };
    Ok((face, decoration))
}

/// Registry key: lowercase family plus face.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    /// Lowercase family name
    pub family: String,
    /// Face
    pub style: FontStyle,
}

impl FontKey {
    /// Build a key from caller input, dropping decorations.
    pub fn new(family: &str, style: &str) -> Result<Self> {
        let (style, _) = normalize_style(style)?;
        Ok(Self::normalized(family, style))
    }

    fn normalized(family: &str, style: FontStyle) -> Self {
        let family = family.trim().to_lowercase();
        // single-face families
        let style = if matches!(family.as_str(), "symbol" | "zapfdingbats") {
            FontStyle::Regular
        } else {
            style
        };
        Self { family, style }
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.family, self.style)
    }
}

/// The faces registered under one family name.
#[derive(Debug, Clone, Default)]
pub struct FontFamily {
    styles: IndexMap<FontStyle, String>,
}

impl FontFamily {
    /// Content id of a face.
    pub fn get(&self, style: FontStyle) -> Option<&str> {
        self.styles.get(&style).map(String::as_str)
    }

    /// The Regular face used when a requested style is missing.
    pub fn regular(&self) -> Option<&str> {
        self.get(FontStyle::Regular)
    }

    /// Registered faces in registration order.
    pub fn styles(&self) -> impl Iterator<Item = FontStyle> + '_ {
        self.styles.keys().copied()
    }
}

/// Where a font program comes from.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// Built-in standard font
    Core(CoreFont),
    /// TrueType program bytes, embedded as a UTF-8 subset
    Utf8Bytes(Vec<u8>),
    /// TrueType file read through the file source
    Utf8File(PathBuf),
    /// JSON definition and its compressed program
    Json {
        /// Definition document
        definition: Vec<u8>,
        /// zlib sidecar, required when the definition names a file
        program: Option<Vec<u8>>,
    },
    /// JSON definition file; the sidecar is read from the same directory
    JsonFile(PathBuf),
}

/// Outcome of resolving a family and style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Key of the definition actually used
    pub key: FontKey,
    /// Content id of that definition
    pub id: String,
    /// True when the requested style was missing and Regular was used
    pub fell_back: bool,
    /// Decorations from the requested style
    pub decoration: TextDecoration,
}

/// Registered fonts of a document.
pub struct FontCatalog {
    keys: IndexMap<FontKey, String>,
    definitions: IndexMap<String, FontDefinition>,
    families: IndexMap<String, FontFamily>,
    file_source: Arc<dyn FileSource>,
    font_dir: PathBuf,
}

impl fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontCatalog")
            .field("keys", &self.keys)
            .field("font_dir", &self.font_dir)
            .finish()
    }
}

impl FontCatalog {
    /// Create an empty catalog reading files through `file_source`.
    pub fn new(file_source: Arc<dyn FileSource>, font_dir: impl Into<PathBuf>) -> Self {
        Self {
            keys: IndexMap::new(),
            definitions: IndexMap::new(),
            families: IndexMap::new(),
            file_source,
            font_dir: font_dir.into(),
        }
    }

    /// Register a font under `family` and `style`.
    ///
    /// Registering a key that is already known returns the existing
    /// definition without touching `source`.
    pub fn register(&mut self, family: &str, style: &str, source: FontSource) -> Result<&FontDefinition> {
        let key = FontKey::new(family, style)?;
        if let Some(id) = self.keys.get(&key).cloned() {
            log::debug!("Font '{}' already registered", key);
            return self.definition(&id).ok_or_else(|| Error::FontNotFound(key.family.clone()));
        }

        let def = self.load(source)?;
        let id = def.id.clone();
        log::debug!("Registered {} font '{}' as '{}' (id {})", def.font_type, def.name, key, id);
        self.definitions.entry(id.clone()).or_insert(def);
        self.families
            .entry(key.family.clone())
            .or_default()
            .styles
            .insert(key.style, id.clone());
        self.keys.insert(key, id.clone());
        self.definition(&id).ok_or_else(|| Error::FontNotFound(id.clone()))
    }

    fn load(&self, source: FontSource) -> Result<FontDefinition> {
        match source {
            FontSource::Core(font) => Ok(FontDefinition::core(font)),
            FontSource::Utf8Bytes(bytes) => Ok(FontDefinition::from_truetype(TrueTypeFont::parse(bytes)?)),
            FontSource::Utf8File(path) => {
                let bytes = self.file_source.read_file(&self.font_path(&path))?;
                Ok(FontDefinition::from_truetype(TrueTypeFont::parse(bytes)?))
            },
            FontSource::Json { definition, program } => FontDefinition::from_json(&definition, program),
            FontSource::JsonFile(path) => {
                let path = self.font_path(&path);
                let json = self.file_source.read_file(&path)?;
                let sidecar = sidecar_name(&json)?;
                let program = match sidecar {
                    Some(name) => {
                        let dir = path.parent().unwrap_or_else(|| Path::new(""));
                        Some(self.file_source.read_file(&dir.join(name))?)
                    },
                    None => None,
                };
                FontDefinition::from_json(&json, program)
            },
        }
    }

    fn font_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.font_dir.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            self.font_dir.join(path)
        }
    }

    /// Resolve a family and style to a registered definition.
    ///
    /// Standard fonts are registered on first use. A missing style falls back
    /// to the family's Regular face.
    pub fn resolve(&mut self, family: &str, style: &str) -> Result<Resolved> {
        let (face, decoration) = normalize_style(style)?;
        let key = FontKey::normalized(family, face);

        if !self.keys.contains_key(&key) {
            if let Some(core) = CoreFont::lookup(&key.family, key.style.as_key()) {
                self.register(&key.family, key.style.as_key(), FontSource::Core(core))?;
            }
        }
        if let Some(id) = self.keys.get(&key) {
            return Ok(Resolved {
                id: id.clone(),
                key,
                fell_back: false,
                decoration,
            });
        }

        let family_entry = self
            .families
            .get(&key.family)
            .ok_or_else(|| Error::FontNotFound(key.family.clone()))?;
        match family_entry.regular() {
            Some(id) => {
                log::warn!(
                    "Font '{}' has no style '{}', using the regular face",
                    key.family,
                    key.style
                );
                Ok(Resolved {
                    id: id.to_string(),
                    key: FontKey {
                        family: key.family,
                        style: FontStyle::Regular,
                    },
                    fell_back: true,
                    decoration,
                })
            },
            None => Err(Error::StyleNotFound {
                family: key.family,
                style: key.style.as_key().to_string(),
            }),
        }
    }

    /// True when the key is registered.
    pub fn contains(&self, family: &str, style: &str) -> bool {
        FontKey::new(family, style).is_ok_and(|k| self.keys.contains_key(&k))
    }

    /// Definition by content id.
    pub fn definition(&self, id: &str) -> Option<&FontDefinition> {
        self.definitions.get(id)
    }

    /// Mutable definition by content id.
    pub fn definition_mut(&mut self, id: &str) -> Option<&mut FontDefinition> {
        self.definitions.get_mut(id)
    }

    /// Family by lowercase name.
    pub fn family(&self, name: &str) -> Option<&FontFamily> {
        self.families.get(&name.to_lowercase())
    }

    /// Distinct definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &FontDefinition> {
        self.definitions.values()
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &FontKey> {
        self.keys.keys()
    }

    /// Number of distinct definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// The `File` field of a JSON definition, if non-empty.
fn sidecar_name(json: &[u8]) -> Result<Option<String>> {
    let value: serde_json::Value = serde_json::from_slice(json)?;
    Ok(value
        .get("File")
        .and_then(|f| f.as_str())
        .filter(|f| !f.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryFileSource;

    fn catalog() -> FontCatalog {
        FontCatalog::new(Arc::new(MemoryFileSource::new()), "")
    }

    #[test]
    fn test_normalize_style() {
        assert_eq!(normalize_style("").unwrap().0, FontStyle::Regular);
        assert_eq!(normalize_style("ib").unwrap().0, FontStyle::BoldItalic);
        assert_eq!(normalize_style("Bold").unwrap().0, FontStyle::Bold);
        assert_eq!(normalize_style("semi-bold").unwrap().0, FontStyle::SemiBold);
        let (face, deco) = normalize_style("BUS").unwrap();
        assert_eq!(face, FontStyle::Bold);
        assert!(deco.underline && deco.strike_out);
        assert!(matches!(normalize_style("BX"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_key_normalization() {
        let k = FontKey::new("  Helvetica ", "IBU").unwrap();
        assert_eq!(k.family, "helvetica");
        assert_eq!(k.style, FontStyle::BoldItalic);
        assert_eq!(k.to_string(), "helveticaBI");
        assert_eq!(FontKey::new("Symbol", "B").unwrap().style, FontStyle::Regular);
    }

    #[test]
    fn test_core_fonts_register_on_first_use() {
        let mut c = catalog();
        let r = c.resolve("Arial", "B").unwrap();
        assert!(!r.fell_back);
        assert_eq!(c.definition(&r.id).unwrap().name, "Helvetica-Bold");
        // same program under a second key shares one definition
        c.resolve("helvetica", "B").unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.keys().count(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut c = catalog();
        c.register("Courier", "", FontSource::Core(CoreFont::Courier)).unwrap();
        // second source is ignored
        let def = c.register("courier", "", FontSource::Core(CoreFont::TimesRoman)).unwrap();
        assert_eq!(def.name, "Courier");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_unknown_family() {
        let mut c = catalog();
        assert!(matches!(c.resolve("NoSuchFont", ""), Err(Error::FontNotFound(_))));
    }

    #[test]
    fn test_style_fallback_to_regular() {
        let mut c = catalog();
        c.register("House", "", FontSource::Core(CoreFont::TimesRoman)).unwrap();
        let r = c.resolve("house", "I").unwrap();
        assert!(r.fell_back);
        assert_eq!(r.key.style, FontStyle::Regular);
    }

    #[test]
    fn test_style_without_regular_fails() {
        let mut c = catalog();
        c.register("House", "B", FontSource::Core(CoreFont::TimesBold)).unwrap();
        let err = c.resolve("House", "I").unwrap_err();
        assert!(matches!(err, Error::StyleNotFound { .. }));
        assert!(err.to_string().contains("no regular fallback"));
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let mut c = catalog();
        let err = c
            .register("Deja", "", FontSource::Utf8File(PathBuf::from("missing.ttf")))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
        assert!(!c.contains("Deja", ""));
    }

    #[test]
    fn test_sidecar_name() {
        assert_eq!(sidecar_name(br#"{"File":"a.z"}"#).unwrap(), Some("a.z".to_string()));
        assert_eq!(sidecar_name(br#"{"File":""}"#).unwrap(), None);
        assert_eq!(sidecar_name(b"{}").unwrap(), None);
    }
}
