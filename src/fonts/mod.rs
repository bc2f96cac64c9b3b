//! Fonts: TrueType parsing, subsetting and the font catalog.
//!
//! ```text
//! TrueType bytes
//!     ↓
//! [TrueTypeFont] (table directory, metrics, cmap)
//!     ↓
//! [FontCatalog] (family + style → FontDefinition, used code points)
//!     ↓
//! [FontSubsetBuilder] (subset program, CIDToGIDMap, /W, ToUnicode)
//! ```

pub mod catalog;
pub mod cmap;
pub mod core_fonts;
pub mod cursor;
pub mod encoding;
pub mod font_definition;
pub mod font_subsetter;
pub mod truetype_parser;
pub mod width_ranges;

pub use catalog::{
    normalize_style, FontCatalog, FontFamily, FontKey, FontSource, FontStyle, Resolved,
    TextDecoration,
};
pub use cmap::{build_to_unicode_cmap, identity_to_unicode_cmap};
pub use core_fonts::CoreFont;
pub use cursor::BinaryCursor;
pub use font_definition::{FontBBox, FontDefinition, FontDescriptor, FontFlags, FontType, Utf8Font};
pub use font_subsetter::{FontSubset, FontSubsetBuilder, SfntBuilder};
pub use truetype_parser::{FontMetrics, TableRecord, TrueTypeFont};
pub use width_ranges::{coalesce_widths, decode_widths, widths_to_object, WidthEntry};
