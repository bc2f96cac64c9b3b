// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::should_implement_trait)]

//! # PDF Forge
//!
//! PDF document generation in Rust.
//!
//! ## Core Features
//!
//! ### Document Building
//! - **Pages**: standard and custom sizes, portrait/landscape per page, page boxes
//! - **Text**: `text`, `cell`, flowing `write` with wrapping and automatic page breaks
//! - **Graphics**: lines, rectangles, ellipses, Bezier curves, clipping, transformations
//! - **Color**: RGB, spot colors with CMYK alternates, alpha and blend modes, gradients
//! - **Images**: PNG (palette, alpha, 16-bit) and JPEG, deduplicated by content
//! - **Navigation**: internal and URL links, nested bookmarks, display mode
//! - **Attachments**: document-level embedded files and file attachment annotations
//! - **Templates**: reusable form XObjects
//!
//! ### Fonts
//! - **Standard 14**: built-in cp1252 metrics, registered on first use
//! - **TrueType/UTF-8**: parsed tables, glyph subsetting, CIDFontType2 embedding
//!   with `/W` range coalescing and a ToUnicode CMap
//! - **Precompiled definitions**: JSON metrics plus a zlib program sidecar
//!
//! ### Output
//! - Exact cross-reference table and trailer
//! - Per-stream Flate compression
//! - 40-bit RC4 protection with permission flags
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_forge::Document;
//!
//! # fn main() -> pdf_forge::Result<()> {
//! let mut doc = Document::create("P", "mm", "A4", "")?;
//! doc.alias_nb_pages("");
//! doc.add_page()?;
//! doc.set_font("Helvetica", "B", 16.0)?;
//! doc.cell(40.0, 10.0, "Hello, World!")?;
//! doc.ln(12.0);
//! doc.set_font("Times", "", 12.0)?;
//! doc.write(6.0, "Page 1 of {nb}")?;
//! doc.output_file("hello.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! Unicode text needs an embedded TrueType font:
//!
//! ```ignore
//! doc.add_utf8_font("dejavu", "", "DejaVuSans.ttf")?;
//! doc.set_font("dejavu", "", 14.0)?;
//! doc.cell(0.0, 10.0, "Grüße, Καλημέρα")?;
//! ```
//!
//! ## Error model
//!
//! The first failing call puts the [`Document`] into a sticky error state.
//! Every later mutation is skipped and returns the same error, and
//! [`Document::output`] writes nothing until [`Document::clear_error`].

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Object model
pub mod object;

// Encryption support
pub mod encryption;

// Font parsing, subsetting and registry
pub mod fonts;

// PDF writing
pub mod writer;

// Document builder
pub mod document;

// Internal utilities
pub mod utils;

pub use config::{DocumentConfig, FileSource, MemoryFileSource, NativeFileSource, Orientation, PageSize, Unit};
pub use document::{Document, DocumentInfo, DrawStyle, ImageOptions, LayoutMode, Protection, ZoomMode};
pub use encryption::Permissions;
pub use error::{Error, Result};
pub use fonts::{FontCatalog, FontDefinition, FontSource, FontType, TrueTypeFont};
pub use writer::{Attachment, Gradient, ImageFetcher, ImageInfo, ImageType, RgbColor};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is populated from CARGO_PKG_VERSION at compile time
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_forge");
    }

    #[test]
    fn test_default_producer() {
        let info = DocumentInfo::default();
        assert_eq!(info.producer, format!("pdf_forge {}", VERSION));
    }
}
