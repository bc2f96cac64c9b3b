//! Configuration for document generation.
//!
//! [`DocumentConfig`] collects the construction-time defaults of a document
//! (orientation, unit, page size, compression, font directory) together with
//! the [`FileSource`] capability used to load fonts and images. Nothing here
//! is global: every document carries its own configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Portrait (height > width)
    #[default]
    Portrait,
    /// Landscape (width > height)
    Landscape,
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "portrait" | "" => Ok(Orientation::Portrait),
            "l" | "landscape" => Ok(Orientation::Landscape),
            _ => Err(Error::InvalidConfig(format!("incorrect orientation: {}", s))),
        }
    }
}

/// User unit used by every coordinate passed to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// PostScript point (1/72 inch)
    Point,
    /// Millimeter
    #[default]
    Millimeter,
    /// Centimeter
    Centimeter,
    /// Inch
    Inch,
}

impl Unit {
    /// Scale factor: number of points in one user unit.
    pub fn scale_factor(self) -> f64 {
        match self {
            Unit::Point => 1.0,
            Unit::Millimeter => 72.0 / 25.4,
            Unit::Centimeter => 72.0 / 2.54,
            Unit::Inch => 72.0,
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pt" | "point" => Ok(Unit::Point),
            "mm" | "" => Ok(Unit::Millimeter),
            "cm" => Ok(Unit::Centimeter),
            "in" | "inch" => Ok(Unit::Inch),
            _ => Err(Error::InvalidConfig(format!("incorrect unit: {}", s))),
        }
    }
}

/// Page dimensions in points, portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
}

impl PageSize {
    /// ISO A3
    pub const A3: PageSize = PageSize::new(841.89, 1190.55);
    /// ISO A4
    pub const A4: PageSize = PageSize::new(595.28, 841.89);
    /// ISO A5
    pub const A5: PageSize = PageSize::new(420.94, 595.28);
    /// ISO A6
    pub const A6: PageSize = PageSize::new(297.64, 420.94);
    /// US Letter
    pub const LETTER: PageSize = PageSize::new(612.0, 792.0);
    /// US Legal
    pub const LEGAL: PageSize = PageSize::new(612.0, 1008.0);
    /// US Tabloid
    pub const TABLOID: PageSize = PageSize::new(792.0, 1224.0);

    /// Page size from explicit point dimensions.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Page size from dimensions expressed in `unit`.
    pub fn from_units(width: f64, height: f64, unit: Unit) -> Self {
        let k = unit.scale_factor();
        Self::new(width * k, height * k)
    }

    /// Dimensions after applying an orientation.
    pub fn oriented(self, orientation: Orientation) -> (f64, f64) {
        match orientation {
            Orientation::Portrait => (self.width, self.height),
            Orientation::Landscape => (self.height, self.width),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::A4
    }
}

impl FromStr for PageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" | "" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "a6" => Ok(PageSize::A6),
            "letter" => Ok(PageSize::LETTER),
            "legal" => Ok(PageSize::LEGAL),
            "tabloid" => Ok(PageSize::TABLOID),
            _ => Err(Error::InvalidConfig(format!("unknown page size: {}", s))),
        }
    }
}

/// Byte source for font programs and images.
///
/// Implementations must report a missing file as [`Error::FileNotFound`] and
/// any other failure as [`Error::Io`] carrying the path.
pub trait FileSource: Send + Sync {
    /// Read the whole file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
}

fn map_io(op: &str, path: &Path, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound(path.display().to_string())
    } else {
        Error::io_context(op, &path.display().to_string(), err)
    }
}

/// File source backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileSource;

impl FileSource for NativeFileSource {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io("read", path, e))
    }
}

/// In-memory file source, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSource {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFileSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.insert(path.into(), data);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_file(mut self, path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }
}

impl FileSource for MemoryFileSource {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.display().to_string()))
    }
}

/// Document generation configuration.
#[derive(Clone)]
pub struct DocumentConfig {
    /// Default page orientation.
    pub orientation: Orientation,

    /// User unit.
    pub unit: Unit,

    /// Default page size.
    pub page_size: PageSize,

    /// Directory searched for font files given by bare name.
    pub font_dir: PathBuf,

    /// Deflate page content and other streams.
    pub compression: bool,

    /// Sort resource dictionaries by key for reproducible output.
    pub catalog_sort: bool,

    /// Minimum PDF version written in the header.
    pub pdf_version: String,

    /// Byte source for fonts and images.
    pub file_source: Arc<dyn FileSource>,
}

impl fmt::Debug for DocumentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentConfig")
            .field("orientation", &self.orientation)
            .field("unit", &self.unit)
            .field("page_size", &self.page_size)
            .field("font_dir", &self.font_dir)
            .field("compression", &self.compression)
            .field("catalog_sort", &self.catalog_sort)
            .field("pdf_version", &self.pdf_version)
            .finish_non_exhaustive()
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConfig {
    /// Create new configuration with defaults (portrait, mm, A4, compressed).
    pub fn new() -> Self {
        Self {
            orientation: Orientation::Portrait,
            unit: Unit::Millimeter,
            page_size: PageSize::A4,
            font_dir: PathBuf::from("."),
            compression: true,
            catalog_sort: false,
            pdf_version: "1.3".to_string(),
            file_source: Arc::new(NativeFileSource),
        }
    }

    /// Set the default orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the user unit.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the default page size.
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the font directory.
    pub fn with_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_dir = dir.into();
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, enable: bool) -> Self {
        self.compression = enable;
        self
    }

    /// Enable or disable sorted resource dictionaries.
    pub fn with_catalog_sort(mut self, enable: bool) -> Self {
        self.catalog_sort = enable;
        self
    }

    /// Set the minimum PDF version.
    pub fn with_pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Set the file source.
    pub fn with_file_source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.file_source = source;
        self
    }

    /// Check the values that cannot be expressed by the type system.
    pub fn validate(&self) -> Result<()> {
        if self.page_size.width <= 0.0 || self.page_size.height <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "page size must be positive, got {}x{}",
                self.page_size.width, self.page_size.height
            )));
        }
        let valid_version = self
            .pdf_version
            .split_once('.')
            .map(|(a, b)| a == "1" && b.len() == 1 && b.bytes().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if !valid_version {
            return Err(Error::InvalidConfig(format!(
                "unsupported PDF version: {}",
                self.pdf_version
            )));
        }
        Ok(())
    }
}
