//! Colors and Extended Graphics State (ExtGState).
//!
//! Each distinct alpha/blend-mode pair is registered once and named
//! `/GS<n>` in the page resources. Spot colors are Separation color spaces
//! with a CMYK alternate, named `/CS<n>`.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use super::content_stream::ContentStreamOp;
use crate::error::{Error, Result};
use crate::object::{dict, Dict, Object};

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RgbColor {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl RgbColor {
    /// Black
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);
    /// White
    pub const WHITE: RgbColor = RgbColor::new(255, 255, 255);

    /// Create a color.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Gray level.
    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level)
    }

    /// Components scaled to 0..=1.
    pub fn components(&self) -> [f64; 3] {
        [self.r as f64 / 255.0, self.g as f64 / 255.0, self.b as f64 / 255.0]
    }

    fn is_gray(&self) -> bool {
        self.r == self.g && self.g == self.b
    }

    /// Nonstroking color operator (`g` for grays, `rg` otherwise).
    pub fn fill_op(&self) -> ContentStreamOp {
        let [r, g, b] = self.components();
        if self.is_gray() {
            ContentStreamOp::SetFillColorGray(r)
        } else {
            ContentStreamOp::SetFillColorRGB(r, g, b)
        }
    }

    /// Stroking color operator (`G` for grays, `RG` otherwise).
    pub fn stroke_op(&self) -> ContentStreamOp {
        let [r, g, b] = self.components();
        if self.is_gray() {
            ContentStreamOp::SetStrokeColorGray(r)
        } else {
            ContentStreamOp::SetStrokeColorRGB(r, g, b)
        }
    }
}

/// A named ink with its CMYK equivalent, components in percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotColor {
    /// Ink name
    pub name: String,
    /// Cyan, 0..=100
    pub c: u8,
    /// Magenta, 0..=100
    pub m: u8,
    /// Yellow, 0..=100
    pub y: u8,
    /// Black, 0..=100
    pub k: u8,
}

impl SpotColor {
    /// Validate and build a spot color.
    pub fn new(name: &str, c: u8, m: u8, y: u8, k: u8) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidConfig("spot color name is empty".into()));
        }
        if [c, m, y, k].iter().any(|v| *v > 100) {
            return Err(Error::InvalidConfig(format!(
                "spot color '{}' components must be percentages",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            c,
            m,
            y,
            k,
        })
    }

    /// The `[/Separation name /DeviceCMYK fn]` color space.
    pub fn color_space(&self) -> Object {
        let cmyk: Vec<f64> = [self.c, self.m, self.y, self.k]
            .iter()
            .map(|v| *v as f64 / 100.0)
            .collect();
        let tint = dict([
            ("FunctionType", Object::Integer(2)),
            ("Domain", Object::reals(&[0.0, 1.0])),
            ("Range", Object::reals(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0])),
            ("C0", Object::reals(&[0.0, 0.0, 0.0, 0.0])),
            ("C1", Object::reals(&cmyk)),
            ("N", Object::Integer(1)),
        ]);
        Object::Array(vec![
            Object::name("Separation"),
            Object::name(self.name.clone()),
            Object::name("DeviceCMYK"),
            Object::Dictionary(tint),
        ])
    }
}

/// Spot colors by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SpotColorTable {
    colors: IndexMap<String, SpotColor>,
}

impl SpotColorTable {
    /// Register a spot color. A known name keeps its first definition.
    pub fn register(&mut self, color: SpotColor) -> usize {
        let index = match self.colors.get_index_of(&color.name) {
            Some(i) => i,
            None => self.colors.insert_full(color.name.clone(), color).0,
        };
        index + 1
    }

    /// 1-based index of a registered name.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.colors
            .get_index_of(name)
            .map(|i| i + 1)
            .ok_or_else(|| Error::SpotColorNotFound(name.to_string()))
    }

    /// Resource name of an index.
    pub fn resource_name(index: usize) -> String {
        format!("CS{}", index)
    }

    /// Colors with their 1-based index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SpotColor)> {
        self.colors.values().enumerate().map(|(i, c)| (i + 1, c))
    }

    /// Number of colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// True when no color is registered.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Separable and non-separable blend modes (PDF 32000-1, 11.3.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Normal blend (default)
    #[default]
    Normal,
    /// Multiply
    Multiply,
    /// Screen
    Screen,
    /// Overlay
    Overlay,
    /// Darken
    Darken,
    /// Lighten
    Lighten,
    /// Color dodge
    ColorDodge,
    /// Color burn
    ColorBurn,
    /// Hard light
    HardLight,
    /// Soft light
    SoftLight,
    /// Difference
    Difference,
    /// Exclusion
    Exclusion,
    /// Hue
    Hue,
    /// Saturation
    Saturation,
    /// Color
    Color,
    /// Luminosity
    Luminosity,
}

impl BlendMode {
    /// Every blend mode, in the order of the PDF reference.
    pub const ALL: [BlendMode; 16] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Hue,
        BlendMode::Saturation,
        BlendMode::Color,
        BlendMode::Luminosity,
    ];

    /// Get the PDF name for this blend mode.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::ColorDodge => "ColorDodge",
            BlendMode::ColorBurn => "ColorBurn",
            BlendMode::HardLight => "HardLight",
            BlendMode::SoftLight => "SoftLight",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::Hue => "Hue",
            BlendMode::Saturation => "Saturation",
            BlendMode::Color => "Color",
            BlendMode::Luminosity => "Luminosity",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pdf_name())
    }
}

impl FromStr for BlendMode {
    type Err = Error;

    /// Case-insensitive; an empty string means Normal.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(BlendMode::Normal);
        }
        BlendMode::ALL
            .into_iter()
            .find(|m| m.as_pdf_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown blend mode '{}'", s)))
    }
}

/// One transparency state: the same alpha for fill and stroke plus a blend
/// mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtGState {
    /// Constant alpha, 0.0 (transparent) to 1.0 (opaque)
    pub alpha: f64,
    /// Blend mode
    pub blend_mode: BlendMode,
}

impl ExtGState {
    /// Validate and build a state.
    pub fn new(alpha: f64, blend_mode: BlendMode) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig(format!("alpha value {} is outside [0, 1]", alpha)));
        }
        Ok(Self { alpha, blend_mode })
    }

    /// The ExtGState dictionary.
    pub fn to_dict(&self) -> Dict {
        dict([
            ("Type", Object::name("ExtGState")),
            ("ca", Object::Real(self.alpha)),
            ("CA", Object::Real(self.alpha)),
            ("BM", Object::name(self.blend_mode.as_pdf_name())),
        ])
    }

    fn key(&self) -> (u64, BlendMode) {
        (self.alpha.to_bits(), self.blend_mode)
    }
}

/// Registered ExtGStates in first-use order.
#[derive(Debug, Clone, Default)]
pub struct BlendStateTable {
    states: IndexMap<(u64, BlendMode), ExtGState>,
}

impl BlendStateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state, returning its 1-based index. Equal states share an
    /// index.
    pub fn register(&mut self, state: ExtGState) -> usize {
        let (index, _) = self.states.insert_full(state.key(), state);
        index + 1
    }

    /// Resource name of an index.
    pub fn resource_name(index: usize) -> String {
        format!("GS{}", index)
    }

    /// States with their 1-based index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ExtGState)> {
        self.states.values().enumerate().map(|(i, s)| (i + 1, s))
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when no state is registered.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ObjectSerializer;

    #[test]
    fn test_blend_mode_parse() {
        assert_eq!("multiply".parse::<BlendMode>().unwrap(), BlendMode::Multiply);
        assert_eq!("ColorDodge".parse::<BlendMode>().unwrap(), BlendMode::ColorDodge);
        assert_eq!("".parse::<BlendMode>().unwrap(), BlendMode::Normal);
        assert!(matches!("Glow".parse::<BlendMode>(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_alpha_range() {
        assert!(ExtGState::new(0.0, BlendMode::Normal).is_ok());
        assert!(ExtGState::new(1.0, BlendMode::Normal).is_ok());
        assert!(ExtGState::new(1.01, BlendMode::Normal).is_err());
        assert!(ExtGState::new(-0.1, BlendMode::Normal).is_err());
        assert!(ExtGState::new(f64::NAN, BlendMode::Normal).is_err());
    }

    #[test]
    fn test_registration_dedups() {
        let mut table = BlendStateTable::new();
        let a = table.register(ExtGState::new(0.5, BlendMode::Multiply).unwrap());
        let b = table.register(ExtGState::new(0.5, BlendMode::Normal).unwrap());
        let c = table.register(ExtGState::new(0.5, BlendMode::Multiply).unwrap());
        assert_eq!((a, b, c), (1, 2, 1));
        assert_eq!(table.len(), 2);
        assert_eq!(BlendStateTable::resource_name(b), "GS2");
    }

    #[test]
    fn test_color_operators() {
        assert_eq!(RgbColor::gray(0).fill_op(), ContentStreamOp::SetFillColorGray(0.0));
        assert_eq!(
            RgbColor::new(255, 0, 0).stroke_op(),
            ContentStreamOp::SetStrokeColorRGB(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_spot_colors() {
        let mut table = SpotColorTable::default();
        assert_eq!(table.register(SpotColor::new("PANTONE 145 CVC", 0, 42, 100, 25).unwrap()), 1);
        assert_eq!(table.register(SpotColor::new("Silver", 0, 0, 0, 30).unwrap()), 2);
        assert_eq!(table.register(SpotColor::new("Silver", 9, 9, 9, 9).unwrap()), 2);
        assert_eq!(table.index_of("Silver").unwrap(), 2);
        assert!(matches!(table.index_of("Gold"), Err(Error::SpotColorNotFound(_))));
        assert!(SpotColor::new("Bad", 101, 0, 0, 0).is_err());

        let cs = SpotColor::new("PANTONE 145 CVC", 0, 42, 100, 25).unwrap().color_space();
        let s = ObjectSerializer::compact().serialize_to_string(&cs);
        assert!(s.starts_with("[/Separation /PANTONE#20145#20CVC /DeviceCMYK <<"));
        assert!(s.contains("/C1 [0 0.42 1 0.25]"));
    }

    #[test]
    fn test_dict() {
        let d = ExtGState::new(0.25, BlendMode::Screen).unwrap().to_dict();
        let s = ObjectSerializer::compact().serialize_to_string(&Object::Dictionary(d));
        assert_eq!(s, "<</Type /ExtGState /ca 0.25 /CA 0.25 /BM /Screen>>");
    }
}
