//! Shading (gradient) support for PDF generation.
//!
//! Gradients run between two RGB colors:
//! - Linear gradients (Type 2 - Axial)
//! - Radial gradients (Type 3 - Radial)
//!
//! Coordinates are fractions of the painted rectangle; the page content maps
//! the unit square onto that rectangle with `cm` before painting `sh`.
//!
//! # Example
//!
//! ```ignore
//! use pdf_forge::writer::shading::Gradient;
//! use pdf_forge::writer::RgbColor;
//!
//! let gradient = Gradient::linear(RgbColor::new(255, 0, 0), RgbColor::WHITE)
//!     .axis(0.0, 0.0, 1.0, 0.0);
//! ```

use crate::object::{dict, Dict, Object, ObjectRef};

use super::graphics_state::RgbColor;

/// Geometry of a gradient in unit-square coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    /// Axial shading along `(x1, y1) → (x2, y2)`
    Linear {
        /// Start x
        x1: f64,
        /// Start y
        y1: f64,
        /// End x
        x2: f64,
        /// End y
        y2: f64,
    },
    /// Radial shading from a focal point to a circle
    Radial {
        /// Focal x
        fx: f64,
        /// Focal y
        fy: f64,
        /// Center x
        cx: f64,
        /// Center y
        cy: f64,
        /// Outer radius
        r: f64,
    },
}

/// A two-color gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// Geometry
    pub kind: GradientKind,
    /// Color at the start of the axis (or the focal point)
    pub from: RgbColor,
    /// Color at the end of the axis (or the outer circle)
    pub to: RgbColor,
}

impl Gradient {
    /// Left-to-right linear gradient.
    pub fn linear(from: RgbColor, to: RgbColor) -> Self {
        Self {
            kind: GradientKind::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 0.0,
            },
            from,
            to,
        }
    }

    /// Radial gradient centered in the unit square.
    pub fn radial(from: RgbColor, to: RgbColor) -> Self {
        Self {
            kind: GradientKind::Radial {
                fx: 0.5,
                fy: 0.5,
                cx: 0.5,
                cy: 0.5,
                r: 1.0,
            },
            from,
            to,
        }
    }

    /// Set the axis of a linear gradient. Ignored for radial gradients.
    pub fn axis(mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        if let GradientKind::Linear { .. } = self.kind {
            self.kind = GradientKind::Linear { x1, y1, x2, y2 };
        }
        self
    }

    /// Set focal point, center and radius of a radial gradient.
    /// Ignored for linear gradients.
    pub fn circle(mut self, fx: f64, fy: f64, cx: f64, cy: f64, r: f64) -> Self {
        if let GradientKind::Radial { .. } = self.kind {
            self.kind = GradientKind::Radial { fx, fy, cx, cy, r };
        }
        self
    }

    /// Exponential interpolation function (Type 2) between the two colors.
    pub fn function_dict(&self) -> Dict {
        dict([
            ("FunctionType", Object::Integer(2)),
            ("Domain", Object::reals(&[0.0, 1.0])),
            ("C0", Object::reals(&self.from.components())),
            ("C1", Object::reals(&self.to.components())),
            ("N", Object::Integer(1)),
        ])
    }

    /// Shading dictionary referencing the written function object.
    pub fn shading_dict(&self, function: ObjectRef) -> Dict {
        let (shading_type, coords) = match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => (2, Object::reals(&[x1, y1, x2, y2])),
            GradientKind::Radial { fx, fy, cx, cy, r } => {
                (3, Object::reals(&[fx, fy, 0.0, cx, cy, r]))
            },
        };
        dict([
            ("ShadingType", Object::Integer(shading_type)),
            ("ColorSpace", Object::name("DeviceRGB")),
            ("Coords", coords),
            ("Function", Object::Reference(function)),
            ("Extend", Object::Array(vec![Object::Boolean(true), Object::Boolean(true)])),
        ])
    }
}

/// Gradients in the order they were painted.
#[derive(Debug, Clone, Default)]
pub struct GradientTable {
    gradients: Vec<Gradient>,
}

impl GradientTable {
    /// Add a gradient, returning its 1-based index. Every paint adds a new entry.
    pub fn push(&mut self, gradient: Gradient) -> usize {
        self.gradients.push(gradient);
        self.gradients.len()
    }

    /// Resource name of an index.
    pub fn resource_name(index: usize) -> String {
        format!("Sh{}", index)
    }

    /// Gradients with their 1-based index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Gradient)> {
        self.gradients.iter().enumerate().map(|(i, g)| (i + 1, g))
    }

    /// Number of gradients.
    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    /// True when nothing was painted with a gradient.
    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ObjectSerializer;

    #[test]
    fn test_linear_gradient() {
        let g = Gradient::linear(RgbColor::new(255, 0, 0), RgbColor::WHITE).axis(0.0, 0.0, 0.0, 1.0);
        let s = ObjectSerializer::compact();
        let f = s.serialize_to_string(&Object::Dictionary(g.function_dict()));
        assert_eq!(f, "<</FunctionType 2 /Domain [0 1] /C0 [1 0 0] /C1 [1 1 1] /N 1>>");

        let sh = s.serialize_to_string(&Object::Dictionary(g.shading_dict(ObjectRef::new(9, 0))));
        assert!(sh.starts_with("<</ShadingType 2 /ColorSpace /DeviceRGB /Coords [0 0 0 1]"));
        assert!(sh.contains("/Function 9 0 R"));
        assert!(sh.ends_with("/Extend [true true]>>"));
    }

    #[test]
    fn test_radial_gradient() {
        let g = Gradient::radial(RgbColor::BLACK, RgbColor::WHITE).circle(0.25, 0.75, 0.5, 0.5, 1.0);
        let sh = ObjectSerializer::compact()
            .serialize_to_string(&Object::Dictionary(g.shading_dict(ObjectRef::new(3, 0))));
        assert!(sh.contains("/ShadingType 3"));
        assert!(sh.contains("/Coords [0.25 0.75 0 0.5 0.5 1]"));
    }

    #[test]
    fn test_axis_ignored_for_radial() {
        let g = Gradient::radial(RgbColor::BLACK, RgbColor::WHITE).axis(1.0, 1.0, 1.0, 1.0);
        assert!(matches!(g.kind, GradientKind::Radial { .. }));
    }

    #[test]
    fn test_table_numbering() {
        let mut table = GradientTable::default();
        let g = Gradient::linear(RgbColor::BLACK, RgbColor::WHITE);
        assert_eq!(table.push(g.clone()), 1);
        assert_eq!(table.push(g), 2);
        assert_eq!(GradientTable::resource_name(2), "Sh2");
        assert_eq!(table.iter().map(|(i, _)| i).collect::<Vec<_>>(), vec![1, 2]);
    }
}
