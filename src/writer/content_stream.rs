//! PDF content stream operators.
//!
//! Page and template content is an append-only byte buffer. Operators are
//! rendered as soon as they are pushed, so later passes (alias replacement,
//! compression) work on plain bytes. Coordinates are written with two
//! decimals and color components with three.

use std::io::Write;
use std::str::FromStr;

use crate::error::Error;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate a matrix to the CTM (cm)
    Transform(f64, f64, f64, f64, f64, f64),
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Select font resource and size (Tf)
    SetFont(String, f64),
    /// Move text position (Td)
    MoveText(f64, f64),
    /// Show already-encoded text (Tj)
    ShowText(Vec<u8>),
    /// Set word spacing (Tw)
    SetWordSpacing(f64),
    /// Set fill color RGB (rg)
    SetFillColorRGB(f64, f64, f64),
    /// Set stroke color RGB (RG)
    SetStrokeColorRGB(f64, f64, f64),
    /// Set fill color gray (g)
    SetFillColorGray(f64),
    /// Set stroke color gray (G)
    SetStrokeColorGray(f64),
    /// Set line width (w)
    SetLineWidth(f64),
    /// Move to (m)
    MoveTo(f64, f64),
    /// Line to (l)
    LineTo(f64, f64),
    /// Curve to (c)
    CurveTo(f64, f64, f64, f64, f64, f64),
    /// Rectangle (re)
    Rectangle(f64, f64, f64, f64),
    /// Close path (h)
    ClosePath,
    /// Stroke (S)
    Stroke,
    /// Fill (f)
    Fill,
    /// Fill and stroke (B)
    FillStroke,
    /// End path without filling/stroking (n)
    EndPath,
    /// Clip using non-zero winding rule (W)
    Clip,
    /// Paint XObject (Do)
    PaintXObject(String),
    /// Set graphics state from ExtGState dictionary (gs)
    SetExtGState(String),
    /// Set fill color space (cs)
    SetFillColorSpace(String),
    /// Set stroke color space (CS)
    SetStrokeColorSpace(String),
    /// Set fill color in current color space (scn)
    SetFillColorN(Vec<f64>),
    /// Set stroke color in current color space (SCN)
    SetStrokeColorN(Vec<f64>),
    /// Paint shading (sh)
    PaintShading(String),
    /// Set line cap style (J)
    SetLineCap(LineCap),
    /// Set line join style (j)
    SetLineJoin(LineJoin),
    /// Set dash pattern (d)
    SetDashPattern(Vec<f64>, f64),
}

/// Line cap styles for path stroking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineCap {
    /// Square butt cap (default)
    #[default]
    Butt = 0,
    /// Round cap
    Round = 1,
    /// Projecting square cap
    Square = 2,
}

/// Line join styles for path stroking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineJoin {
    /// Miter join (default)
    #[default]
    Miter = 0,
    /// Round join
    Round = 1,
    /// Bevel join
    Bevel = 2,
}

impl FromStr for LineCap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "butt" | "" => Ok(LineCap::Butt),
            "round" => Ok(LineCap::Round),
            "square" => Ok(LineCap::Square),
            other => Err(Error::InvalidConfig(format!("unknown line cap style '{}'", other))),
        }
    }
}

impl FromStr for LineJoin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "miter" | "" => Ok(LineJoin::Miter),
            "round" => Ok(LineJoin::Round),
            "bevel" => Ok(LineJoin::Bevel),
            other => Err(Error::InvalidConfig(format!("unknown line join style '{}'", other))),
        }
    }
}

/// Append-only content stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentStream {
    buf: Vec<u8>,
}

impl ContentStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render an operation and terminate it with a newline.
    pub fn push(&mut self, op: ContentStreamOp) -> &mut Self {
        // writing into a Vec cannot fail
        let _ = write_op(&mut self.buf, &op);
        self.buf.push(b'\n');
        self
    }

    /// Render several operations.
    pub fn extend(&mut self, ops: impl IntoIterator<Item = ContentStreamOp>) -> &mut Self {
        for op in ops {
            self.push(op);
        }
        self
    }

    /// Append raw bytes followed by a newline.
    pub fn raw(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.buf.extend_from_slice(bytes.as_ref());
        self.buf.push(b'\n');
        self
    }

    /// Rendered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the stream.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes rendered so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing was rendered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Write a single operation.
pub fn write_op<W: Write>(w: &mut W, op: &ContentStreamOp) -> std::io::Result<()> {
    match op {
        ContentStreamOp::SaveState => write!(w, "q"),
        ContentStreamOp::RestoreState => write!(w, "Q"),
        ContentStreamOp::Transform(a, b, c, d, e, f) => {
            write!(w, "{:.5} {:.5} {:.5} {:.5} {:.5} {:.5} cm", a, b, c, d, e, f)
        },
        ContentStreamOp::BeginText => write!(w, "BT"),
        ContentStreamOp::EndText => write!(w, "ET"),
        ContentStreamOp::SetFont(name, size) => write!(w, "/{} {:.2} Tf", name, size),
        ContentStreamOp::MoveText(tx, ty) => write!(w, "{:.2} {:.2} Td", tx, ty),
        ContentStreamOp::ShowText(text) => {
            write!(w, "(")?;
            write_escaped(w, text)?;
            write!(w, ") Tj")
        },
        ContentStreamOp::SetWordSpacing(spacing) => write!(w, "{:.3} Tw", spacing),
        ContentStreamOp::SetFillColorRGB(r, g, b) => write!(w, "{:.3} {:.3} {:.3} rg", r, g, b),
        ContentStreamOp::SetStrokeColorRGB(r, g, b) => write!(w, "{:.3} {:.3} {:.3} RG", r, g, b),
        ContentStreamOp::SetFillColorGray(g) => write!(w, "{:.3} g", g),
        ContentStreamOp::SetStrokeColorGray(g) => write!(w, "{:.3} G", g),
        ContentStreamOp::SetLineWidth(width) => write!(w, "{:.2} w", width),
        ContentStreamOp::MoveTo(x, y) => write!(w, "{:.2} {:.2} m", x, y),
        ContentStreamOp::LineTo(x, y) => write!(w, "{:.2} {:.2} l", x, y),
        ContentStreamOp::CurveTo(x1, y1, x2, y2, x3, y3) => {
            write!(w, "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c", x1, y1, x2, y2, x3, y3)
        },
        ContentStreamOp::Rectangle(x, y, width, height) => {
            write!(w, "{:.2} {:.2} {:.2} {:.2} re", x, y, width, height)
        },
        ContentStreamOp::ClosePath => write!(w, "h"),
        ContentStreamOp::Stroke => write!(w, "S"),
        ContentStreamOp::Fill => write!(w, "f"),
        ContentStreamOp::FillStroke => write!(w, "B"),
        ContentStreamOp::EndPath => write!(w, "n"),
        ContentStreamOp::Clip => write!(w, "W"),
        ContentStreamOp::PaintXObject(name) => write!(w, "/{} Do", name),
        ContentStreamOp::SetExtGState(name) => write!(w, "/{} gs", name),
        ContentStreamOp::SetFillColorSpace(name) => write!(w, "/{} cs", name),
        ContentStreamOp::SetStrokeColorSpace(name) => write!(w, "/{} CS", name),
        ContentStreamOp::SetFillColorN(components) => {
            for c in components {
                write!(w, "{:.3} ", c)?;
            }
            write!(w, "scn")
        },
        ContentStreamOp::SetStrokeColorN(components) => {
            for c in components {
                write!(w, "{:.3} ", c)?;
            }
            write!(w, "SCN")
        },
        ContentStreamOp::PaintShading(name) => write!(w, "/{} sh", name),
        ContentStreamOp::SetLineCap(cap) => write!(w, "{} J", *cap as u8),
        ContentStreamOp::SetLineJoin(join) => write!(w, "{} j", *join as u8),
        ContentStreamOp::SetDashPattern(pattern, phase) => {
            write!(w, "[")?;
            for (i, p) in pattern.iter().enumerate() {
                if i > 0 {
                    write!(w, " ")?;
                }
                write!(w, "{:.2}", p)?;
            }
            write!(w, "] {:.2} d", phase)
        },
    }
}

/// Escape a string operand.
pub fn write_escaped<W: Write>(w: &mut W, text: &[u8]) -> std::io::Result<()> {
    for &byte in text {
        match byte {
            b'(' => write!(w, "\\(")?,
            b')' => write!(w, "\\)")?,
            b'\\' => write!(w, "\\\\")?,
            b'\r' => write!(w, "\\r")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}

/// Escaped copy of a string operand.
pub fn escape(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let _ = write_escaped(&mut out, text);
    out
}
