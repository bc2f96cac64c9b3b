//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! PDF specification ISO 32000-1:2008. Dictionaries are written in insertion
//! order. When an encryption handler is supplied, every string and stream
//! payload inside an indirect object is encrypted with that object's key.

use std::io::Write;

use crate::encryption::EncryptionWriteHandler;
use crate::object::{Dict, Object, ObjectRef};

/// Key material for the object currently being written.
#[derive(Clone, Copy)]
struct Crypt<'a> {
    handler: &'a EncryptionWriteHandler,
    id: u32,
    gen: u16,
}

impl Crypt<'_> {
    fn apply(&self, data: &[u8]) -> Vec<u8> {
        self.handler.encrypt(data, self.id, self.gen)
    }
}

/// Serializer for PDF objects.
///
/// Converts PDF Object types to their byte representation following
/// the PDF specification syntax rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (single-line dictionaries)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_value(&mut buf, obj, None);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// Write an object.
    pub fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        self.write_value(w, obj, None)
    }

    /// Write an indirect object definition, encrypting its payloads when a
    /// handler is given.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn write_indirect<W: Write>(
        &self,
        w: &mut W,
        r: ObjectRef,
        obj: &Object,
        handler: Option<&EncryptionWriteHandler>,
    ) -> std::io::Result<()> {
        let crypt = handler.map(|handler| Crypt {
            handler,
            id: r.id,
            gen: r.gen,
        });
        writeln!(w, "{} {} obj", r.id, r.gen)?;
        self.write_value(w, obj, crypt)?;
        write!(w, "\nendobj\n")
    }

    fn write_value<W: Write>(&self, w: &mut W, obj: &Object, crypt: Option<Crypt<'_>>) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => write_real(w, *r),
            Object::String(s) => match crypt {
                Some(c) => write_hex(w, &c.apply(s)),
                None => write_string(w, s),
            },
            Object::HexString(s) => match crypt {
                Some(c) => write_hex(w, &c.apply(s)),
                None => write_hex(w, s),
            },
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr, crypt),
            Object::Dictionary(dict) => self.write_dictionary(w, dict, crypt),
            Object::Stream { dict, data } => self.write_stream(w, dict, data, crypt),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    /// Write a PDF array.
    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object], crypt: Option<Crypt<'_>>) -> std::io::Result<()> {
        write!(w, "[")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_value(w, obj, crypt)?;
        }
        write!(w, "]")
    }

    /// Write a PDF dictionary.
    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dict, crypt: Option<Crypt<'_>>) -> std::io::Result<()> {
        write!(w, "<<")?;
        for (i, (key, value)) in dict.iter().enumerate() {
            if !self.compact {
                write!(w, "\n  ")?;
            } else if i > 0 {
                write!(w, " ")?;
            }
            write_name(w, key)?;
            write!(w, " ")?;
            self.write_value(w, value, crypt)?;
        }
        if !self.compact && !dict.is_empty() {
            writeln!(w)?;
        }
        write!(w, ">>")
    }

    /// Write a PDF stream. `/Length` always reflects the bytes written.
    fn write_stream<W: Write>(
        &self,
        w: &mut W,
        dict: &Dict,
        data: &[u8],
        crypt: Option<Crypt<'_>>,
    ) -> std::io::Result<()> {
        let payload = match crypt {
            Some(c) => c.apply(data),
            None => data.to_vec(),
        };
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(payload.len() as i64));

        self.write_dictionary(w, &dict, crypt)?;
        write!(w, "\nstream\n")?;
        w.write_all(&payload)?;
        write!(w, "\nendstream")
    }
}

/// Write a real number, trimming trailing zeros.
fn write_real<W: Write>(w: &mut W, value: f64) -> std::io::Result<()> {
    if value.fract() == 0.0 {
        write!(w, "{}", value as i64)
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        write!(w, "{}", trimmed)
    }
}

/// Write a PDF string.
///
/// Uses literal string syntax `(...)` with proper escaping,
/// or hex string syntax `<...>` for binary data.
fn write_string<W: Write>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));
    if !is_printable {
        return write_hex(w, data);
    }

    write!(w, "(")?;
    for &byte in data {
        match byte {
            b'(' => write!(w, "\\(")?,
            b')' => write!(w, "\\)")?,
            b'\\' => write!(w, "\\\\")?,
            b'\n' => write!(w, "\\n")?,
            b'\r' => write!(w, "\\r")?,
            b'\t' => write!(w, "\\t")?,
            _ => w.write_all(&[byte])?,
        }
    }
    write!(w, ")")
}

fn write_hex<W: Write>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    write!(w, "<")?;
    for byte in data {
        write!(w, "{:02X}", byte)?;
    }
    write!(w, ">")
}

/// Write a PDF name.
///
/// Names start with `/` and escape special characters with `#xx`.
fn write_name<W: Write>(w: &mut W, name: &str) -> std::io::Result<()> {
    write!(w, "/")?;
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'<'
            | b'>'
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => w.write_all(&[byte])?,
            _ => write!(w, "#{:02X}", byte)?,
        }
    }
    Ok(())
}

/// Rectangle `[llx lly urx ury]` from an origin and size.
pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Object {
    Object::Array(vec![
        Object::Real(x),
        Object::Real(y),
        Object::Real(x + width),
        Object::Real(y + height),
    ])
}
