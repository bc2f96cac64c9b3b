//! Embedded file support for PDF documents.
//!
//! Attachments are stored as embedded file streams (PDF 32000-1, 7.11.4)
//! referenced from a file specification. Document-level attachments go into
//! the `/EmbeddedFiles` name tree of the catalog; page-level attachments are
//! `/FileAttachment` annotations.
//!
//! ## Example
//!
//! ```ignore
//! use pdf_forge::writer::embedded_files::Attachment;
//!
//! let file = Attachment::new("data.csv", csv_bytes).with_description("Monthly sales data");
//! ```

use bytes::Bytes;
use md5::{Digest, Md5};

use crate::fonts::encoding::utf16be_with_bom;
use crate::object::{dict, Dict, Object, ObjectRef};

/// A file to embed in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// File name shown by the viewer
    pub filename: String,
    /// File contents
    pub content: Bytes,
    /// Optional description
    pub description: String,
}

impl Attachment {
    /// Create a new attachment.
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// MD5 digest of the contents.
    pub fn checksum(&self) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(&self.content);
        hasher.finalize().into()
    }

    /// The `/EmbeddedFile` stream.
    pub fn stream(&self) -> Object {
        let params = dict([
            ("CheckSum", Object::HexString(self.checksum().to_vec())),
            ("Size", Object::Integer(self.content.len() as i64)),
        ]);
        let d = dict([
            ("Type", Object::name("EmbeddedFile")),
            ("Params", Object::Dictionary(params)),
        ]);
        Object::stream(d, self.content.clone())
    }

    /// The file specification referencing the written stream.
    pub fn filespec(&self, stream: ObjectRef) -> Dict {
        let mut d = dict([
            ("Type", Object::name("Filespec")),
            ("F", Object::string(ascii_fallback(&self.filename))),
            ("UF", Object::String(utf16be_with_bom(&self.filename))),
            ("EF", Object::Dictionary(dict([("F", Object::Reference(stream))]))),
        ]);
        if !self.description.is_empty() {
            d.insert("Desc".to_string(), Object::String(utf16be_with_bom(&self.description)));
        }
        d
    }
}

/// Replace non-ASCII characters for the legacy `/F` entry.
fn ascii_fallback(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii() { c } else { '_' }).collect()
}

/// The `/EmbeddedFiles` name tree. Keys are file names, sorted as
/// required for name trees; repeated names get a numeric suffix.
pub fn embedded_files_tree(files: &[(&Attachment, ObjectRef)]) -> Dict {
    let mut entries: Vec<(String, ObjectRef)> = Vec::with_capacity(files.len());
    for (attachment, filespec) in files {
        let mut key = attachment.filename.clone();
        let mut n = 1;
        while entries.iter().any(|(k, _)| *k == key) {
            n += 1;
            key = format!("{} ({})", attachment.filename, n);
        }
        entries.push((key, *filespec));
    }
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let names = entries
        .into_iter()
        .flat_map(|(key, r)| [Object::String(utf16be_with_bom(&key)), Object::Reference(r)])
        .collect();
    dict([("Names", Object::Array(names))])
}

/// A `/FileAttachment` annotation placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentAnnotation {
    /// The attached file
    pub attachment: Attachment,
    /// Annotation rectangle `[llx lly urx ury]` in points
    pub rect: [f64; 4],
}

impl AttachmentAnnotation {
    /// Inline annotation dictionary referencing the written file spec.
    pub fn annot_dict(&self, filespec: ObjectRef) -> Dict {
        let mut d = dict([
            ("Type", Object::name("Annot")),
            ("Subtype", Object::name("FileAttachment")),
            ("Rect", Object::reals(&self.rect)),
            ("FS", Object::Reference(filespec)),
            ("Name", Object::name("PushPin")),
        ]);
        if !self.attachment.description.is_empty() {
            d.insert(
                "Contents".to_string(),
                Object::String(utf16be_with_bom(&self.attachment.description)),
            );
        }
        d
    }
}
