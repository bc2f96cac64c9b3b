//! Writes a closed [`Document`] as a complete PDF file.
//!
//! Object 1 is the page tree and object 2 the shared resource dictionary;
//! both are written after the objects they reference. Everything else is
//! numbered in emission order. Page `i` and its content stream take two
//! consecutive numbers so link annotations can refer to pages that have not
//! been written yet.

use std::io::Write;

use chrono::Utc;
use indexmap::IndexMap;
use md5::{Digest, Md5};

use super::content_stream::escape;
use super::embedded_files::{embedded_files_tree, Attachment};
use super::graphics_state::{BlendStateTable, SpotColorTable};
use super::object_serializer::ObjectSerializer;
use super::page::Template;
use super::shading::GradientTable;
use crate::document::{Document, ZoomMode};
use crate::encryption::EncryptionWriteHandler;
use crate::error::{Error, Result};
use crate::fonts::core_fonts::CoreFont;
use crate::fonts::encoding::{replace_bytes, text_string, utf16be, utf8_to_cp1252};
use crate::fonts::{widths_to_object, FontDefinition, FontSubsetBuilder, FontType};
use crate::object::{dict, Dict, Object, ObjectRef};
use crate::utils::compress_data;

/// Date format of the info dictionary.
const PDF_DATE: &str = "D:%Y%m%d%H%M%S";

/// Single-use writer of one document.
pub struct Serializer<'a> {
    doc: &'a Document,
    out: Vec<u8>,
    /// Byte offset of each object, indexed by object number
    offsets: Vec<Option<usize>>,
    n: u32,
    objects: ObjectSerializer,
    handler: Option<EncryptionWriteHandler>,
    first_page: u32,
}

impl<'a> Serializer<'a> {
    /// Serialize `doc` and write the bytes to `w`.
    pub fn emit<W: Write>(doc: &'a Document, w: &mut W) -> Result<()> {
        let mut s = Serializer {
            doc,
            out: Vec::new(),
            offsets: vec![None; 3],
            n: 2,
            objects: ObjectSerializer::new(),
            handler: None,
            first_page: 0,
        };
        s.write_all()?;
        w.write_all(&s.out)?;
        log::info!(
            "Wrote PDF {} with {} pages, {} objects, {} bytes",
            doc.pdf_version,
            doc.page_count(),
            s.n,
            s.out.len()
        );
        Ok(())
    }

    fn write_all(&mut self) -> Result<()> {
        let doc = self.doc;
        let info = self.info_dict();
        if let Some(p) = &doc.protection {
            let file_id = self.file_id(&info);
            self.handler = Some(EncryptionWriteHandler::with_file_id(
                &p.user_password,
                &p.owner_password,
                p.permissions,
                &file_id,
            ));
        }

        writeln!(self.out, "%PDF-{}", doc.pdf_version)?;
        self.out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let (doc_files, page_files) = self.put_attachments()?;
        self.put_pages(&page_files)?;

        let mut resources = Resources::default();
        self.put_blend_states(&mut resources)?;
        self.put_gradients(&mut resources)?;
        self.put_spot_colors(&mut resources)?;
        self.put_fonts(&mut resources)?;
        self.put_images(&mut resources)?;
        self.put_templates(&mut resources)?;
        self.put_resources(resources)?;

        let encrypt = match self.handler.as_ref().map(|h| h.encrypt_dict()) {
            Some(d) => {
                let r = self.alloc();
                self.put_unencrypted(r, Object::Dictionary(d))?;
                Some(r)
            },
            None => None,
        };
        let outlines = self.put_outlines()?;
        let metadata = self.put_metadata()?;
        let info_ref = self.alloc();
        self.put(info_ref, Object::Dictionary(info))?;
        let catalog = self.catalog(outlines, metadata, &doc_files);
        let root = self.alloc();
        self.put(root, Object::Dictionary(catalog))?;

        self.put_xref_and_trailer(root, info_ref, encrypt)
    }

    fn alloc(&mut self) -> ObjectRef {
        self.n += 1;
        self.offsets.push(None);
        ObjectRef::new(self.n, 0)
    }

    fn put(&mut self, r: ObjectRef, obj: Object) -> Result<()> {
        self.offsets[r.id as usize] = Some(self.out.len());
        self.objects
            .write_indirect(&mut self.out, r, &obj, self.handler.as_ref())?;
        Ok(())
    }

    fn put_unencrypted(&mut self, r: ObjectRef, obj: Object) -> Result<()> {
        self.offsets[r.id as usize] = Some(self.out.len());
        self.objects.write_indirect(&mut self.out, r, &obj, None)?;
        Ok(())
    }

    /// Stream object, deflated when `compress` is set.
    fn stream(&self, mut d: Dict, data: Vec<u8>, compress: bool) -> Result<Object> {
        if compress {
            let packed = compress_data(&data)?;
            d.insert("Filter".into(), Object::name("FlateDecode"));
            Ok(Object::stream(d, packed))
        } else {
            Ok(Object::stream(d, data))
        }
    }

    fn page_ref(&self, page: usize) -> ObjectRef {
        ObjectRef::new(self.first_page + 2 * (page.saturating_sub(1)) as u32, 0)
    }

    fn file_id(&self, info: &Dict) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(ObjectSerializer::compact().serialize(&Object::Dictionary(info.clone())));
        hasher.update((self.doc.page_count() as u64).to_be_bytes());
        hasher.finalize().to_vec()
    }

    /// Embedded file streams and file specifications, for the catalog and for
    /// each page's annotations.
    fn put_attachments(&mut self) -> Result<(Vec<ObjectRef>, Vec<Vec<ObjectRef>>)> {
        let doc = self.doc;
        let mut doc_files = Vec::with_capacity(doc.attachments.len());
        for attachment in &doc.attachments {
            doc_files.push(self.put_attachment(attachment)?);
        }
        let mut page_files = Vec::with_capacity(doc.pages.len());
        for page in &doc.pages {
            let mut refs = Vec::with_capacity(page.attachments.len());
            for annot in &page.attachments {
                refs.push(self.put_attachment(&annot.attachment)?);
            }
            page_files.push(refs);
        }
        Ok((doc_files, page_files))
    }

    fn put_attachment(&mut self, attachment: &Attachment) -> Result<ObjectRef> {
        let stream = self.alloc();
        self.put(stream, attachment.stream())?;
        let filespec = self.alloc();
        self.put(filespec, Object::Dictionary(attachment.filespec(stream)))?;
        Ok(filespec)
    }

    fn put_pages(&mut self, page_files: &[Vec<ObjectRef>]) -> Result<()> {
        let doc = self.doc;
        let nb = doc.page_count();
        self.first_page = self.n + 1;
        let parent = ObjectRef::new(1, 0);
        let mut kids = Vec::with_capacity(nb);

        for i in 1..=nb {
            let page = &doc.pages[i];
            let page_ref = self.alloc();
            let contents = self.alloc();
            kids.push(Object::Reference(page_ref));

            let mut annots = page.link_annots(|link| {
                doc.links
                    .get(link)
                    .map(|dest| (self.page_ref(dest.page), dest.y))
            });
            for (annot, filespec) in page.attachments.iter().zip(&page_files[i]) {
                annots.push(Object::Dictionary(annot.annot_dict(*filespec)));
            }
            self.put(page_ref, Object::Dictionary(page.page_dict(parent, contents, annots)))?;

            let mut content = page.content.as_bytes().to_vec();
            if !doc.alias_nb.is_empty() {
                // match the alias as the text operators wrote it
                let total = nb.to_string();
                let single = escape(&utf8_to_cp1252(&doc.alias_nb));
                replace_bytes(&mut content, &single, total.as_bytes());
                replace_bytes(&mut content, &escape(&utf16be(&doc.alias_nb)), &utf16be(&total));
            }
            let stream = self.stream(Dict::new(), content, doc.config.compression)?;
            self.put(contents, stream)?;
        }

        let (w, h) = doc.config.page_size.oriented(doc.config.orientation);
        let pages = dict([
            ("Type", Object::name("Pages")),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(nb as i64)),
            ("MediaBox", Object::reals(&[0.0, 0.0, w, h])),
        ]);
        self.put(parent, Object::Dictionary(pages))
    }

    fn put_blend_states(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        for (i, state) in doc.blend_states.iter() {
            let r = self.alloc();
            self.put(r, Object::Dictionary(state.to_dict()))?;
            res.ext_g_state
                .insert(BlendStateTable::resource_name(i), r);
        }
        Ok(())
    }

    fn put_gradients(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        for (i, gradient) in doc.gradients.iter() {
            let function = self.alloc();
            self.put(function, Object::Dictionary(gradient.function_dict()))?;
            let shading = self.alloc();
            self.put(shading, Object::Dictionary(gradient.shading_dict(function)))?;
            res.shading
                .insert(GradientTable::resource_name(i), shading);
        }
        Ok(())
    }

    fn put_spot_colors(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        for (i, color) in doc.spot_colors.iter() {
            let r = self.alloc();
            self.put(r, color.color_space())?;
            res.color_space
                .insert(SpotColorTable::resource_name(i), r);
        }
        Ok(())
    }

    fn put_fonts(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        // one encoding object per distinct differences string
        let mut encodings: IndexMap<&str, ObjectRef> = IndexMap::new();
        for def in doc.fonts.definitions() {
            if !def.diff.is_empty() && !encodings.contains_key(def.diff.as_str()) {
                let r = self.alloc();
                let encoding = dict([
                    ("Type", Object::name("Encoding")),
                    ("BaseEncoding", Object::name("WinAnsiEncoding")),
                    ("Differences", Object::Array(parse_differences(&def.diff)?)),
                ]);
                self.put(r, Object::Dictionary(encoding))?;
                encodings.insert(def.diff.as_str(), r);
            }
        }

        for def in doc.fonts.definitions() {
            let font_ref = match def.font_type {
                FontType::Core => self.put_core_font(def)?,
                FontType::TrueType | FontType::Type1 => {
                    let encoding = encodings.get(def.diff.as_str()).copied();
                    self.put_simple_font(def, encoding)?
                },
                FontType::Utf8 => self.put_utf8_font(def)?,
            };
            res.font.insert(format!("F{}", def.id), font_ref);
        }
        Ok(())
    }

    fn put_core_font(&mut self, def: &FontDefinition) -> Result<ObjectRef> {
        let mut d = dict([
            ("Type", Object::name("Font")),
            ("BaseFont", Object::name(def.name.clone())),
            ("Subtype", Object::name("Type1")),
        ]);
        let symbolic = CoreFont::from_postscript_name(&def.name)
            .map(CoreFont::is_symbolic)
            .unwrap_or(false);
        if !symbolic {
            d.insert("Encoding".into(), Object::name("WinAnsiEncoding"));
        }
        let r = self.alloc();
        self.put(r, Object::Dictionary(d))?;
        Ok(r)
    }

    /// Single-byte TrueType or Type1 font from a precompiled definition.
    fn put_simple_font(&mut self, def: &FontDefinition, encoding: Option<ObjectRef>) -> Result<ObjectRef> {
        let program = match &def.program {
            Some(bytes) => {
                let mut d = dict([("Filter", Object::name("FlateDecode"))]);
                if def.font_type == FontType::Type1 {
                    d.insert("Length1".into(), Object::Integer(def.size1 as i64));
                    d.insert("Length2".into(), Object::Integer(def.size2 as i64));
                    d.insert("Length3".into(), Object::Integer(0));
                } else {
                    d.insert("Length1".into(), Object::Integer(def.original_size as i64));
                }
                let r = self.alloc();
                self.put(r, Object::stream(d, bytes.clone()))?;
                Some(r)
            },
            None => None,
        };

        let font_ref = self.alloc();
        let widths_ref = self.alloc();
        let descriptor_ref = self.alloc();

        let subtype = if def.font_type == FontType::Type1 { "Type1" } else { "TrueType" };
        let mut font = dict([
            ("Type", Object::name("Font")),
            ("BaseFont", Object::name(def.name.clone())),
            ("Subtype", Object::name(subtype)),
            ("FirstChar", Object::Integer(32)),
            ("LastChar", Object::Integer(255)),
            ("Widths", Object::Reference(widths_ref)),
            ("FontDescriptor", Object::Reference(descriptor_ref)),
        ]);
        match encoding {
            Some(r) => {
                font.insert("Encoding".into(), Object::Reference(r));
            },
            None if !def.enc.is_empty() => {
                font.insert("Encoding".into(), Object::name("WinAnsiEncoding"));
            },
            None => {},
        }
        self.put(font_ref, Object::Dictionary(font))?;

        let widths = (32..256)
            .map(|c| Object::Integer(def.cw.get(c).copied().unwrap_or(0) as i64))
            .collect();
        self.put(widths_ref, Object::Array(widths))?;

        let mut descriptor = descriptor_dict(def, &def.name);
        if let Some(program) = program {
            let key = if def.font_type == FontType::Type1 { "FontFile" } else { "FontFile2" };
            descriptor.insert(key.into(), Object::Reference(program));
        }
        self.put(descriptor_ref, Object::Dictionary(descriptor))?;
        Ok(font_ref)
    }

    /// Unicode font: Type0 with a CIDFontType2 descendant over a subset of
    /// the glyphs actually used.
    fn put_utf8_font(&mut self, def: &FontDefinition) -> Result<ObjectRef> {
        let utf8 = def
            .utf8
            .as_ref()
            .ok_or_else(|| Error::Font(format!("font '{}' has no TrueType program", def.name)))?;
        let mut used = utf8.used.clone();
        if utf8.alias_used {
            used.extend(self.doc.page_count().to_string().chars().map(|c| c as u32));
        }
        let subset = FontSubsetBuilder::new(&utf8.font, used.iter().copied()).build()?;
        log::debug!(
            "Subset '{}': {} glyphs for {} code points",
            subset.base_font,
            subset.glyph_count(),
            used.len()
        );

        let type0 = self.alloc();
        let cid_font = self.alloc();
        let to_unicode = self.alloc();
        let descriptor = self.alloc();
        let file = self.alloc();
        let cid_to_gid = self.alloc();
        let base_font = Object::name(subset.base_font.clone());

        self.put(
            type0,
            Object::Dictionary(dict([
                ("Type", Object::name("Font")),
                ("Subtype", Object::name("Type0")),
                ("BaseFont", base_font.clone()),
                ("Encoding", Object::name("Identity-H")),
                ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font)])),
                ("ToUnicode", Object::Reference(to_unicode)),
            ])),
        )?;

        let system_info = dict([
            ("Registry", Object::string("Adobe")),
            ("Ordering", Object::string("UCS")),
            ("Supplement", Object::Integer(0)),
        ]);
        self.put(
            cid_font,
            Object::Dictionary(dict([
                ("Type", Object::name("Font")),
                ("Subtype", Object::name("CIDFontType2")),
                ("BaseFont", base_font),
                ("CIDSystemInfo", Object::Dictionary(system_info)),
                ("FontDescriptor", Object::Reference(descriptor)),
                ("DW", Object::Integer(def.desc.missing_width as i64)),
                ("W", widths_to_object(&subset.widths)),
                ("CIDToGIDMap", Object::Reference(cid_to_gid)),
            ])),
        )?;

        let cmap = self.stream(Dict::new(), subset.to_unicode.clone(), self.doc.config.compression)?;
        self.put(to_unicode, cmap)?;

        let mut desc = descriptor_dict(def, &subset.base_font);
        desc.insert("FontFile2".into(), Object::Reference(file));
        self.put(descriptor, Object::Dictionary(desc))?;

        let program = dict([
            ("Filter", Object::name("FlateDecode")),
            ("Length1", Object::Integer(subset.length1() as i64)),
        ]);
        self.put(file, Object::stream(program, subset.compressed_program))?;

        let map = dict([("Filter", Object::name("FlateDecode"))]);
        self.put(cid_to_gid, Object::stream(map, subset.compressed_cid_to_gid))?;
        Ok(type0)
    }

    /// One XObject per distinct image content, with its soft mask and
    /// palette.
    fn put_images(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        let compress = doc.config.compression;
        for info in doc.images.unique().into_values() {
            let image = self.alloc();
            let smask = info.smask.as_ref().map(|_| self.alloc());
            let palette = (!info.palette.is_empty()).then(|| self.alloc());

            self.put(image, Object::stream(info.xobject_dict(palette, smask), info.data.clone()))?;
            if let (Some(r), Some(d), Some(data)) = (smask, info.smask_dict(), &info.smask) {
                self.put(r, Object::stream(d, data.clone()))?;
            }
            if let Some(r) = palette {
                let stream = self.stream(Dict::new(), info.palette.clone(), compress)?;
                self.put(r, stream)?;
            }
            res.x_object.insert(info.resource_name(), image);
        }
        Ok(())
    }

    fn put_templates(&mut self, res: &mut Resources) -> Result<()> {
        let doc = self.doc;
        let compress = doc.config.compression;
        for (i, tpl) in doc.templates.iter().enumerate() {
            let r = self.alloc();
            let stream = self.stream(tpl.xobject_dict(), tpl.content.as_bytes().to_vec(), compress)?;
            self.put(r, stream)?;
            res.x_object.insert(Template::resource_name(i + 1), r);
        }
        Ok(())
    }

    fn put_resources(&mut self, res: Resources) -> Result<()> {
        let sort = self.doc.config.catalog_sort;
        let procset = ["PDF", "Text", "ImageB", "ImageC", "ImageI"]
            .into_iter()
            .map(Object::name)
            .collect();
        let mut d = dict([("ProcSet", Object::Array(procset))]);
        for (key, mut entries) in [
            ("Font", res.font),
            ("XObject", res.x_object),
            ("ExtGState", res.ext_g_state),
            ("Shading", res.shading),
            ("ColorSpace", res.color_space),
        ] {
            if entries.is_empty() {
                continue;
            }
            if sort {
                entries.sort_keys();
            }
            let sub: Dict = entries
                .into_iter()
                .map(|(name, r)| (name, Object::Reference(r)))
                .collect();
            d.insert(key.into(), Object::Dictionary(sub));
        }
        self.put(ObjectRef::new(2, 0), Object::Dictionary(d))
    }

    fn put_outlines(&mut self) -> Result<Option<ObjectRef>> {
        let doc = self.doc;
        let outlines = &doc.outlines;
        if outlines.is_empty() {
            return Ok(None);
        }
        let first_id = self.n + 1;
        let first_page = self.first_page;
        let (items, root) = outlines.build(first_id, |page| {
            ObjectRef::new(first_page + 2 * (page.saturating_sub(1)) as u32, 0)
        });
        for item in items {
            let r = self.alloc();
            self.put(r, Object::Dictionary(item))?;
        }
        let root_ref = self.alloc();
        self.put(root_ref, Object::Dictionary(root))?;
        Ok(Some(root_ref))
    }

    fn put_metadata(&mut self) -> Result<Option<ObjectRef>> {
        let doc = self.doc;
        let Some(xmp) = &doc.xmp else {
            return Ok(None);
        };
        let d = dict([("Type", Object::name("Metadata")), ("Subtype", Object::name("XML"))]);
        let r = self.alloc();
        self.put(r, Object::stream(d, xmp.clone()))?;
        Ok(Some(r))
    }

    fn info_dict(&self) -> Dict {
        let info = &self.doc.info;
        let mut d = dict([("Producer", Object::String(text_string(&info.producer)))]);
        for (key, value) in [
            ("Title", &info.title),
            ("Subject", &info.subject),
            ("Author", &info.author),
            ("Keywords", &info.keywords),
            ("Creator", &info.creator),
        ] {
            if !value.is_empty() {
                d.insert(key.into(), Object::String(text_string(value)));
            }
        }
        let created = info.creation_date.unwrap_or_else(Utc::now);
        d.insert(
            "CreationDate".into(),
            Object::string(created.format(PDF_DATE).to_string()),
        );
        if let Some(modified) = info.mod_date {
            d.insert("ModDate".into(), Object::string(modified.format(PDF_DATE).to_string()));
        }
        d
    }

    fn catalog(&self, outlines: Option<ObjectRef>, metadata: Option<ObjectRef>, files: &[ObjectRef]) -> Dict {
        let doc = self.doc;
        let mut d = dict([
            ("Type", Object::name("Catalog")),
            ("Pages", Object::Reference(ObjectRef::new(1, 0))),
        ]);

        let first = Object::Reference(self.page_ref(1));
        let open_action = match doc.zoom {
            ZoomMode::FullPage => Some(vec![first, Object::name("Fit")]),
            ZoomMode::FullWidth => Some(vec![first, Object::name("FitH"), Object::Null]),
            ZoomMode::Real => Some(vec![
                first,
                Object::name("XYZ"),
                Object::Null,
                Object::Null,
                Object::Integer(1),
            ]),
            ZoomMode::Percent(pct) => Some(vec![
                first,
                Object::name("XYZ"),
                Object::Null,
                Object::Null,
                Object::Real(pct / 100.0),
            ]),
            ZoomMode::Default => None,
        };
        if let Some(action) = open_action {
            d.insert("OpenAction".into(), Object::Array(action));
        }
        if let Some(layout) = doc.layout.page_layout() {
            d.insert("PageLayout".into(), Object::name(layout));
        }
        match (doc.layout.page_mode(), outlines) {
            (Some(mode), _) => {
                d.insert("PageMode".into(), Object::name(mode));
            },
            (None, Some(_)) => {
                d.insert("PageMode".into(), Object::name("UseOutlines"));
            },
            (None, None) => {},
        }
        if let Some(r) = outlines {
            d.insert("Outlines".into(), Object::Reference(r));
        }
        if let Some(r) = metadata {
            d.insert("Metadata".into(), Object::Reference(r));
        }
        if !files.is_empty() {
            let entries: Vec<_> = doc.attachments.iter().zip(files.iter().copied()).collect();
            let names = dict([("EmbeddedFiles", Object::Dictionary(embedded_files_tree(&entries)))]);
            d.insert("Names".into(), Object::Dictionary(names));
        }
        d
    }

    fn put_xref_and_trailer(&mut self, root: ObjectRef, info: ObjectRef, encrypt: Option<ObjectRef>) -> Result<()> {
        let xref_start = self.out.len();
        let size = self.n + 1;
        writeln!(self.out, "xref")?;
        writeln!(self.out, "0 {}", size)?;
        writeln!(self.out, "0000000000 65535 f ")?;
        for id in 1..size as usize {
            let offset = self.offsets[id]
                .ok_or_else(|| Error::Sequence(format!("object {} was allocated but never written", id)))?;
            writeln!(self.out, "{:010} 00000 n ", offset)?;
        }

        let mut trailer = dict([
            ("Size", Object::Integer(size as i64)),
            ("Root", Object::Reference(root)),
            ("Info", Object::Reference(info)),
        ]);
        if let (Some(r), Some(handler)) = (encrypt, &self.handler) {
            let id = Object::HexString(handler.file_id().to_vec());
            trailer.insert("Encrypt".into(), Object::Reference(r));
            trailer.insert("ID".into(), Object::Array(vec![id.clone(), id]));
        }
        writeln!(self.out, "trailer")?;
        ObjectSerializer::compact().write_object(&mut self.out, &Object::Dictionary(trailer))?;
        writeln!(self.out)?;
        writeln!(self.out, "startxref")?;
        writeln!(self.out, "{}", xref_start)?;
        write!(self.out, "%%EOF")?;
        Ok(())
    }
}

/// Resource names to object references, per resource category.
#[derive(Debug, Default)]
struct Resources {
    font: IndexMap<String, ObjectRef>,
    x_object: IndexMap<String, ObjectRef>,
    ext_g_state: IndexMap<String, ObjectRef>,
    shading: IndexMap<String, ObjectRef>,
    color_space: IndexMap<String, ObjectRef>,
}

fn descriptor_dict(def: &FontDefinition, font_name: &str) -> Dict {
    let desc = &def.desc;
    let bbox = &desc.font_bbox;
    dict([
        ("Type", Object::name("FontDescriptor")),
        ("FontName", Object::name(font_name)),
        ("Ascent", Object::Integer(desc.ascent as i64)),
        ("Descent", Object::Integer(desc.descent as i64)),
        ("CapHeight", Object::Integer(desc.cap_height as i64)),
        ("Flags", Object::Integer(desc.flags.bits() as i64)),
        (
            "FontBBox",
            Object::Array(
                [bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax]
                    .into_iter()
                    .map(|v| Object::Integer(v as i64))
                    .collect(),
            ),
        ),
        ("ItalicAngle", Object::Real(desc.italic_angle)),
        ("StemV", Object::Integer(desc.stem_v as i64)),
        ("MissingWidth", Object::Integer(desc.missing_width as i64)),
    ])
}

/// Parse a differences string such as `128 /Euro 130 /quotesinglbase` into
/// the `/Differences` array.
pub fn parse_differences(diff: &str) -> Result<Vec<Object>> {
    diff.split_whitespace()
        .map(|token| match token.strip_prefix('/') {
            Some(name) if !name.is_empty() => Ok(Object::name(name)),
            Some(_) => Err(Error::InvalidFont("empty glyph name in differences".into())),
            None => token
                .parse::<i64>()
                .map(Object::Integer)
                .map_err(|_| Error::InvalidFont(format!("bad differences token '{}'", token))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(doc: &mut Document) -> String {
        let mut out = Vec::new();
        doc.output(&mut out).unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[test]
    fn test_parse_differences() {
        let objs = parse_differences("128 /Euro 130 /quotesinglbase /florin").unwrap();
        assert_eq!(
            objs,
            vec![
                Object::Integer(128),
                Object::name("Euro"),
                Object::Integer(130),
                Object::name("quotesinglbase"),
                Object::name("florin"),
            ]
        );
        assert!(parse_differences("12x /a").is_err());
        assert!(parse_differences("").unwrap().is_empty());
    }

    fn rfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
        hay.windows(needle.len()).rposition(|w| w == needle)
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut doc = Document::new();
        doc.set_compression(false);
        doc.add_page().unwrap();
        doc.set_font("Helvetica", "", 12.0).unwrap();
        doc.text(10.0, 10.0, "hi").unwrap();
        let mut out = Vec::new();
        doc.output(&mut out).unwrap();

        let marker = rfind(&out, b"startxref\n").unwrap();
        let tail = String::from_utf8_lossy(&out[marker..]).to_string();
        let startxref: usize = tail.lines().nth(1).and_then(|s| s.parse().ok()).unwrap();
        assert!(out[startxref..].starts_with(b"xref\n0 "));

        let xref = String::from_utf8_lossy(&out[startxref..]).to_string();
        let entries: Vec<&str> = xref.lines().skip(3).take_while(|l| l.ends_with(" n ")).collect();
        assert!(entries.len() >= 5);
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            assert!(out[offset..].starts_with(format!("{} 0 obj", i + 1).as_bytes()));
        }
        assert!(out.ends_with(b"%%EOF"));
    }

    #[test]
    fn test_page_tree_and_resources_fixed_ids() {
        let mut doc = Document::new();
        doc.add_page().unwrap();
        doc.add_page().unwrap();
        let text = render(&mut doc);
        assert!(text.contains("1 0 obj\n<<\n  /Type /Pages\n  /Kids [3 0 R 5 0 R]\n  /Count 2"));
        assert!(text.contains("2 0 obj\n<<\n  /ProcSet [/PDF /Text /ImageB /ImageC /ImageI]"));
        assert!(text.contains("/Root "));
    }

    #[test]
    fn test_page_count_alias() {
        let mut doc = Document::new();
        doc.set_compression(false);
        doc.alias_nb_pages("");
        doc.set_font("Helvetica", "", 10.0).unwrap();
        for _ in 0..3 {
            doc.add_page().unwrap();
            doc.cell(0.0, 10.0, "Page of {nb}").unwrap();
        }
        let text = render(&mut doc);
        assert_eq!(text.matches("(Page of 3) Tj").count(), 3);
        assert!(!text.contains("{nb}"));
    }

    #[test]
    fn test_alias_matched_in_page_encoding() {
        let mut doc = Document::new();
        doc.set_compression(false);
        doc.alias_nb_pages("(né)");
        doc.add_page().unwrap();
        doc.set_font("Helvetica", "", 10.0).unwrap();
        doc.cell(0.0, 10.0, "p (né)").unwrap();
        let text = render(&mut doc);
        assert!(text.contains("(p 1) Tj"));
        assert!(!text.contains("\\(n"));
    }

    #[test]
    fn test_catalog_display_mode_and_outlines() {
        let mut doc = Document::new();
        doc.set_display_mode("fullwidth", "single").unwrap();
        doc.add_page().unwrap();
        doc.bookmark("Start", 0, 0.0).unwrap();
        let text = render(&mut doc);
        assert!(text.contains("/OpenAction [3 0 R /FitH null]"));
        assert!(text.contains("/PageLayout /SinglePage"));
        assert!(text.contains("/PageMode /UseOutlines"));
        assert!(text.contains("/Type /Outlines"));
    }

    #[test]
    fn test_catalog_sort_orders_resources() {
        let mut doc = Document::new();
        doc.set_catalog_sort(true);
        doc.add_page().unwrap();
        doc.set_alpha(0.5, "").unwrap();
        doc.set_alpha(0.25, "").unwrap();
        doc.set_font("Times", "", 10.0).unwrap();
        doc.set_font("Courier", "", 10.0).unwrap();
        let text = render(&mut doc);
        let gs1 = text.find("/GS1 ").unwrap();
        let gs2 = text.find("/GS2 ").unwrap();
        assert!(gs1 < gs2);
        assert!(text.contains("/BaseFont /Courier"));
        assert!(text.contains("/BaseFont /Times-Roman"));
    }

    #[test]
    fn test_encrypted_trailer() {
        let mut doc = Document::new();
        doc.set_protection(crate::encryption::Permissions::PRINT, "", "owner");
        doc.add_page().unwrap();
        let text = render(&mut doc);
        assert!(text.contains("/Filter /Standard"));
        assert!(text.contains("/P -60"));
        let trailer = &text[text.rfind("trailer").unwrap()..];
        assert!(trailer.contains("/Encrypt "));
        assert!(trailer.contains("/ID [<"));
    }
}
