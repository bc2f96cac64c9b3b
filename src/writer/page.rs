//! Per-page state: content buffer, size, boxes, links and attachments.
//! Form templates share the same content buffer type.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use super::content_stream::ContentStream;
use super::embedded_files::AttachmentAnnotation;
use super::links::{LinkTarget, PageLink};
use crate::config::Orientation;
use crate::error::{Error, Result};
use crate::object::{dict, Dict, Object, ObjectRef};

/// Page boundary boxes (PDF 32000-1, 14.11.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageBox {
    /// `/MediaBox`
    Media,
    /// `/CropBox`
    Crop,
    /// `/BleedBox`
    Bleed,
    /// `/TrimBox`
    Trim,
    /// `/ArtBox`
    Art,
}

impl PageBox {
    /// Dictionary key of this box.
    pub fn pdf_key(&self) -> &'static str {
        match self {
            PageBox::Media => "MediaBox",
            PageBox::Crop => "CropBox",
            PageBox::Bleed => "BleedBox",
            PageBox::Trim => "TrimBox",
            PageBox::Art => "ArtBox",
        }
    }
}

impl fmt::Display for PageBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pdf_key())
    }
}

impl FromStr for PageBox {
    type Err = Error;

    /// Accepts `trim`, `TrimBox` or `/TrimBox`, in any case.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim_start_matches('/').to_ascii_lowercase();
        let short = lower.strip_suffix("box").unwrap_or(&lower);
        match short {
            "media" => Ok(PageBox::Media),
            "crop" => Ok(PageBox::Crop),
            "bleed" => Ok(PageBox::Bleed),
            "trim" => Ok(PageBox::Trim),
            "art" => Ok(PageBox::Art),
            _ => Err(Error::UnknownPageBox(s.to_string())),
        }
    }
}

/// Boxes set on a page, in points `[llx lly urx ury]`.
pub type PageBoxes = IndexMap<PageBox, [f64; 4]>;

/// Everything recorded for one page.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    /// Content stream operators
    pub content: ContentStream,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
    /// Orientation the page was created with
    pub orientation: Orientation,
    /// Media/Crop/Bleed/Trim/Art boxes
    pub boxes: PageBoxes,
    /// Link annotations
    pub links: Vec<PageLink>,
    /// File attachment annotations
    pub attachments: Vec<AttachmentAnnotation>,
}

impl PageState {
    /// New empty page of the given size in points.
    pub fn new(width: f64, height: f64, orientation: Orientation) -> Self {
        Self {
            width,
            height,
            orientation,
            ..Default::default()
        }
    }

    /// Link annotation dictionaries. Internal destinations are resolved with
    /// `dest_of`, which returns `None` for links that were never set.
    pub fn link_annots(
        &self,
        dest_of: impl Fn(usize) -> Option<(ObjectRef, f64)>,
    ) -> Vec<Object> {
        self.links
            .iter()
            .filter_map(|link| {
                let mut d = dict([
                    ("Type", Object::name("Annot")),
                    ("Subtype", Object::name("Link")),
                    ("Rect", Object::reals(&link.rect)),
                    ("Border", Object::Array(vec![Object::Integer(0); 3])),
                ]);
                match &link.target {
                    LinkTarget::Uri(uri) => {
                        let action = dict([
                            ("S", Object::name("URI")),
                            ("URI", Object::string(uri.as_bytes())),
                        ]);
                        d.insert("A".to_string(), Object::Dictionary(action));
                    },
                    LinkTarget::Internal(id) => {
                        let (page, y) = dest_of(*id)?;
                        d.insert(
                            "Dest".to_string(),
                            Object::Array(vec![
                                Object::Reference(page),
                                Object::name("XYZ"),
                                Object::Integer(0),
                                Object::Real(y),
                                Object::Null,
                            ]),
                        );
                    },
                }
                Some(Object::Dictionary(d))
            })
            .collect()
    }

    /// The page dictionary.
    pub fn page_dict(&self, parent: ObjectRef, contents: ObjectRef, annots: Vec<Object>) -> Dict {
        let mut d = dict([
            ("Type", Object::name("Page")),
            ("Parent", Object::Reference(parent)),
        ]);
        if !self.boxes.contains_key(&PageBox::Media) {
            d.insert(
                "MediaBox".to_string(),
                Object::reals(&[0.0, 0.0, self.width, self.height]),
            );
        }
        for (kind, rect) in &self.boxes {
            d.insert(kind.pdf_key().to_string(), Object::reals(rect));
        }
        d.insert(
            "Resources".to_string(),
            Object::Reference(ObjectRef::new(2, 0)),
        );
        if !annots.is_empty() {
            d.insert("Annots".to_string(), Object::Array(annots));
        }
        d.insert("Contents".to_string(), Object::Reference(contents));
        d
    }
}

/// A form XObject recorded between `begin_template` and `end_template`.
#[derive(Debug, Clone, Default)]
pub struct Template {
    /// Recorded operators
    pub content: ContentStream,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
}

impl Template {
    /// Empty template of the given size in points.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            content: ContentStream::new(),
            width,
            height,
        }
    }

    /// Resource name of a 1-based template id.
    pub fn resource_name(id: usize) -> String {
        format!("TPL{}", id)
    }

    /// Form XObject dictionary. Templates share the document resources.
    pub fn xobject_dict(&self) -> Dict {
        dict([
            ("Type", Object::name("XObject")),
            ("Subtype", Object::name("Form")),
            ("BBox", Object::reals(&[0.0, 0.0, self.width, self.height])),
            ("Resources", Object::Reference(ObjectRef::new(2, 0))),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_box_parsing() {
        assert_eq!("trim".parse::<PageBox>().unwrap(), PageBox::Trim);
        assert_eq!("/BleedBox".parse::<PageBox>().unwrap(), PageBox::Bleed);
        assert_eq!("CROP".parse::<PageBox>().unwrap(), PageBox::Crop);
        assert_eq!("/art".parse::<PageBox>().unwrap(), PageBox::Art);
        assert!(matches!("trimming".parse::<PageBox>(), Err(Error::UnknownPageBox(_))));
        assert!(matches!("box".parse::<PageBox>(), Err(Error::UnknownPageBox(_))));
    }

    #[test]
    fn test_page_dict_boxes() {
        let mut page = PageState::new(612.0, 792.0, Orientation::Portrait);
        page.boxes.insert(PageBox::Trim, [10.0, 10.0, 602.0, 782.0]);
        let d = page.page_dict(ObjectRef::new(1, 0), ObjectRef::new(4, 0), Vec::new());
        assert_eq!(d.get("MediaBox"), Some(&Object::reals(&[0.0, 0.0, 612.0, 792.0])));
        assert_eq!(d.get("TrimBox"), Some(&Object::reals(&[10.0, 10.0, 602.0, 782.0])));
        assert!(d.get("Annots").is_none());
        assert_eq!(d.get("Contents"), Some(&Object::Reference(ObjectRef::new(4, 0))));
    }

    #[test]
    fn test_media_box_override() {
        let mut page = PageState::new(612.0, 792.0, Orientation::Portrait);
        page.boxes.insert(PageBox::Media, [0.0, 0.0, 300.0, 300.0]);
        let d = page.page_dict(ObjectRef::new(1, 0), ObjectRef::new(4, 0), Vec::new());
        assert_eq!(d.get("MediaBox"), Some(&Object::reals(&[0.0, 0.0, 300.0, 300.0])));
    }

    #[test]
    fn test_link_annotations() {
        let mut page = PageState::new(100.0, 100.0, Orientation::Portrait);
        page.links.push(PageLink {
            rect: [0.0, 0.0, 10.0, 10.0],
            target: LinkTarget::Uri("https://example.com".into()),
        });
        page.links.push(PageLink {
            rect: [0.0, 0.0, 10.0, 10.0],
            target: LinkTarget::Internal(1),
        });
        page.links.push(PageLink {
            rect: [0.0, 0.0, 10.0, 10.0],
            target: LinkTarget::Internal(2),
        });
        let annots = page.link_annots(|id| (id == 1).then(|| (ObjectRef::new(3, 0), 50.0)));
        assert_eq!(annots.len(), 2);
        let uri = annots[0].as_dict().unwrap();
        assert!(uri.contains_key("A"));
        let internal = annots[1].as_dict().unwrap();
        let dest = internal.get("Dest").and_then(Object::as_array).unwrap();
        assert_eq!(dest[0], Object::Reference(ObjectRef::new(3, 0)));
    }

    #[test]
    fn test_template_dict() {
        let tpl = Template::new(100.0, 50.0);
        let d = tpl.xobject_dict();
        assert_eq!(d.get("Subtype"), Some(&Object::name("Form")));
        assert_eq!(d.get("BBox"), Some(&Object::reals(&[0.0, 0.0, 100.0, 50.0])));
        assert_eq!(Template::resource_name(3), "TPL3");
    }
}
