//! Image handling for PDF generation.
//!
//! Images are represented as XObjects (PDF 32000-1, 8.9).
//!
//! # Supported Formats
//!
//! - **JPEG**: Pass-through embedding using DCTDecode filter
//! - **PNG**: Decoded with the `image` crate, re-encoded with FlateDecode;
//!   an alpha channel becomes a separate soft mask
//! - **Indexed**: caller-supplied palette and indices
//!
//! Every image carries a SHA-1 over everything that ends up in its XObject,
//! so two names pointing at identical content share one object.

use std::str::FromStr;

use bytes::Bytes;
use indexmap::IndexMap;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::object::{dict, Dict, Object, ObjectRef};
use crate::utils::{compress_data, hex_lower};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Default resolution used to size images placed without explicit dimensions.
pub const DEFAULT_DPI: f64 = 72.0;

/// Image container formats accepted by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// PNG (re-encoded)
    Png,
    /// JPEG (DCTDecode pass-through)
    Jpeg,
}

impl ImageType {
    /// Sniff the type from magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(PNG_MAGIC) {
            Some(ImageType::Png)
        } else if data.starts_with(&[0xFF, 0xD8]) {
            Some(ImageType::Jpeg)
        } else {
            None
        }
    }

    /// Map a `Content-Type` header value such as `image/png; q=1`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        let subtype = mime.strip_prefix("image/")?;
        subtype.parse().ok()
    }
}

impl FromStr for ImageType {
    type Err = Error;

    /// Accepts a type name or file extension, with or without a leading dot.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageType::Png),
            "jpg" | "jpeg" | "pjpeg" => Ok(ImageType::Jpeg),
            other => Err(Error::InvalidImage(format!("unsupported image type '{}'", other))),
        }
    }
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
    /// Palette lookup into DeviceRGB
    Indexed,
}

impl ColorSpace {
    /// Get the number of color components.
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::DeviceGray | ColorSpace::Indexed => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }

    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// A decoded, embeddable image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Encoded sample data, already filtered
    pub data: Bytes,
    /// Flate-compressed alpha channel
    pub smask: Option<Bytes>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color space
    pub color_space: ColorSpace,
    /// Bits per component
    pub bits_per_component: u8,
    /// Filter name (`FlateDecode`, `DCTDecode`)
    pub filter: Option<&'static str>,
    /// RGB triplets for indexed images, uncompressed
    pub palette: Vec<u8>,
    /// Color-key mask ranges
    pub transparency: Vec<u8>,
    /// `/Decode` array
    pub decode: Option<Vec<f64>>,
    /// Resolution used when the image is placed without dimensions
    pub dpi: f64,
    hash: [u8; 20],
}

impl ImageInfo {
    /// Parse image bytes of the given type.
    pub fn from_bytes(data: &[u8], kind: ImageType) -> Result<Self> {
        match kind {
            ImageType::Png => Self::from_png(data),
            ImageType::Jpeg => Self::from_jpeg(data),
        }
    }

    /// Parse image bytes, sniffing the type.
    pub fn detect(data: &[u8]) -> Result<Self> {
        let kind = ImageType::detect(data)
            .ok_or_else(|| Error::InvalidImage("unrecognized image signature".into()))?;
        Self::from_bytes(data, kind)
    }

    /// Load a JPEG image. The bytes are embedded as-is.
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let header = parse_jpeg_header(data)?;
        let decode = (header.color_space == ColorSpace::DeviceCMYK)
            .then(|| vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        Ok(Self::finish(Self {
            data: Bytes::copy_from_slice(data),
            smask: None,
            width: header.width,
            height: header.height,
            color_space: header.color_space,
            bits_per_component: header.precision,
            filter: Some("DCTDecode"),
            palette: Vec::new(),
            transparency: Vec::new(),
            decode,
            dpi: DEFAULT_DPI,
            hash: [0; 20],
        }))
    }

    /// Load a PNG image.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| Error::InvalidImage(format!("PNG decode failed: {}", e)))?;

        let (width, height) = img.dimensions();
        let pixels = (width as usize) * (height as usize);

        let (color_space, samples, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity(pixels);
                let mut alpha = Vec::with_capacity(pixels);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha))
            },
            image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity(pixels * 3);
                let mut alpha = Vec::with_capacity(pixels);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha))
            },
            _ => (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None),
        };

        // a fully opaque alpha channel needs no mask
        let alpha = alpha.filter(|a| a.iter().any(|v| *v != 0xFF));
        let smask = match alpha {
            Some(a) => Some(Bytes::from(compress_data(&a)?)),
            None => None,
        };

        Ok(Self::finish(Self {
            data: Bytes::from(compress_data(&samples)?),
            smask,
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: Some("FlateDecode"),
            palette: Vec::new(),
            transparency: Vec::new(),
            decode: None,
            dpi: DEFAULT_DPI,
            hash: [0; 20],
        }))
    }

    /// Build an 8-bit indexed image from an RGB palette and one index per pixel.
    pub fn indexed(width: u32, height: u32, palette: Vec<u8>, indices: &[u8]) -> Result<Self> {
        if palette.is_empty() || palette.len() % 3 != 0 || palette.len() > 256 * 3 {
            return Err(Error::InvalidImage(format!(
                "palette of {} bytes is not 1..=256 RGB entries",
                palette.len()
            )));
        }
        if indices.len() != (width as usize) * (height as usize) {
            return Err(Error::InvalidImage(format!(
                "{} indices for a {}x{} image",
                indices.len(),
                width,
                height
            )));
        }
        let entries = palette.len() / 3;
        if let Some(bad) = indices.iter().find(|i| **i as usize >= entries) {
            return Err(Error::InvalidImage(format!(
                "index {} outside palette of {} entries",
                bad, entries
            )));
        }
        Ok(Self::finish(Self {
            data: Bytes::from(compress_data(indices)?),
            smask: None,
            width,
            height,
            color_space: ColorSpace::Indexed,
            bits_per_component: 8,
            filter: Some("FlateDecode"),
            palette,
            transparency: Vec::new(),
            decode: None,
            dpi: DEFAULT_DPI,
            hash: [0; 20],
        }))
    }

    /// Mark palette entries (or gray/RGB component values) as transparent.
    pub fn with_transparency(mut self, values: Vec<u8>) -> Self {
        self.transparency = values;
        Self::finish(self)
    }

    /// Override the resolution used for natural sizing.
    pub fn with_dpi(mut self, dpi: f64) -> Self {
        if dpi > 0.0 {
            self.dpi = dpi;
        }
        Self::finish(self)
    }

    fn finish(mut self) -> Self {
        self.hash = self.compute_hash();
        self
    }

    fn compute_hash(&self) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(&self.data);
        if let Some(mask) = &self.smask {
            hasher.update(mask);
        }
        hasher.update(self.width.to_be_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.color_space.pdf_name().as_bytes());
        hasher.update([self.bits_per_component]);
        hasher.update(&self.palette);
        hasher.update(&self.transparency);
        hasher.update(self.dpi.to_be_bytes());
        hasher.finalize().into()
    }

    /// SHA-1 content hash.
    pub fn hash(&self) -> [u8; 20] {
        self.hash
    }

    /// Resource name shared by every image with this content.
    pub fn resource_name(&self) -> String {
        format!("I{}", hex_lower(&self.hash))
    }

    /// Natural size in user units, given the scale factor (points per unit).
    pub fn natural_size(&self, k: f64) -> (f64, f64) {
        let factor = 72.0 / self.dpi / k;
        (self.width as f64 * factor, self.height as f64 * factor)
    }

    /// Resolve a requested placement size. Zero means "derive from the other
    /// dimension", and both zero means natural size.
    pub fn placement_size(&self, w: f64, h: f64, k: f64) -> (f64, f64) {
        let (nw, nh) = self.natural_size(k);
        match (w == 0.0, h == 0.0) {
            (true, true) => (nw, nh),
            (true, false) => (h * nw / nh, h),
            (false, true) => (w, w * nh / nw),
            (false, false) => (w, h),
        }
    }

    /// Image XObject dictionary.
    pub fn xobject_dict(&self, palette: Option<ObjectRef>, smask: Option<ObjectRef>) -> Dict {
        let mut d = dict([
            ("Type", Object::name("XObject")),
            ("Subtype", Object::name("Image")),
            ("Width", Object::Integer(self.width as i64)),
            ("Height", Object::Integer(self.height as i64)),
        ]);
        let color_space = match (self.color_space, palette) {
            (ColorSpace::Indexed, Some(palette)) => Object::Array(vec![
                Object::name("Indexed"),
                Object::name("DeviceRGB"),
                Object::Integer((self.palette.len() / 3) as i64 - 1),
                Object::Reference(palette),
            ]),
            (cs, _) => Object::name(cs.pdf_name()),
        };
        d.insert("ColorSpace".into(), color_space);
        d.insert("BitsPerComponent".into(), Object::Integer(self.bits_per_component as i64));
        if let Some(decode) = &self.decode {
            d.insert("Decode".into(), Object::reals(decode));
        }
        if let Some(filter) = self.filter {
            d.insert("Filter".into(), Object::name(filter));
        }
        if !self.transparency.is_empty() {
            let mask = self
                .transparency
                .iter()
                .flat_map(|v| [Object::Integer(*v as i64), Object::Integer(*v as i64)])
                .collect();
            d.insert("Mask".into(), Object::Array(mask));
        }
        if let Some(smask) = smask {
            d.insert("SMask".into(), Object::Reference(smask));
        }
        d
    }

    /// Soft mask XObject dictionary for the alpha channel.
    pub fn smask_dict(&self) -> Option<Dict> {
        self.smask.as_ref().map(|_| {
            dict([
                ("Type", Object::name("XObject")),
                ("Subtype", Object::name("Image")),
                ("Width", Object::Integer(self.width as i64)),
                ("Height", Object::Integer(self.height as i64)),
                ("ColorSpace", Object::name("DeviceGray")),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::name("FlateDecode")),
            ])
        })
    }
}

struct JpegHeader {
    width: u32,
    height: u32,
    precision: u8,
    color_space: ColorSpace,
}

/// Parse JPEG markers up to the first start-of-frame.
fn parse_jpeg_header(data: &[u8]) -> Result<JpegHeader> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::InvalidImage("not a valid JPEG".into()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        pos += 2;

        // fill bytes and standalone markers
        if marker == 0xFF || marker == 0x00 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }

        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
        ) {
            if pos + 8 > data.len() {
                return Err(Error::InvalidImage("truncated JPEG frame header".into()));
            }
            let precision = data[pos + 2];
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let color_space = match data[pos + 7] {
                1 => ColorSpace::DeviceGray,
                3 => ColorSpace::DeviceRGB,
                4 => ColorSpace::DeviceCMYK,
                n => {
                    return Err(Error::InvalidImage(format!("JPEG with {} components", n)));
                },
            };
            if width == 0 || height == 0 {
                return Err(Error::InvalidImage("JPEG frame has zero size".into()));
            }
            return Ok(JpegHeader {
                width,
                height,
                precision,
                color_space,
            });
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }

    Err(Error::InvalidImage("no JPEG start-of-frame marker".into()))
}

/// Registered images by caller name.
///
/// Names are the first-level key; the content hash is the second, so the
/// serializer emits one XObject per distinct hash.
#[derive(Debug, Clone, Default)]
pub struct ImageRegistry {
    by_name: IndexMap<String, ImageInfo>,
}

impl ImageRegistry {
    /// Register an image under a name. A known name keeps its first image.
    pub fn register(&mut self, name: &str, info: ImageInfo) -> &ImageInfo {
        self.by_name.entry(name.to_string()).or_insert(info)
    }

    /// Look up by name.
    pub fn get(&self, name: &str) -> Option<&ImageInfo> {
        self.by_name.get(name)
    }

    /// Look up by name, failing with `ImageNotFound`.
    pub fn require(&self, name: &str) -> Result<&ImageInfo> {
        self.get(name).ok_or_else(|| Error::ImageNotFound(name.to_string()))
    }

    /// True if the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// One image per content hash, in first-registration order.
    pub fn unique(&self) -> IndexMap<[u8; 20], &ImageInfo> {
        let mut out = IndexMap::new();
        for info in self.by_name.values() {
            out.entry(info.hash()).or_insert(info);
        }
        out
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Source of remote image bytes. No HTTP client is bundled; callers plug
/// one in.
pub trait ImageFetcher {
    /// Fetch a URL, returning the body and its `Content-Type`.
    fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)>;
}

/// Resolve the image type of a fetched resource. An explicit hint wins over
/// the content type.
pub fn remote_image_type(type_hint: &str, content_type: &str, url: &str) -> Result<ImageType> {
    if !type_hint.is_empty() {
        return type_hint.parse();
    }
    ImageType::from_content_type(content_type).ok_or_else(|| {
        Error::InvalidImage(format!(
            "cannot infer image type of '{}' from content type '{}'",
            url, content_type
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::decompress_data;
    use image::ImageEncoder;

    fn png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(rgba, width, height, image::ColorType::Rgba8)
            .unwrap();
        buf
    }

    fn jpeg_header(components: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment to skip
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x20, 0x00, 0x40, components]);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_detect_and_parse_type() {
        assert_eq!(ImageType::detect(PNG_MAGIC), Some(ImageType::Png));
        assert_eq!(ImageType::detect(&[0xFF, 0xD8, 0xFF]), Some(ImageType::Jpeg));
        assert_eq!(ImageType::detect(b"GIF89a"), None);
        assert_eq!(".JPG".parse::<ImageType>().unwrap(), ImageType::Jpeg);
        assert!("gif".parse::<ImageType>().is_err());
        assert_eq!(ImageType::from_content_type("image/png; charset=binary"), Some(ImageType::Png));
        assert_eq!(ImageType::from_content_type("text/html"), None);
    }

    #[test]
    fn test_jpeg_header() {
        let info = ImageInfo::from_jpeg(&jpeg_header(3)).unwrap();
        assert_eq!((info.width, info.height), (64, 32));
        assert_eq!(info.color_space, ColorSpace::DeviceRGB);
        assert_eq!(info.filter, Some("DCTDecode"));
        assert!(info.decode.is_none());

        let cmyk = ImageInfo::from_jpeg(&jpeg_header(4)).unwrap();
        assert_eq!(cmyk.decode.as_deref(), Some(&[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0][..]));
    }

    #[test]
    fn test_invalid_jpeg() {
        assert!(matches!(ImageInfo::from_jpeg(b"nope"), Err(Error::InvalidImage(_))));
        assert!(ImageInfo::from_jpeg(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn test_png_alpha_split() {
        let rgba = [255, 0, 0, 128, 0, 255, 0, 255];
        let info = ImageInfo::from_png(&png(2, 1, &rgba)).unwrap();
        assert_eq!(info.color_space, ColorSpace::DeviceRGB);
        assert_eq!(decompress_data(&info.data).unwrap(), vec![255, 0, 0, 0, 255, 0]);
        let mask = info.smask.as_ref().unwrap();
        assert_eq!(decompress_data(mask).unwrap(), vec![128, 255]);
        assert!(info.smask_dict().is_some());
    }

    #[test]
    fn test_opaque_png_has_no_mask() {
        let info = ImageInfo::from_png(&png(1, 1, &[1, 2, 3, 255])).unwrap();
        assert!(info.smask.is_none());
    }

    #[test]
    fn test_indexed_image() {
        let info = ImageInfo::indexed(2, 1, vec![0, 0, 0, 255, 255, 255], &[0, 1]).unwrap();
        let d = info.xobject_dict(Some(ObjectRef::new(12, 0)), None);
        let cs = d.get("ColorSpace").and_then(Object::as_array).unwrap();
        assert_eq!(cs[2], Object::Integer(1));
        assert_eq!(cs[3], Object::Reference(ObjectRef::new(12, 0)));

        assert!(ImageInfo::indexed(2, 1, vec![0, 0], &[0, 1]).is_err());
        assert!(ImageInfo::indexed(2, 1, vec![0, 0, 0], &[0, 1]).is_err());
        assert!(ImageInfo::indexed(3, 1, vec![0, 0, 0], &[0, 0]).is_err());
    }

    #[test]
    fn test_hash_dedup() {
        let bytes = png(1, 1, &[9, 9, 9, 255]);
        let mut registry = ImageRegistry::default();
        registry.register("a", ImageInfo::from_png(&bytes).unwrap());
        registry.register("b", ImageInfo::from_png(&bytes).unwrap());
        registry.register("c", ImageInfo::from_png(&bytes).unwrap().with_dpi(300.0));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.unique().len(), 2);
        assert_eq!(
            registry.get("a").unwrap().resource_name(),
            registry.get("b").unwrap().resource_name()
        );
        assert!(matches!(registry.require("zz"), Err(Error::ImageNotFound(_))));
    }

    #[test]
    fn test_placement_size() {
        let info = ImageInfo::from_jpeg(&jpeg_header(1)).unwrap();
        assert_eq!(info.placement_size(0.0, 0.0, 1.0), (64.0, 32.0));
        assert_eq!(info.placement_size(32.0, 0.0, 1.0), (32.0, 16.0));
        assert_eq!(info.placement_size(0.0, 64.0, 1.0), (128.0, 64.0));
        let hi = info.with_dpi(144.0);
        assert_eq!(hi.natural_size(1.0), (32.0, 16.0));
    }

    #[test]
    fn test_remote_type_resolution() {
        assert_eq!(remote_image_type("", "image/jpeg", "u").unwrap(), ImageType::Jpeg);
        assert_eq!(remote_image_type("png", "image/jpeg", "u").unwrap(), ImageType::Png);
        let err = remote_image_type("", "application/octet-stream", "http://x/y").unwrap_err();
        assert!(err.to_string().contains("http://x/y"));
    }

    #[test]
    fn test_transparency_mask() {
        let info = ImageInfo::indexed(1, 1, vec![1, 2, 3], &[0]).unwrap().with_transparency(vec![0]);
        let d = info.xobject_dict(None, None);
        assert_eq!(d.get("Mask"), Some(&Object::Array(vec![Object::Integer(0), Object::Integer(0)])));
    }
}
