//! PDF writing components.
//!
//! ```text
//! Document (pages, fonts, images, state)
//!     ↓
//! [ContentStream] (operators → content bytes, per page or template)
//!     ↓
//! [Serializer] (object numbering, xref, trailer)
//!     ↓
//! [ObjectSerializer] (objects → bytes, RC4 per object when protected)
//!     ↓
//! PDF bytes
//! ```
//!
//! The resource tables here ([`BlendStateTable`], [`GradientTable`],
//! [`SpotColorTable`], [`ImageRegistry`]) hand out the 1-based indices used
//! in resource names while the document is built.

pub mod content_stream;
pub mod embedded_files;
pub mod graphics_state;
pub mod image_handler;
pub mod links;
pub mod object_serializer;
pub mod outline_builder;
pub mod page;
pub mod serializer;
pub mod shading;

pub use content_stream::{ContentStream, ContentStreamOp, LineCap, LineJoin};
pub use embedded_files::{Attachment, AttachmentAnnotation};
pub use graphics_state::{
    BlendMode, BlendStateTable, ExtGState, RgbColor, SpotColor, SpotColorTable,
};
pub use image_handler::{ColorSpace, ImageFetcher, ImageInfo, ImageRegistry, ImageType};
pub use links::{LinkDest, LinkTable, LinkTarget, PageLink};
pub use object_serializer::ObjectSerializer;
pub use outline_builder::{OutlineEntry, Outlines};
pub use page::{PageBox, PageBoxes, PageState, Template};
pub use serializer::Serializer;
pub use shading::{Gradient, GradientKind, GradientTable};
