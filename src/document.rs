//! The document builder.
//!
//! [`Document`] accumulates pages, fonts, images and the other resources of a
//! PDF in memory. Coordinates are given in the configured user unit with the
//! origin at the top-left corner of the page, and are converted to PDF user
//! space (points, origin bottom-left) as operators are emitted.
//!
//! The first failing call puts the document in a sticky error state. Later
//! mutating calls do nothing and report that error, and [`Document::output`]
//! writes no bytes until [`Document::clear_error`] is called.
//!
//! # Example
//!
//! ```ignore
//! use pdf_forge::Document;
//!
//! let mut doc = Document::new();
//! doc.add_page()?;
//! doc.set_font("Helvetica", "B", 16.0)?;
//! doc.cell(40.0, 10.0, "Hello")?;
//! doc.output_file("hello.pdf")?;
//! ```

use std::f64::consts::PI;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::{DocumentConfig, Orientation, PageSize};
use crate::encryption::Permissions;
use crate::error::{Error, Result};
use crate::fonts::encoding::utf8_to_cp1252;
use crate::fonts::{FontCatalog, FontDefinition, FontSource, TextDecoration};
use crate::writer::content_stream::{ContentStreamOp as Op, LineCap, LineJoin};
use crate::writer::embedded_files::{Attachment, AttachmentAnnotation};
use crate::writer::graphics_state::{
    BlendMode, BlendStateTable, ExtGState, RgbColor, SpotColor, SpotColorTable,
};
use crate::writer::image_handler::{
    remote_image_type, ImageFetcher, ImageInfo, ImageRegistry, ImageType,
};
use crate::writer::links::{LinkDest, LinkTable, LinkTarget, PageLink};
use crate::writer::outline_builder::Outlines;
use crate::writer::page::{PageBox, PageBoxes, PageState, Template};
use crate::writer::serializer::Serializer;
use crate::writer::shading::{Gradient, GradientTable};

/// Bezier control point distance for quarter ellipses.
const KAPPA: f64 = 4.0 * (std::f64::consts::SQRT_2 - 1.0) / 3.0;

/// Initial zoom of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomMode {
    /// Whole page visible
    FullPage,
    /// Page width fits the window
    FullWidth,
    /// Actual size
    Real,
    /// Viewer default
    #[default]
    Default,
    /// Zoom factor in percent
    Percent(f64),
}

impl FromStr for ZoomMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fullpage" => Ok(ZoomMode::FullPage),
            "fullwidth" => Ok(ZoomMode::FullWidth),
            "real" => Ok(ZoomMode::Real),
            "default" | "" => Ok(ZoomMode::Default),
            other => match other.trim_end_matches('%').parse::<f64>() {
                Ok(pct) if pct > 0.0 => Ok(ZoomMode::Percent(pct)),
                _ => Err(Error::InvalidConfig(format!("incorrect zoom display mode: {}", s))),
            },
        }
    }
}

/// Initial page layout of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Viewer default
    #[default]
    Default,
    /// One page at a time
    SinglePage,
    /// Continuous single column
    OneColumn,
    /// Two columns, odd pages left
    TwoColumnLeft,
    /// Two columns, odd pages right
    TwoColumnRight,
    /// Two pages at a time, odd pages left
    TwoPageLeft,
    /// Two pages at a time, odd pages right
    TwoPageRight,
    /// Neither outlines nor thumbnails visible
    UseNone,
    /// Outline panel visible
    UseOutlines,
}

impl LayoutMode {
    /// Value of the catalog `/PageLayout` entry.
    pub fn page_layout(self) -> Option<&'static str> {
        match self {
            LayoutMode::SinglePage => Some("SinglePage"),
            LayoutMode::OneColumn => Some("OneColumn"),
            LayoutMode::TwoColumnLeft => Some("TwoColumnLeft"),
            LayoutMode::TwoColumnRight => Some("TwoColumnRight"),
            LayoutMode::TwoPageLeft => Some("TwoPageLeft"),
            LayoutMode::TwoPageRight => Some("TwoPageRight"),
            LayoutMode::Default | LayoutMode::UseNone | LayoutMode::UseOutlines => None,
        }
    }

    /// Value of the catalog `/PageMode` entry.
    pub fn page_mode(self) -> Option<&'static str> {
        match self {
            LayoutMode::UseNone => Some("UseNone"),
            LayoutMode::UseOutlines => Some("UseOutlines"),
            _ => None,
        }
    }
}

impl FromStr for LayoutMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "singlepage" => Ok(LayoutMode::SinglePage),
            "continuous" | "onecolumn" => Ok(LayoutMode::OneColumn),
            "two" | "twocolumnleft" => Ok(LayoutMode::TwoColumnLeft),
            "twocolumnright" => Ok(LayoutMode::TwoColumnRight),
            "twopageleft" => Ok(LayoutMode::TwoPageLeft),
            "twopageright" => Ok(LayoutMode::TwoPageRight),
            "default" | "" => Ok(LayoutMode::Default),
            "usenone" => Ok(LayoutMode::UseNone),
            "useoutlines" => Ok(LayoutMode::UseOutlines),
            _ => Err(Error::InvalidConfig(format!("incorrect layout display mode: {}", s))),
        }
    }
}

/// How a closed shape is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawStyle {
    /// Outline only (`D` or empty)
    #[default]
    Stroke,
    /// Interior only (`F`)
    Fill,
    /// Both (`DF`, `FD` or `B`)
    FillStroke,
}

impl DrawStyle {
    fn op(self) -> Op {
        match self {
            DrawStyle::Stroke => Op::Stroke,
            DrawStyle::Fill => Op::Fill,
            DrawStyle::FillStroke => Op::FillStroke,
        }
    }
}

impl FromStr for DrawStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "" | "D" => Ok(DrawStyle::Stroke),
            "F" => Ok(DrawStyle::Fill),
            "DF" | "FD" | "B" => Ok(DrawStyle::FillStroke),
            _ => Err(Error::InvalidConfig(format!("unknown draw style '{}'", s))),
        }
    }
}

/// Document information dictionary entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    /// `/Title`
    pub title: String,
    /// `/Subject`
    pub subject: String,
    /// `/Author`
    pub author: String,
    /// `/Keywords`
    pub keywords: String,
    /// `/Creator`
    pub creator: String,
    /// `/Producer`
    pub producer: String,
    /// `/CreationDate`; the output time when unset
    pub creation_date: Option<DateTime<Utc>>,
    /// `/ModDate`; omitted when unset
    pub mod_date: Option<DateTime<Utc>>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            subject: String::new(),
            author: String::new(),
            keywords: String::new(),
            creator: String::new(),
            producer: format!("{} {}", crate::NAME, crate::VERSION),
            creation_date: None,
            mod_date: None,
        }
    }
}

/// Passwords and permissions of a protected document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protection {
    /// Password required to open the document; may be empty
    pub user_password: String,
    /// Password granting full access; random when empty
    pub owner_password: String,
    /// Actions granted with the user password
    pub permissions: Permissions,
}

/// Options of [`Document::image_options`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageOptions {
    /// Place at the current y and advance it, breaking the page if needed
    pub flow: bool,
    /// Internal link id, 0 for none
    pub link: usize,
    /// External link, empty for none
    pub link_url: String,
    /// Image type used when the image is loaded from its name
    pub image_type: String,
}

/// Color used for strokes, fills or text.
#[derive(Debug, Clone, PartialEq)]
enum Paint {
    Rgb(RgbColor),
    Spot { index: usize, tint: u8 },
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Rgb(RgbColor::BLACK)
    }
}

impl Paint {
    fn fill_ops(&self) -> Vec<Op> {
        match self {
            Paint::Rgb(c) => vec![c.fill_op()],
            Paint::Spot { index, tint } => vec![
                Op::SetFillColorSpace(SpotColorTable::resource_name(*index)),
                Op::SetFillColorN(vec![*tint as f64 / 100.0]),
            ],
        }
    }

    fn stroke_ops(&self) -> Vec<Op> {
        match self {
            Paint::Rgb(c) => vec![c.stroke_op()],
            Paint::Spot { index, tint } => vec![
                Op::SetStrokeColorSpace(SpotColorTable::resource_name(*index)),
                Op::SetStrokeColorN(vec![*tint as f64 / 100.0]),
            ],
        }
    }
}

/// Sticky error state.
#[derive(Debug, Clone)]
enum DocState {
    Ok,
    Failed(Error),
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveFont {
    id: String,
    family: String,
    style: String,
    decoration: TextDecoration,
}

/// Font, colors and line width captured across a page change.
#[derive(Debug, Clone)]
struct GraphicsSnapshot {
    font: Option<ActiveFont>,
    font_size_pt: f64,
    line_width: f64,
    draw: Paint,
    fill: Paint,
    text: Paint,
    color_flag: bool,
}

/// Layout values swapped out while a template is recorded.
#[derive(Debug)]
struct Recording {
    template: Template,
    w: f64,
    h: f64,
    x: f64,
    y: f64,
    trigger: f64,
}

type PageCallback = Box<dyn FnMut(&mut Document) + Send>;
type BreakPredicate = Box<dyn Fn(&Document) -> bool + Send>;

/// In-memory PDF document builder.
pub struct Document {
    pub(crate) config: DocumentConfig,
    state: DocState,
    /// Points per user unit
    pub(crate) k: f64,
    def_orientation: Orientation,
    def_size: PageSize,
    cur_orientation: Orientation,
    cur_size: PageSize,
    def_boxes: PageBoxes,
    /// Index 0 is an unused sentinel
    pub(crate) pages: Vec<PageState>,
    page: usize,
    w: f64,
    h: f64,
    l_margin: f64,
    t_margin: f64,
    r_margin: f64,
    b_margin: f64,
    c_margin: f64,
    x: f64,
    y: f64,
    lasth: f64,
    line_width: f64,
    pub(crate) fonts: FontCatalog,
    font: Option<ActiveFont>,
    font_size_pt: f64,
    font_size: f64,
    last_fell_back: bool,
    draw_color: Paint,
    fill_color: Paint,
    text_color: Paint,
    color_flag: bool,
    ws: f64,
    pub(crate) images: ImageRegistry,
    pub(crate) blend_states: BlendStateTable,
    pub(crate) gradients: GradientTable,
    pub(crate) spot_colors: SpotColorTable,
    pub(crate) templates: Vec<Template>,
    recording: Option<Recording>,
    pub(crate) links: LinkTable,
    pub(crate) outlines: Outlines,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) info: DocumentInfo,
    pub(crate) xmp: Option<Bytes>,
    pub(crate) zoom: ZoomMode,
    pub(crate) layout: LayoutMode,
    pub(crate) protection: Option<Protection>,
    auto_page_break: bool,
    page_break_trigger: f64,
    accept_page_break: Option<BreakPredicate>,
    header: Option<PageCallback>,
    footer: Option<PageCallback>,
    header_home: bool,
    in_header: bool,
    in_footer: bool,
    pub(crate) alias_nb: String,
    clip_nest: usize,
    transform_nest: usize,
    closed: bool,
    pub(crate) pdf_version: String,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pages", &self.page_count())
            .field("page", &self.page)
            .field("fonts", &self.fonts)
            .field("images", &self.images.len())
            .field("pdf_version", &self.pdf_version)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Document with the default configuration: portrait A4 in millimeters.
    pub fn new() -> Self {
        Self::build(DocumentConfig::new())
    }

    /// Document with an explicit configuration, validated eagerly.
    pub fn with_config(config: DocumentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Document from the classic string arguments: orientation (`P`/`L`),
    /// unit (`pt`, `mm`, `cm`, `in`), page size name and font directory.
    pub fn create(orientation: &str, unit: &str, size: &str, font_dir: &str) -> Result<Self> {
        let config = DocumentConfig::new()
            .with_orientation(orientation.parse()?)
            .with_unit(unit.parse()?)
            .with_page_size(size.parse()?)
            .with_font_dir(font_dir);
        Self::with_config(config)
    }

    fn build(config: DocumentConfig) -> Self {
        let k = config.unit.scale_factor();
        let (wpt, hpt) = config.page_size.oriented(config.orientation);
        // 1 cm
        let margin = 28.35 / k;
        let fonts = FontCatalog::new(config.file_source.clone(), config.font_dir.clone());
        let w = wpt / k;
        let h = hpt / k;
        Self {
            state: DocState::Ok,
            k,
            def_orientation: config.orientation,
            def_size: config.page_size,
            cur_orientation: config.orientation,
            cur_size: config.page_size,
            def_boxes: PageBoxes::new(),
            pages: vec![PageState::default()],
            page: 0,
            w,
            h,
            l_margin: margin,
            t_margin: margin,
            r_margin: margin,
            b_margin: 2.0 * margin,
            c_margin: margin / 10.0,
            x: margin,
            y: margin,
            lasth: 0.0,
            line_width: 0.567 / k,
            fonts,
            font: None,
            font_size_pt: 12.0,
            font_size: 12.0 / k,
            last_fell_back: false,
            draw_color: Paint::default(),
            fill_color: Paint::default(),
            text_color: Paint::default(),
            color_flag: false,
            ws: 0.0,
            images: ImageRegistry::default(),
            blend_states: BlendStateTable::new(),
            gradients: GradientTable::default(),
            spot_colors: SpotColorTable::default(),
            templates: Vec::new(),
            recording: None,
            links: LinkTable::default(),
            outlines: Outlines::default(),
            attachments: Vec::new(),
            info: DocumentInfo::default(),
            xmp: None,
            zoom: ZoomMode::Default,
            layout: LayoutMode::Default,
            protection: None,
            auto_page_break: true,
            page_break_trigger: h - 2.0 * margin,
            accept_page_break: None,
            header: None,
            footer: None,
            header_home: false,
            in_header: false,
            in_footer: false,
            alias_nb: String::new(),
            clip_nest: 0,
            transform_nest: 0,
            closed: false,
            pdf_version: config.pdf_version.clone(),
            config,
        }
    }

    // ---------------------------------------------------------------------
    // Error state
    // ---------------------------------------------------------------------

    /// True while no error has been recorded.
    pub fn ok(&self) -> bool {
        matches!(self.state, DocState::Ok)
    }

    /// The recorded error, if any.
    pub fn err(&self) -> Option<&Error> {
        match &self.state {
            DocState::Ok => None,
            DocState::Failed(e) => Some(e),
        }
    }

    /// Reset the error state. Content emitted before the failure is kept.
    pub fn clear_error(&mut self) {
        self.state = DocState::Ok;
    }

    /// Record an error as the sticky error and return it.
    pub fn set_error(&mut self, err: Error) -> Error {
        if self.ok() {
            log::warn!("Document error ({}): {}", err.category(), err);
            self.state = DocState::Failed(err.clone());
        }
        err
    }

    fn check(&self) -> Result<()> {
        match &self.state {
            DocState::Ok => Ok(()),
            DocState::Failed(e) => Err(e.clone()),
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.set_error(e))
    }

    /// Run a mutation unless failed, recording its error.
    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check()?;
        let result = f(self);
        self.record(result)
    }

    /// Append operators to the template being recorded or the current page.
    fn out(&mut self, ops: impl IntoIterator<Item = Op>) -> Result<()> {
        let sink = match (&mut self.recording, self.page) {
            (Some(rec), _) => Some(&mut rec.template.content),
            (None, 0) => None,
            (None, n) => self.pages.get_mut(n).map(|p| &mut p.content),
        };
        match sink {
            Some(content) => {
                content.extend(ops);
                Ok(())
            },
            None => Err(Error::Sequence("no page has been added yet".into())),
        }
    }

    fn has_sink(&self) -> bool {
        self.page > 0 || self.recording.is_some()
    }

    // ---------------------------------------------------------------------
    // Configuration and metadata
    // ---------------------------------------------------------------------

    /// Construction-time configuration.
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Registered fonts.
    pub fn fonts(&self) -> &FontCatalog {
        &self.fonts
    }

    /// Registered images.
    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }

    /// Scale factor: points per user unit.
    pub fn scale_factor(&self) -> f64 {
        self.k
    }

    /// Enable or disable page content compression.
    pub fn set_compression(&mut self, compress: bool) {
        if self.ok() {
            self.config.compression = compress;
        }
    }

    /// Sort resource dictionaries by key for reproducible output.
    pub fn set_catalog_sort(&mut self, sort: bool) {
        if self.ok() {
            self.config.catalog_sort = sort;
        }
    }

    /// Set the viewer's initial zoom and layout.
    pub fn set_display_mode(&mut self, zoom: &str, layout: &str) -> Result<()> {
        self.guard(|d| {
            d.zoom = zoom.parse()?;
            d.layout = layout.parse()?;
            Ok(())
        })
    }

    /// Document title.
    pub fn set_title(&mut self, title: &str) {
        if self.ok() {
            self.info.title = title.to_string();
        }
    }

    /// Document subject.
    pub fn set_subject(&mut self, subject: &str) {
        if self.ok() {
            self.info.subject = subject.to_string();
        }
    }

    /// Document author.
    pub fn set_author(&mut self, author: &str) {
        if self.ok() {
            self.info.author = author.to_string();
        }
    }

    /// Document keywords.
    pub fn set_keywords(&mut self, keywords: &str) {
        if self.ok() {
            self.info.keywords = keywords.to_string();
        }
    }

    /// Application that created the content.
    pub fn set_creator(&mut self, creator: &str) {
        if self.ok() {
            self.info.creator = creator.to_string();
        }
    }

    /// Application that produced the PDF.
    pub fn set_producer(&mut self, producer: &str) {
        if self.ok() {
            self.info.producer = producer.to_string();
        }
    }

    /// Fix the creation date instead of using the output time.
    pub fn set_creation_date(&mut self, date: DateTime<Utc>) {
        if self.ok() {
            self.info.creation_date = Some(date);
        }
    }

    /// Set the modification date.
    pub fn set_modification_date(&mut self, date: DateTime<Utc>) {
        if self.ok() {
            self.info.mod_date = Some(date);
        }
    }

    /// Document information entries.
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Attach a raw XMP packet as the document metadata stream.
    pub fn set_xmp_metadata(&mut self, xmp: impl Into<Bytes>) {
        if self.ok() {
            self.xmp = Some(xmp.into());
            self.require_version("1.4");
        }
    }

    /// Protect the document with RC4 40-bit encryption. An empty owner
    /// password is replaced by a random one at output.
    pub fn set_protection(&mut self, permissions: Permissions, user_password: &str, owner_password: &str) {
        if self.ok() {
            self.protection = Some(Protection {
                user_password: user_password.to_string(),
                owner_password: owner_password.to_string(),
                permissions,
            });
        }
    }

    /// Define the placeholder replaced by the page count at output. An empty
    /// alias selects `{nb}`.
    pub fn alias_nb_pages(&mut self, alias: &str) {
        if self.ok() {
            self.alias_nb = if alias.is_empty() { "{nb}".to_string() } else { alias.to_string() };
        }
    }

    /// Header version written to the output.
    pub fn pdf_version(&self) -> &str {
        &self.pdf_version
    }

    fn require_version(&mut self, version: &str) {
        if self.pdf_version.as_str() < version {
            log::debug!("PDF version raised from {} to {}", self.pdf_version, version);
            self.pdf_version = version.to_string();
        }
    }

    // ---------------------------------------------------------------------
    // Layout
    // ---------------------------------------------------------------------

    /// Set left, top and right margins.
    pub fn set_margins(&mut self, left: f64, top: f64, right: f64) {
        if self.ok() {
            self.l_margin = left;
            self.t_margin = top;
            self.r_margin = right;
        }
    }

    /// Set the left margin, moving x if it lies left of it.
    pub fn set_left_margin(&mut self, margin: f64) {
        if self.ok() {
            self.l_margin = margin;
            if self.page > 0 && self.x < margin {
                self.x = margin;
            }
        }
    }

    /// Set the top margin.
    pub fn set_top_margin(&mut self, margin: f64) {
        if self.ok() {
            self.t_margin = margin;
        }
    }

    /// Set the right margin.
    pub fn set_right_margin(&mut self, margin: f64) {
        if self.ok() {
            self.r_margin = margin;
        }
    }

    /// Set the horizontal padding inside cells.
    pub fn set_cell_margin(&mut self, margin: f64) {
        if self.ok() {
            self.c_margin = margin;
        }
    }

    /// Margins as (left, top, right, bottom).
    pub fn margins(&self) -> (f64, f64, f64, f64) {
        (self.l_margin, self.t_margin, self.r_margin, self.b_margin)
    }

    /// Enable or disable automatic page breaks, with the bottom margin that
    /// triggers them.
    pub fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        if self.ok() {
            self.auto_page_break = auto;
            self.b_margin = margin;
            self.page_break_trigger = self.h - margin;
        }
    }

    /// Decide page breaks with a predicate instead of the auto flag.
    pub fn set_accept_page_break_func(&mut self, f: impl Fn(&Document) -> bool + Send + 'static) {
        if self.ok() {
            self.accept_page_break = Some(Box::new(f));
        }
    }

    fn accepts_page_break(&self) -> bool {
        match &self.accept_page_break {
            Some(f) => f(self),
            None => self.auto_page_break,
        }
    }

    /// Callback run at the start of every page.
    pub fn set_header_func(&mut self, f: impl FnMut(&mut Document) + Send + 'static) {
        self.set_header_func_mode(f, false);
    }

    /// Header callback; with `home_mode` the position is reset to the top
    /// left margin after it runs.
    pub fn set_header_func_mode(&mut self, f: impl FnMut(&mut Document) + Send + 'static, home_mode: bool) {
        if self.ok() {
            self.header = Some(Box::new(f));
            self.header_home = home_mode;
        }
    }

    /// Callback run at the end of every page.
    pub fn set_footer_func(&mut self, f: impl FnMut(&mut Document) + Send + 'static) {
        if self.ok() {
            self.footer = Some(Box::new(f));
        }
    }

    /// Current x.
    pub fn get_x(&self) -> f64 {
        self.x
    }

    /// Current y.
    pub fn get_y(&self) -> f64 {
        self.y
    }

    /// Set x; negative values count from the right edge.
    pub fn set_x(&mut self, x: f64) {
        if self.ok() {
            self.x = if x >= 0.0 { x } else { self.w + x };
        }
    }

    /// Set y and move x to the left margin; negative values count from the
    /// bottom edge.
    pub fn set_y(&mut self, y: f64) {
        if self.ok() {
            self.x = self.l_margin;
            self.y = if y >= 0.0 { y } else { self.h + y };
        }
    }

    /// Set both coordinates.
    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_y(y);
        self.set_x(x);
    }

    /// Current page number, 0 before the first page.
    pub fn page_no(&self) -> usize {
        self.page
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len() - 1
    }

    /// Size of the current page in user units.
    pub fn page_size(&self) -> (f64, f64) {
        (self.w, self.h)
    }

    /// Define a page box for the current and all later pages. `kind` is
    /// `trim`, `bleed`, `crop`, `art` or `media`, with or without a leading
    /// `/` and `Box` suffix.
    pub fn set_page_box(&mut self, kind: &str, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.guard(|d| {
            let kind: PageBox = kind.parse()?;
            let k = d.k;
            let rect = [x * k, y * k, (x + w) * k, (y + h) * k];
            if d.page > 0 {
                d.pages[d.page].boxes.insert(kind, rect);
            }
            d.def_boxes.insert(kind, rect);
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // Pages
    // ---------------------------------------------------------------------

    /// Start a page with the default orientation and size.
    pub fn add_page(&mut self) -> Result<()> {
        let (orientation, size) = (self.def_orientation, self.def_size);
        self.add_page_format(orientation, size)
    }

    /// Start a page with its own orientation and size.
    pub fn add_page_format(&mut self, orientation: Orientation, size: PageSize) -> Result<()> {
        self.guard(|d| d.add_page_inner(orientation, size))
    }

    fn add_page_inner(&mut self, orientation: Orientation, size: PageSize) -> Result<()> {
        if self.closed {
            return Err(Error::Sequence("document has already been output".into()));
        }
        if self.recording.is_some() {
            return Err(Error::Sequence("cannot add a page while recording a template".into()));
        }
        if self.clip_nest > 0 {
            return Err(Error::Sequence("cannot add a page with an open clipping operation".into()));
        }
        if self.transform_nest > 0 {
            return Err(Error::Sequence("cannot add a page with an open transformation".into()));
        }

        let snapshot = self.snapshot();
        if self.page > 0 {
            self.run_footer()?;
        }
        self.begin_page(orientation, size);
        self.out([
            Op::SetLineCap(LineCap::Square),
            Op::SetLineWidth(snapshot.line_width * self.k),
        ])?;
        self.line_width = snapshot.line_width;
        self.restore(&snapshot, true)?;

        self.run_header()?;
        self.restore(&snapshot, false)
    }

    fn begin_page(&mut self, orientation: Orientation, size: PageSize) {
        let (wpt, hpt) = size.oriented(orientation);
        let mut page = PageState::new(wpt, hpt, orientation);
        page.boxes = self.def_boxes.clone();
        self.pages.push(page);
        self.page = self.pages.len() - 1;
        self.cur_orientation = orientation;
        self.cur_size = size;
        self.w = wpt / self.k;
        self.h = hpt / self.k;
        self.page_break_trigger = self.h - self.b_margin;
        self.x = self.l_margin;
        self.y = self.t_margin;
        self.font = None;
        log::debug!("Began page {} ({:.2}x{:.2} pt)", self.page, wpt, hpt);
    }

    fn snapshot(&self) -> GraphicsSnapshot {
        GraphicsSnapshot {
            font: self.font.clone(),
            font_size_pt: self.font_size_pt,
            line_width: self.line_width,
            draw: self.draw_color.clone(),
            fill: self.fill_color.clone(),
            text: self.text_color.clone(),
            color_flag: self.color_flag,
        }
    }

    /// Reapply a snapshot. On a fresh page everything that differs from the
    /// PDF defaults is emitted; after callbacks only what they changed.
    fn restore(&mut self, s: &GraphicsSnapshot, fresh: bool) -> Result<()> {
        if !fresh && self.line_width != s.line_width {
            self.line_width = s.line_width;
            self.out([Op::SetLineWidth(s.line_width * self.k)])?;
        }
        if s.font.is_some() && (self.font != s.font || self.font_size_pt != s.font_size_pt) {
            self.font = s.font.clone();
            self.font_size_pt = s.font_size_pt;
            self.font_size = s.font_size_pt / self.k;
            self.emit_font()?;
        }
        let black = Paint::default();
        if (fresh && s.draw != black) || (!fresh && self.draw_color != s.draw) {
            self.draw_color = s.draw.clone();
            self.out(s.draw.stroke_ops())?;
        }
        if (fresh && s.fill != black) || (!fresh && self.fill_color != s.fill) {
            self.fill_color = s.fill.clone();
            self.out(s.fill.fill_ops())?;
        }
        self.text_color = s.text.clone();
        self.color_flag = s.color_flag;
        Ok(())
    }

    fn run_header(&mut self) -> Result<()> {
        if let Some(mut header) = self.header.take() {
            self.in_header = true;
            header(self);
            self.in_header = false;
            self.header.get_or_insert(header);
            if self.header_home {
                self.x = self.l_margin;
                self.y = self.t_margin;
            }
        }
        self.check()
    }

    fn run_footer(&mut self) -> Result<()> {
        if let Some(mut footer) = self.footer.take() {
            self.in_footer = true;
            footer(self);
            self.in_footer = false;
            self.footer.get_or_insert(footer);
        }
        self.check()
    }

    fn close(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::Sequence("template recording was not ended".into()));
        }
        if self.clip_nest > 0 {
            return Err(Error::Sequence("clipping operation was not ended".into()));
        }
        if self.transform_nest > 0 {
            return Err(Error::Sequence("transformation was not ended".into()));
        }
        if self.page == 0 {
            let (orientation, size) = (self.def_orientation, self.def_size);
            self.add_page_inner(orientation, size)?;
        }
        self.run_footer()?;
        self.closed = true;
        Ok(())
    }

    fn page_break_if_needed(&mut self, height: f64) -> Result<()> {
        if self.y + height > self.page_break_trigger
            && !self.in_header
            && !self.in_footer
            && self.accepts_page_break()
        {
            let x = self.x;
            let ws = self.ws;
            if ws > 0.0 {
                self.ws = 0.0;
                self.out([Op::SetWordSpacing(0.0)])?;
            }
            let (orientation, size) = (self.cur_orientation, self.cur_size);
            self.add_page_inner(orientation, size)?;
            self.x = x;
            if ws > 0.0 {
                self.ws = ws;
                self.out([Op::SetWordSpacing(ws * self.k)])?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Fonts and text
    // ---------------------------------------------------------------------

    /// Register a font under a family and style.
    pub fn add_font(&mut self, family: &str, style: &str, source: FontSource) -> Result<()> {
        self.guard(|d| d.fonts.register(family, style, source).map(|_| ()))
    }

    /// Register a TrueType file, embedded as a UTF-8 subset.
    pub fn add_utf8_font(&mut self, family: &str, style: &str, file: impl AsRef<Path>) -> Result<()> {
        self.add_font(family, style, FontSource::Utf8File(file.as_ref().to_path_buf()))
    }

    /// Register TrueType program bytes, embedded as a UTF-8 subset.
    pub fn add_utf8_font_from_bytes(&mut self, family: &str, style: &str, bytes: Vec<u8>) -> Result<()> {
        self.add_font(family, style, FontSource::Utf8Bytes(bytes))
    }

    /// Register a JSON font definition file and its program sidecar.
    pub fn add_font_from_json(&mut self, family: &str, style: &str, file: impl AsRef<Path>) -> Result<()> {
        self.add_font(family, style, FontSource::JsonFile(file.as_ref().to_path_buf()))
    }

    /// Select the font for subsequent text. A size of 0 keeps the current
    /// size. Standard font families are registered on first use.
    pub fn set_font(&mut self, family: &str, style: &str, size: f64) -> Result<()> {
        self.guard(|d| {
            let family = if family.is_empty() {
                d.font
                    .as_ref()
                    .map(|f| f.family.clone())
                    .ok_or_else(|| Error::Sequence("no current font family to reuse".into()))?
            } else {
                family.to_lowercase()
            };
            let resolved = d.fonts.resolve(&family, style)?;
            d.last_fell_back = resolved.fell_back;
            let size = if size == 0.0 { d.font_size_pt } else { size };
            let font = ActiveFont {
                id: resolved.id,
                family,
                style: style.to_ascii_uppercase(),
                decoration: resolved.decoration,
            };
            if d.font.as_ref() == Some(&font) && d.font_size_pt == size {
                return Ok(());
            }
            d.font = Some(font);
            d.font_size_pt = size;
            d.font_size = size / d.k;
            if d.has_sink() {
                d.emit_font()?;
            }
            Ok(())
        })
    }

    /// Change the font size in points.
    pub fn set_font_size(&mut self, size: f64) -> Result<()> {
        self.guard(|d| {
            if d.font_size_pt == size {
                return Ok(());
            }
            d.font_size_pt = size;
            d.font_size = size / d.k;
            if d.font.is_some() && d.has_sink() {
                d.emit_font()?;
            }
            Ok(())
        })
    }

    /// Current font size as (points, user units).
    pub fn font_size(&self) -> (f64, f64) {
        (self.font_size_pt, self.font_size)
    }

    /// True when the last `set_font` used the Regular face because the
    /// requested style was not registered.
    pub fn last_font_fell_back(&self) -> bool {
        self.last_fell_back
    }

    fn emit_font(&mut self) -> Result<()> {
        let Some(font) = &self.font else {
            return Ok(());
        };
        let name = format!("F{}", font.id);
        let size = self.font_size_pt;
        self.out([Op::BeginText, Op::SetFont(name, size), Op::EndText])
    }

    fn font_def(&self) -> Result<&FontDefinition> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| Error::Sequence("no font has been set".into()))?;
        self.fonts
            .definition(&font.id)
            .ok_or_else(|| Error::FontNotFound(font.family.clone()))
    }

    /// Encode text for the current font, recording used code points.
    fn encode_text(&mut self, txt: &str) -> Result<Vec<u8>> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| Error::Sequence("no font has been set".into()))?;
        let def = self
            .fonts
            .definition_mut(&font.id)
            .ok_or_else(|| Error::FontNotFound(font.family.clone()))?;
        if def.is_utf8() {
            Ok(def.encode_cids(txt, &self.alias_nb))
        } else {
            Ok(utf8_to_cp1252(txt))
        }
    }

    /// Width of a string in user units with the current font, 0 when no
    /// font is set.
    pub fn get_string_width(&self, txt: &str) -> f64 {
        match self.font_def() {
            Ok(def) => def.string_width(txt) as f64 * self.font_size / 1000.0,
            Err(_) => 0.0,
        }
    }

    /// Underline and strike-out rectangles for text drawn at `(x, y)`.
    fn decoration_ops(&self, x: f64, y: f64, txt: &str) -> Result<Vec<Op>> {
        let decoration = self.font.as_ref().map(|f| f.decoration).unwrap_or_default();
        if !decoration.underline && !decoration.strike_out {
            return Ok(Vec::new());
        }
        let def = self.font_def()?;
        let (up, ut) = (def.up as f64, def.ut as f64);
        let blanks = txt.chars().filter(|c| *c == ' ').count() as f64;
        let w = self.get_string_width(txt) + self.ws * blanks;
        let k = self.k;
        let mut ops = Vec::new();
        if decoration.underline {
            ops.push(Op::Rectangle(
                x * k,
                (self.h - (y - up / 1000.0 * self.font_size)) * k,
                w * k,
                -ut / 1000.0 * self.font_size_pt,
            ));
            ops.push(Op::Fill);
        }
        if decoration.strike_out {
            ops.push(Op::Rectangle(
                x * k,
                (self.h - (y + 4.0 * up / 1000.0 * self.font_size)) * k,
                w * k,
                -ut / 1000.0 * self.font_size_pt,
            ));
            ops.push(Op::Fill);
        }
        Ok(ops)
    }

    /// Print a string with its baseline at `(x, y)`.
    pub fn text(&mut self, x: f64, y: f64, txt: &str) -> Result<()> {
        self.guard(|d| {
            let encoded = d.encode_text(txt)?;
            let k = d.k;
            let mut ops = vec![
                Op::BeginText,
                Op::MoveText(x * k, (d.h - y) * k),
                Op::ShowText(encoded),
                Op::EndText,
            ];
            ops.extend(d.decoration_ops(x, y, txt)?);
            if d.color_flag {
                let mut wrapped = vec![Op::SaveState];
                wrapped.extend(d.text_color.fill_ops());
                wrapped.extend(ops);
                wrapped.push(Op::RestoreState);
                ops = wrapped;
            }
            d.out(ops)
        })
    }

    /// Print a cell with no border, left aligned, staying on the line.
    pub fn cell(&mut self, w: f64, h: f64, txt: &str) -> Result<()> {
        self.cell_format(w, h, txt, "", 0, "L", false, 0, "")
    }

    /// Print a cell.
    ///
    /// - `w == 0` extends the cell to the right margin
    /// - `border`: `""`, `"1"` for a frame, or any of `L`, `T`, `R`, `B`
    /// - `ln`: 0 to the right, 1 to the start of the next line, 2 below
    /// - `align`: `L`, `C` or `R`
    /// - `link`/`link_url`: internal link id or URL, `0`/`""` for none
    #[allow(clippy::too_many_arguments)]
    pub fn cell_format(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: &str,
        ln: u8,
        align: &str,
        fill: bool,
        link: usize,
        link_url: &str,
    ) -> Result<()> {
        self.guard(|d| d.cell_inner(w, h, txt, border, ln, align, fill, link, link_url))
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_inner(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: &str,
        ln: u8,
        align: &str,
        fill: bool,
        link: usize,
        link_url: &str,
    ) -> Result<()> {
        self.page_break_if_needed(h)?;
        let k = self.k;
        let w = if w == 0.0 { self.w - self.r_margin - self.x } else { w };
        let (x, y, page_h) = (self.x, self.y, self.h);
        let border = border.to_ascii_uppercase();
        let mut ops = Vec::new();

        if fill || border == "1" {
            let style = match (fill, border == "1") {
                (true, true) => DrawStyle::FillStroke,
                (true, false) => DrawStyle::Fill,
                _ => DrawStyle::Stroke,
            };
            ops.push(Op::Rectangle(x * k, (page_h - y) * k, w * k, -h * k));
            ops.push(style.op());
        }
        if border != "1" {
            let edges = [
                ('L', (x, y), (x, y + h)),
                ('T', (x, y), (x + w, y)),
                ('R', (x + w, y), (x + w, y + h)),
                ('B', (x, y + h), (x + w, y + h)),
            ];
            for (edge, (x1, y1), (x2, y2)) in edges {
                if border.contains(edge) {
                    ops.push(Op::MoveTo(x1 * k, (page_h - y1) * k));
                    ops.push(Op::LineTo(x2 * k, (page_h - y2) * k));
                    ops.push(Op::Stroke);
                }
            }
        }

        if !txt.is_empty() {
            let sw = self.get_string_width(txt);
            let dx = match align.to_ascii_uppercase().as_str() {
                "R" => w - self.c_margin - sw,
                "C" => (w - sw) / 2.0,
                _ => self.c_margin,
            };
            let baseline = y + 0.5 * h + 0.3 * self.font_size;
            let encoded = self.encode_text(txt)?;
            if self.color_flag {
                ops.push(Op::SaveState);
                ops.extend(self.text_color.fill_ops());
            }
            ops.extend([
                Op::BeginText,
                Op::MoveText((x + dx) * k, (page_h - baseline) * k),
                Op::ShowText(encoded),
                Op::EndText,
            ]);
            ops.extend(self.decoration_ops(x + dx, baseline, txt)?);
            if self.color_flag {
                ops.push(Op::RestoreState);
            }
            let target = if link > 0 {
                Some(LinkTarget::Internal(link))
            } else if !link_url.is_empty() {
                Some(LinkTarget::Uri(link_url.to_string()))
            } else {
                None
            };
            if let Some(target) = target {
                let fs = self.font_size;
                self.new_link(x + dx, y + 0.5 * h - 0.5 * fs, sw, fs, target)?;
            }
        }
        if !ops.is_empty() {
            self.out(ops)?;
        }

        self.lasth = h;
        if ln > 0 {
            self.y += h;
            if ln == 1 {
                self.x = self.l_margin;
            }
        } else {
            self.x += w;
        }
        Ok(())
    }

    /// Print flowing text from the current position, wrapping at the right
    /// margin and on newlines. `link` is an internal link id, 0 for none.
    pub fn write(&mut self, h: f64, txt: &str) -> Result<()> {
        self.write_linked(h, txt, 0, "")
    }

    /// [`write`](Self::write) with an internal link or URL on every chunk.
    pub fn write_linked(&mut self, h: f64, txt: &str, link: usize, link_url: &str) -> Result<()> {
        self.guard(|d| d.write_inner(h, txt, link, link_url))
    }

    fn write_inner(&mut self, h: f64, txt: &str, link: usize, link_url: &str) -> Result<()> {
        let chars: Vec<char> = txt.chars().filter(|c| *c != '\r').collect();
        let widths: Vec<f64> = {
            let def = self.font_def()?;
            chars.iter().map(|c| def.char_width(*c) as f64).collect()
        };
        let chunk = |from: usize, to: usize| -> String { chars[from..to].iter().collect() };

        let mut w = self.w - self.r_margin - self.x;
        let mut wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
        let (mut sep, mut i, mut j, mut l, mut nl) = (None, 0usize, 0usize, 0.0, 1);

        while i < chars.len() {
            let c = chars[i];
            if c == '\n' {
                self.cell_inner(w, h, &chunk(j, i), "", 2, "", false, link, link_url)?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.l_margin;
                    w = self.w - self.r_margin - self.x;
                    wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
                }
                nl += 1;
                continue;
            }
            if c == ' ' {
                sep = Some(i);
            }
            l += widths[i];
            if l <= wmax {
                i += 1;
                continue;
            }

            match sep {
                None if self.x > self.l_margin => {
                    // start over on a fresh line
                    self.x = self.l_margin;
                    self.y += h;
                    w = self.w - self.r_margin - self.x;
                    wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
                    i = j;
                    l = 0.0;
                    nl += 1;
                    continue;
                },
                None => {
                    if i == j {
                        i += 1;
                    }
                    self.cell_inner(w, h, &chunk(j, i), "", 2, "", false, link, link_url)?;
                },
                Some(s) => {
                    self.cell_inner(w, h, &chunk(j, s), "", 2, "", false, link, link_url)?;
                    i = s + 1;
                },
            }
            sep = None;
            j = i;
            l = 0.0;
            if nl == 1 {
                self.x = self.l_margin;
                w = self.w - self.r_margin - self.x;
                wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
            }
            nl += 1;
        }
        if i != j {
            let width = l / 1000.0 * self.font_size + 2.0 * self.c_margin;
            self.cell_inner(width, h, &chunk(j, chars.len()), "", 0, "", false, link, link_url)?;
        }
        Ok(())
    }

    /// Line break: x back to the left margin, y down by `h` (or the height
    /// of the last cell when `h` is negative).
    pub fn ln(&mut self, h: f64) {
        if self.ok() {
            self.x = self.l_margin;
            self.y += if h < 0.0 { self.lasth } else { h };
        }
    }

    /// Set the word spacing (`Tw`) in user units.
    pub fn set_word_spacing(&mut self, ws: f64) -> Result<()> {
        self.guard(|d| {
            d.ws = ws;
            d.out([Op::SetWordSpacing(ws * d.k)])
        })
    }

    // ---------------------------------------------------------------------
    // Colors and drawing
    // ---------------------------------------------------------------------

    /// Stroke color.
    pub fn set_draw_color(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        self.guard(|d| d.apply_draw(Paint::Rgb(RgbColor::new(r, g, b))))
    }

    /// Fill color.
    pub fn set_fill_color(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        self.guard(|d| d.apply_fill(Paint::Rgb(RgbColor::new(r, g, b))))
    }

    /// Text color.
    pub fn set_text_color(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        self.guard(|d| {
            d.text_color = Paint::Rgb(RgbColor::new(r, g, b));
            d.color_flag = d.fill_color != d.text_color;
            Ok(())
        })
    }

    fn apply_draw(&mut self, paint: Paint) -> Result<()> {
        let ops = paint.stroke_ops();
        self.draw_color = paint;
        if self.has_sink() {
            self.out(ops)?;
        }
        Ok(())
    }

    fn apply_fill(&mut self, paint: Paint) -> Result<()> {
        let ops = paint.fill_ops();
        self.fill_color = paint;
        self.color_flag = self.fill_color != self.text_color;
        if self.has_sink() {
            self.out(ops)?;
        }
        Ok(())
    }

    /// Define a spot color by name with its CMYK alternate (percentages).
    pub fn add_spot_color(&mut self, name: &str, c: u8, m: u8, y: u8, k: u8) -> Result<()> {
        self.guard(|d| {
            let color = SpotColor::new(name, c, m, y, k)?;
            d.spot_colors.register(color);
            Ok(())
        })
    }

    fn spot(&self, name: &str, tint: u8) -> Result<Paint> {
        let index = self.spot_colors.index_of(name)?;
        Ok(Paint::Spot {
            index,
            tint: tint.min(100),
        })
    }

    /// Stroke with a spot color at `tint` percent.
    pub fn set_draw_spot_color(&mut self, name: &str, tint: u8) -> Result<()> {
        self.guard(|d| {
            let paint = d.spot(name, tint)?;
            d.apply_draw(paint)
        })
    }

    /// Fill with a spot color at `tint` percent.
    pub fn set_fill_spot_color(&mut self, name: &str, tint: u8) -> Result<()> {
        self.guard(|d| {
            let paint = d.spot(name, tint)?;
            d.apply_fill(paint)
        })
    }

    /// Draw text with a spot color at `tint` percent.
    pub fn set_text_spot_color(&mut self, name: &str, tint: u8) -> Result<()> {
        self.guard(|d| {
            d.text_color = d.spot(name, tint)?;
            d.color_flag = d.fill_color != d.text_color;
            Ok(())
        })
    }

    /// Line width in user units.
    pub fn set_line_width(&mut self, width: f64) -> Result<()> {
        self.guard(|d| {
            d.line_width = width;
            if d.has_sink() {
                d.out([Op::SetLineWidth(width * d.k)])?;
            }
            Ok(())
        })
    }

    /// Current line width in user units.
    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    /// Line cap: `butt`, `round` or `square`.
    pub fn set_line_cap_style(&mut self, style: &str) -> Result<()> {
        self.guard(|d| {
            let cap: LineCap = style.parse()?;
            d.out([Op::SetLineCap(cap)])
        })
    }

    /// Line join: `miter`, `round` or `bevel`.
    pub fn set_line_join_style(&mut self, style: &str) -> Result<()> {
        self.guard(|d| {
            let join: LineJoin = style.parse()?;
            d.out([Op::SetLineJoin(join)])
        })
    }

    /// Dash pattern in user units; an empty slice restores solid lines.
    pub fn set_dash_pattern(&mut self, dashes: &[f64], phase: f64) -> Result<()> {
        self.guard(|d| {
            if dashes.iter().any(|v| *v < 0.0) {
                return Err(Error::InvalidConfig("dash lengths cannot be negative".into()));
            }
            let k = d.k;
            d.out([Op::SetDashPattern(dashes.iter().map(|v| v * k).collect(), phase * k)])
        })
    }

    /// Straight line between two points.
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.guard(|d| {
            let (k, h) = (d.k, d.h);
            d.out([
                Op::MoveTo(x1 * k, (h - y1) * k),
                Op::LineTo(x2 * k, (h - y2) * k),
                Op::Stroke,
            ])
        })
    }

    /// Rectangle with its top-left corner at `(x, y)`. `style` is `D`, `F`,
    /// `DF` or `FD`.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: &str) -> Result<()> {
        self.guard(|d| {
            let style: DrawStyle = style.parse()?;
            let k = d.k;
            d.out([Op::Rectangle(x * k, (d.h - y) * k, w * k, -h * k), style.op()])
        })
    }

    /// Circle centered at `(x, y)`.
    pub fn circle(&mut self, x: f64, y: f64, r: f64, style: &str) -> Result<()> {
        self.ellipse(x, y, r, r, style)
    }

    /// Axis-aligned ellipse centered at `(x, y)`, drawn as four Bezier arcs.
    pub fn ellipse(&mut self, x: f64, y: f64, rx: f64, ry: f64, style: &str) -> Result<()> {
        self.guard(|d| {
            let style: DrawStyle = style.parse()?;
            let k = d.k;
            let (cx, cy, rx, ry) = (x * k, (d.h - y) * k, rx * k, ry * k);
            let (lx, ly) = (KAPPA * rx, KAPPA * ry);
            d.out([
                Op::MoveTo(cx + rx, cy),
                Op::CurveTo(cx + rx, cy + ly, cx + lx, cy + ry, cx, cy + ry),
                Op::CurveTo(cx - lx, cy + ry, cx - rx, cy + ly, cx - rx, cy),
                Op::CurveTo(cx - rx, cy - ly, cx - lx, cy - ry, cx, cy - ry),
                Op::CurveTo(cx + lx, cy - ry, cx + rx, cy - ly, cx + rx, cy),
                Op::ClosePath,
                style.op(),
            ])
        })
    }

    /// Quadratic Bezier curve from `(x0, y0)` to `(x1, y1)` with control
    /// point `(cx, cy)`.
    #[allow(clippy::too_many_arguments)]
    pub fn curve(&mut self, x0: f64, y0: f64, cx: f64, cy: f64, x1: f64, y1: f64, style: &str) -> Result<()> {
        // degree elevation to a cubic
        let c1 = (x0 + 2.0 / 3.0 * (cx - x0), y0 + 2.0 / 3.0 * (cy - y0));
        let c2 = (x1 + 2.0 / 3.0 * (cx - x1), y1 + 2.0 / 3.0 * (cy - y1));
        self.curve_bezier_cubic(x0, y0, c1.0, c1.1, c2.0, c2.1, x1, y1, style)
    }

    /// Cubic Bezier curve from `(x0, y0)` to `(x1, y1)`.
    #[allow(clippy::too_many_arguments)]
    pub fn curve_bezier_cubic(
        &mut self,
        x0: f64,
        y0: f64,
        cx0: f64,
        cy0: f64,
        cx1: f64,
        cy1: f64,
        x1: f64,
        y1: f64,
        style: &str,
    ) -> Result<()> {
        self.guard(|d| {
            let style: DrawStyle = style.parse()?;
            let (k, h) = (d.k, d.h);
            d.out([
                Op::MoveTo(x0 * k, (h - y0) * k),
                Op::CurveTo(cx0 * k, (h - cy0) * k, cx1 * k, (h - cy1) * k, x1 * k, (h - y1) * k),
                style.op(),
            ])
        })
    }

    // ---------------------------------------------------------------------
    // Clipping, transformations, transparency, gradients
    // ---------------------------------------------------------------------

    /// Start clipping to a rectangle; `outline` also strokes it.
    pub fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64, outline: bool) -> Result<()> {
        self.guard(|d| {
            let k = d.k;
            d.out([
                Op::SaveState,
                Op::Rectangle(x * k, (d.h - y) * k, w * k, -h * k),
                Op::Clip,
                if outline { Op::Stroke } else { Op::EndPath },
            ])?;
            d.clip_nest += 1;
            Ok(())
        })
    }

    /// End the innermost clipping operation.
    pub fn clip_end(&mut self) -> Result<()> {
        self.guard(|d| {
            if d.clip_nest == 0 {
                return Err(Error::Sequence("no clipping operation is active".into()));
            }
            d.out([Op::RestoreState])?;
            d.clip_nest -= 1;
            Ok(())
        })
    }

    /// Open a transformation scope.
    pub fn transform_begin(&mut self) -> Result<()> {
        self.guard(|d| {
            d.out([Op::SaveState])?;
            d.transform_nest += 1;
            Ok(())
        })
    }

    /// Close the innermost transformation scope.
    pub fn transform_end(&mut self) -> Result<()> {
        self.guard(|d| {
            if d.transform_nest == 0 {
                return Err(Error::Sequence("no transformation is active".into()));
            }
            d.out([Op::RestoreState])?;
            d.transform_nest -= 1;
            Ok(())
        })
    }

    fn transform(&mut self, m: [f64; 6]) -> Result<()> {
        if self.transform_nest == 0 {
            return Err(Error::Sequence(
                "transformations must be applied between transform_begin and transform_end".into(),
            ));
        }
        self.out([Op::Transform(m[0], m[1], m[2], m[3], m[4], m[5])])
    }

    /// Move the origin by `(tx, ty)` user units.
    pub fn transform_translate(&mut self, tx: f64, ty: f64) -> Result<()> {
        self.guard(|d| {
            let k = d.k;
            d.transform([1.0, 0.0, 0.0, 1.0, tx * k, -ty * k])
        })
    }

    /// Scale by percentages around `(x, y)`.
    pub fn transform_scale(&mut self, sx: f64, sy: f64, x: f64, y: f64) -> Result<()> {
        self.guard(|d| {
            if sx == 0.0 || sy == 0.0 {
                return Err(Error::InvalidConfig("scale factor cannot be zero".into()));
            }
            let (sx, sy) = (sx / 100.0, sy / 100.0);
            let (x, y) = (x * d.k, (d.h - y) * d.k);
            d.transform([sx, 0.0, 0.0, sy, x * (1.0 - sx), y * (1.0 - sy)])
        })
    }

    /// Rotate counter-clockwise by `angle` degrees around `(x, y)`.
    pub fn transform_rotate(&mut self, angle: f64, x: f64, y: f64) -> Result<()> {
        self.guard(|d| {
            let (x, y) = (x * d.k, (d.h - y) * d.k);
            let (sin, cos) = (angle * PI / 180.0).sin_cos();
            d.transform([cos, sin, -sin, cos, x + sin * y - cos * x, y - cos * y - sin * x])
        })
    }

    /// Set the alpha for strokes and fills and the blend mode (empty for
    /// `Normal`).
    pub fn set_alpha(&mut self, alpha: f64, blend_mode: &str) -> Result<()> {
        self.guard(|d| {
            let mode = if blend_mode.is_empty() { BlendMode::Normal } else { blend_mode.parse()? };
            let index = d.blend_states.register(ExtGState::new(alpha, mode)?);
            d.require_version("1.4");
            d.out([Op::SetExtGState(BlendStateTable::resource_name(index))])
        })
    }

    /// Paint a gradient clipped to a rectangle. Gradient coordinates are
    /// fractions of the rectangle.
    pub fn gradient(&mut self, x: f64, y: f64, w: f64, h: f64, gradient: Gradient) -> Result<()> {
        self.guard(|d| {
            let k = d.k;
            let page_h = d.h;
            let index = d.gradients.push(gradient);
            d.out([
                Op::SaveState,
                Op::Rectangle(x * k, (page_h - y) * k, w * k, -h * k),
                Op::Clip,
                Op::EndPath,
                Op::Transform(w * k, 0.0, 0.0, h * k, x * k, (page_h - (y + h)) * k),
                Op::PaintShading(GradientTable::resource_name(index)),
                Op::RestoreState,
            ])
        })
    }

    /// Axial gradient along `[x1, y1, x2, y2]`.
    #[allow(clippy::too_many_arguments)]
    pub fn linear_gradient(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        from: RgbColor,
        to: RgbColor,
        axis: [f64; 4],
    ) -> Result<()> {
        let [x1, y1, x2, y2] = axis;
        self.gradient(x, y, w, h, Gradient::linear(from, to).axis(x1, y1, x2, y2))
    }

    /// Radial gradient from focal point `(fx, fy)` to the circle
    /// `(cx, cy, r)`, given as `[fx, fy, cx, cy, r]`.
    #[allow(clippy::too_many_arguments)]
    pub fn radial_gradient(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        from: RgbColor,
        to: RgbColor,
        circle: [f64; 5],
    ) -> Result<()> {
        let [fx, fy, cx, cy, r] = circle;
        self.gradient(x, y, w, h, Gradient::radial(from, to).circle(fx, fy, cx, cy, r))
    }

    // ---------------------------------------------------------------------
    // Images
    // ---------------------------------------------------------------------

    /// Register an already decoded image.
    pub fn register_image_info(&mut self, name: &str, info: ImageInfo) -> Result<()> {
        self.guard(|d| {
            if d.images.contains(name) {
                return Ok(());
            }
            log::debug!("Registered image '{}' ({}x{})", name, info.width, info.height);
            d.images.register(name, info);
            Ok(())
        })
    }

    /// Register image bytes; an empty type hint detects PNG or JPEG from the
    /// content.
    pub fn register_image_bytes(&mut self, name: &str, type_hint: &str, data: &[u8]) -> Result<()> {
        self.check()?;
        if self.images.contains(name) {
            return Ok(());
        }
        let info = if type_hint.is_empty() {
            ImageInfo::detect(data)
        } else {
            type_hint.parse::<ImageType>().and_then(|t| ImageInfo::from_bytes(data, t))
        };
        let info = self.record(info)?;
        self.register_image_info(name, info)
    }

    /// Register an image read from `reader`.
    pub fn register_image_reader(&mut self, name: &str, type_hint: &str, mut reader: impl Read) -> Result<()> {
        self.check()?;
        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data).map_err(Error::from);
        self.record(read)?;
        self.register_image_bytes(name, type_hint, &data)
    }

    /// Register an image file, read through the configured file source. The
    /// type comes from the extension, or from the content when the extension
    /// is not recognized.
    pub fn register_image(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        self.check()?;
        if self.images.contains(name) {
            return Ok(());
        }
        let path = path.as_ref();
        let data = self.config.file_source.read_file(path);
        let data = self.record(data)?;
        let hint = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.parse::<ImageType>().is_ok())
            .unwrap_or("");
        self.register_image_bytes(name, hint, &data)
    }

    /// Fetch and register a remote image under its URL.
    pub fn register_remote_image(&mut self, fetcher: &dyn ImageFetcher, url: &str, type_hint: &str) -> Result<()> {
        self.check()?;
        if self.images.contains(url) {
            return Ok(());
        }
        let fetched = fetcher
            .fetch(url)
            .and_then(|(data, content_type)| Ok((remote_image_type(type_hint, &content_type, url)?, data)));
        let (kind, data) = self.record(fetched)?;
        let info = self.record(ImageInfo::from_bytes(&data, kind))?;
        self.register_image_info(url, info)
    }

    /// Place an image. A zero width or height is derived from the other
    /// dimension; both zero uses the natural size at the image's dpi.
    pub fn image(&mut self, name: &str, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.image_options(name, x, y, w, h, &ImageOptions::default())
    }

    /// Place an image with options. A negative `x` uses the current x. Names
    /// not registered yet are loaded as files.
    pub fn image_options(&mut self, name: &str, x: f64, y: f64, w: f64, h: f64, options: &ImageOptions) -> Result<()> {
        self.check()?;
        if !self.images.contains(name) {
            if options.image_type.is_empty() {
                self.register_image(name, name)?;
            } else {
                let data = self.config.file_source.read_file(Path::new(name));
                let data = self.record(data)?;
                self.register_image_bytes(name, &options.image_type, &data)?;
            }
        }
        self.guard(|d| {
            let info = d.images.require(name)?;
            let (w, h) = info.placement_size(w, h, d.k);
            let resource = info.resource_name();

            let mut y = y;
            if options.flow {
                d.page_break_if_needed(h)?;
                y = d.y;
                d.y += h;
            }
            let x = if x < 0.0 { d.x } else { x };
            let k = d.k;
            d.out([
                Op::SaveState,
                Op::Transform(w * k, 0.0, 0.0, h * k, x * k, (d.h - (y + h)) * k),
                Op::PaintXObject(resource),
                Op::RestoreState,
            ])?;
            if options.link > 0 {
                d.new_link(x, y, w, h, LinkTarget::Internal(options.link))?;
            } else if !options.link_url.is_empty() {
                d.new_link(x, y, w, h, LinkTarget::Uri(options.link_url.clone()))?;
            }
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------------

    /// Start recording a template of `w` by `h` user units. Drawing calls go
    /// to the template until [`end_template`](Self::end_template).
    pub fn begin_template(&mut self, w: f64, h: f64) -> Result<()> {
        self.guard(|d| {
            if d.recording.is_some() {
                return Err(Error::Sequence("a template is already being recorded".into()));
            }
            d.recording = Some(Recording {
                template: Template::new(w * d.k, h * d.k),
                w: d.w,
                h: d.h,
                x: d.x,
                y: d.y,
                trigger: d.page_break_trigger,
            });
            d.w = w;
            d.h = h;
            d.x = d.l_margin;
            d.y = d.t_margin;
            d.page_break_trigger = h - d.b_margin;
            d.emit_font()
        })
    }

    /// Stop recording, returning the template id.
    pub fn end_template(&mut self) -> Result<usize> {
        self.guard(|d| {
            let rec = d
                .recording
                .take()
                .ok_or_else(|| Error::Sequence("no template is being recorded".into()))?;
            d.w = rec.w;
            d.h = rec.h;
            d.x = rec.x;
            d.y = rec.y;
            d.page_break_trigger = rec.trigger;
            d.templates.push(rec.template);
            Ok(d.templates.len())
        })
    }

    /// Draw a template with its top-left corner at `(x, y)`, scaled to
    /// `w` by `h`. Zero dimensions keep the recorded size.
    pub fn use_template(&mut self, id: usize, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.guard(|d| {
            let tpl = id
                .checked_sub(1)
                .and_then(|i| d.templates.get(i))
                .ok_or_else(|| Error::Sequence(format!("template {} does not exist", id)))?;
            let k = d.k;
            let w = if w == 0.0 { tpl.width / k } else { w };
            let h = if h == 0.0 { tpl.height / k } else { h };
            let (sx, sy) = (w * k / tpl.width, h * k / tpl.height);
            d.out([
                Op::SaveState,
                Op::Transform(sx, 0.0, 0.0, sy, x * k, (d.h - (y + h)) * k),
                Op::PaintXObject(Template::resource_name(id)),
                Op::RestoreState,
            ])
        })
    }

    // ---------------------------------------------------------------------
    // Links, bookmarks, attachments
    // ---------------------------------------------------------------------

    /// Allocate an internal link. Its destination is set with
    /// [`set_link`](Self::set_link).
    pub fn add_link(&mut self) -> usize {
        if !self.ok() {
            return 0;
        }
        self.links.add()
    }

    /// Point a link at a page and height. A negative `y` uses the current y,
    /// `None` the current page.
    pub fn set_link(&mut self, link: usize, y: f64, page: Option<usize>) -> Result<()> {
        self.guard(|d| {
            let page = page.unwrap_or(d.page);
            let page_height = d
                .pages
                .get(page)
                .filter(|_| page > 0)
                .map(|p| p.height)
                .ok_or_else(|| Error::Sequence(format!("link target page {} does not exist", page)))?;
            let y = if y < 0.0 { d.y } else { y };
            d.links.set(link, LinkDest { page, y: page_height - y * d.k })
        })
    }

    /// Make a rectangle of the current page an internal link.
    pub fn link(&mut self, x: f64, y: f64, w: f64, h: f64, link: usize) -> Result<()> {
        self.guard(|d| {
            if !d.links.contains(link) {
                return Err(Error::Sequence(format!("link {} was never created", link)));
            }
            d.new_link(x, y, w, h, LinkTarget::Internal(link))
        })
    }

    /// Make a rectangle of the current page a URL link.
    pub fn link_string(&mut self, x: f64, y: f64, w: f64, h: f64, url: &str) -> Result<()> {
        self.guard(|d| d.new_link(x, y, w, h, LinkTarget::Uri(url.to_string())))
    }

    fn new_link(&mut self, x: f64, y: f64, w: f64, h: f64, target: LinkTarget) -> Result<()> {
        let rect = self.annotation_rect(x, y, w, h)?;
        self.pages[self.page].links.push(PageLink { rect, target });
        Ok(())
    }

    fn annotation_rect(&self, x: f64, y: f64, w: f64, h: f64) -> Result<[f64; 4]> {
        let page = self
            .pages
            .get(self.page)
            .filter(|_| self.page > 0)
            .ok_or_else(|| Error::Sequence("no page has been added yet".into()))?;
        let k = self.k;
        Ok([x * k, page.height - (y + h) * k, (x + w) * k, page.height - y * k])
    }

    /// Add an outline entry pointing at the current page. A negative `y`
    /// uses the current y.
    pub fn bookmark(&mut self, txt: &str, level: usize, y: f64) -> Result<()> {
        self.guard(|d| {
            if d.page == 0 {
                return Err(Error::Sequence("bookmarks need a page".into()));
            }
            let y = if y < 0.0 { d.y } else { y };
            d.outlines.add(txt, level, d.page, (d.h - y) * d.k)
        })
    }

    /// Replace the document-level attachments.
    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) {
        if self.ok() {
            if !attachments.is_empty() {
                self.require_version("1.4");
            }
            self.attachments = attachments;
        }
    }

    /// Attach a file to a rectangle of the current page.
    pub fn add_attachment_annotation(&mut self, attachment: Attachment, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.guard(|d| {
            let rect = d.annotation_rect(x, y, w, h)?;
            d.require_version("1.4");
            d.pages[d.page]
                .attachments
                .push(AttachmentAnnotation { attachment, rect });
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------------

    /// Close the document and write the PDF. The file is assembled in
    /// memory first, so nothing is written when any step fails.
    pub fn output<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.check()?;
        if self.closed {
            return Err(Error::Sequence("document has already been output".into()));
        }
        let closed = self.close();
        self.record(closed)?;

        let mut buf = Vec::new();
        let emitted = Serializer::emit(self, &mut buf);
        self.record(emitted)?;
        let written = w.write_all(&buf).map_err(Error::from);
        self.record(written)
    }

    /// Close the document and write it to a file.
    pub fn output_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        self.output(&mut buf)?;
        std::fs::write(path, buf).map_err(|e| Error::io_context("write", &path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn content(doc: &Document, page: usize) -> String {
        String::from_utf8_lossy(doc.pages[page].content.as_bytes()).to_string()
    }

    fn helvetica_doc() -> Document {
        let mut doc = Document::create("P", "mm", "A4", "").unwrap();
        doc.add_page().unwrap();
        doc.set_font("Helvetica", "", 12.0).unwrap();
        doc
    }

    #[test]
    fn test_display_mode_parsing() {
        assert_eq!("fullpage".parse::<ZoomMode>().unwrap(), ZoomMode::FullPage);
        assert_eq!("150".parse::<ZoomMode>().unwrap(), ZoomMode::Percent(150.0));
        assert!(matches!("huge".parse::<ZoomMode>(), Err(Error::InvalidConfig(_))));
        assert_eq!("continuous".parse::<LayoutMode>().unwrap(), LayoutMode::OneColumn);
        assert_eq!("TwoPageRight".parse::<LayoutMode>().unwrap(), LayoutMode::TwoPageRight);
        assert_eq!(LayoutMode::UseOutlines.page_mode(), Some("UseOutlines"));
        assert_eq!(LayoutMode::UseOutlines.page_layout(), None);
        assert!("sideways".parse::<LayoutMode>().is_err());
    }

    #[test]
    fn test_draw_style_parsing() {
        assert_eq!("".parse::<DrawStyle>().unwrap(), DrawStyle::Stroke);
        assert_eq!("fd".parse::<DrawStyle>().unwrap(), DrawStyle::FillStroke);
        assert_eq!("F".parse::<DrawStyle>().unwrap(), DrawStyle::Fill);
        assert!("X".parse::<DrawStyle>().is_err());
    }

    #[test]
    fn test_text_before_page_is_sequence_error() {
        let mut doc = Document::new();
        doc.set_font("Helvetica", "", 12.0).unwrap();
        assert!(matches!(doc.text(10.0, 10.0, "x"), Err(Error::Sequence(_))));
        assert!(!doc.ok());
    }

    #[test]
    fn test_sticky_error_blocks_mutation() {
        let mut doc = helvetica_doc();
        let err = doc.set_font("NoSuchFamily", "", 10.0).unwrap_err();
        assert!(matches!(err, Error::FontNotFound(_)));

        let before = content(&doc, 1);
        let later = doc.add_page().unwrap_err();
        assert_eq!(later.to_string(), err.to_string());
        assert!(doc.cell(10.0, 10.0, "ignored").is_err());
        doc.set_x(99.0);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(content(&doc, 1), before);
        assert_ne!(doc.get_x(), 99.0);

        let mut out = Vec::new();
        assert!(doc.output(&mut out).is_err());
        assert!(out.is_empty());

        doc.clear_error();
        assert!(doc.ok());
        doc.add_page().unwrap();
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_state_carries_across_pages() {
        let mut doc = helvetica_doc();
        doc.set_draw_color(255, 0, 0).unwrap();
        doc.set_fill_color(0, 0, 255).unwrap();
        doc.set_line_width(1.0).unwrap();
        doc.add_page().unwrap();

        let page2 = content(&doc, 2);
        assert!(page2.starts_with("2 J\n2.83 w\n"));
        assert!(page2.contains("12.00 Tf"));
        assert!(page2.contains("1.000 0.000 0.000 RG"));
        assert!(page2.contains("0.000 0.000 1.000 rg"));
    }

    #[test]
    fn test_header_changes_are_reverted() {
        let mut doc = Document::new();
        doc.set_header_func(|d| {
            let _ = d.set_draw_color(0, 255, 0);
        });
        doc.add_page().unwrap();
        doc.set_font("Courier", "", 10.0).unwrap();
        doc.add_page().unwrap();
        let page2 = content(&doc, 2);
        let green = page2.find("0.000 1.000 0.000 RG").unwrap();
        let black = page2.rfind("0.000 G").unwrap();
        assert!(black > green);
    }

    #[test]
    fn test_header_footer_called_per_page() {
        let headers = Arc::new(AtomicUsize::new(0));
        let footers = Arc::new(AtomicUsize::new(0));
        let mut doc = Document::new();
        let h = headers.clone();
        doc.set_header_func_mode(
            move |d| {
                h.fetch_add(1, Ordering::SeqCst);
                d.set_y(100.0);
            },
            true,
        );
        let f = footers.clone();
        doc.set_footer_func(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        doc.add_page().unwrap();
        let (_, top, _, _) = doc.margins();
        assert_eq!(doc.get_y(), top);
        doc.add_page().unwrap();
        let mut out = Vec::new();
        doc.output(&mut out).unwrap();
        assert_eq!(headers.load(Ordering::SeqCst), 2);
        assert_eq!(footers.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cell_triggers_page_break() {
        let mut doc = helvetica_doc();
        for _ in 0..40 {
            doc.cell_format(0.0, 10.0, "row", "1", 1, "L", false, 0, "").unwrap();
        }
        assert!(doc.page_count() >= 2);
        assert!(doc.get_y() < 297.0);
    }

    #[test]
    fn test_page_break_predicate() {
        let mut doc = helvetica_doc();
        doc.set_accept_page_break_func(|_| false);
        for _ in 0..40 {
            doc.cell_format(0.0, 10.0, "row", "", 1, "L", false, 0, "").unwrap();
        }
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_word_spacing_suspended_across_break() {
        let mut doc = helvetica_doc();
        doc.set_word_spacing(1.0).unwrap();
        doc.set_y(280.0);
        doc.cell(10.0, 10.0, "x").unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(content(&doc, 1).ends_with("0.000 Tw\n"));
        assert!(content(&doc, 2).contains("2.835 Tw"));
    }

    #[test]
    fn test_cell_alignment_and_border() {
        let mut doc = helvetica_doc();
        doc.cell_format(50.0, 10.0, "Hi", "LB", 0, "R", false, 0, "").unwrap();
        let c = content(&doc, 1);
        assert_eq!(c.matches(" l\nS").count(), 2);
        assert!(c.contains("(Hi) Tj"));
        assert!((doc.get_x() - (doc.margins().0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_write_wraps_lines() {
        let mut doc = helvetica_doc();
        let y0 = doc.get_y();
        let long = "word ".repeat(60);
        doc.write(5.0, &long).unwrap();
        assert!(doc.get_y() >= y0 + 10.0);
        doc.write(5.0, "a\nb").unwrap();
        assert!(content(&doc, 1).contains("(b) Tj"));
    }

    #[test]
    fn test_underline_emits_rectangle() {
        let mut doc = helvetica_doc();
        doc.set_font("Helvetica", "U", 12.0).unwrap();
        doc.text(10.0, 20.0, "under").unwrap();
        let c = content(&doc, 1);
        let tj = c.find("(under) Tj").unwrap();
        assert!(c[tj..].contains(" re\nf"));
    }

    #[test]
    fn test_style_fallback_flag() {
        let mut doc = helvetica_doc();
        assert!(!doc.last_font_fell_back());
        doc.set_font("Symbol", "B", 10.0).unwrap();
        assert!(!doc.last_font_fell_back());
    }

    #[test]
    fn test_clip_and_transform_nesting() {
        let mut doc = helvetica_doc();
        assert!(matches!(doc.clip_end(), Err(Error::Sequence(_))));
        doc.clear_error();

        doc.clip_rect(10.0, 10.0, 50.0, 50.0, false).unwrap();
        assert!(matches!(doc.add_page(), Err(Error::Sequence(_))));
        doc.clear_error();
        doc.clip_end().unwrap();

        assert!(matches!(doc.transform_rotate(30.0, 0.0, 0.0), Err(Error::Sequence(_))));
        doc.clear_error();
        doc.transform_begin().unwrap();
        doc.transform_translate(10.0, 0.0).unwrap();
        doc.transform_scale(50.0, 50.0, 0.0, 0.0).unwrap();
        doc.transform_end().unwrap();
        let c = content(&doc, 1);
        assert!(c.contains("re\nW\nn"));
        assert!(c.contains("1.00000 0.00000 0.00000 1.00000 28.34646 "));
        assert!(c.contains("0.50000 0.00000 0.00000 0.50000 "));
    }

    #[test]
    fn test_line_styles() {
        let mut doc = Document::create("P", "pt", "A4", "").unwrap();
        doc.add_page().unwrap();
        doc.set_line_cap_style("round").unwrap();
        doc.set_line_join_style("bevel").unwrap();
        doc.set_dash_pattern(&[4.0, 2.0], 1.0).unwrap();
        doc.set_dash_pattern(&[], 0.0).unwrap();
        let c = content(&doc, 1);
        assert!(c.contains("1 J\n2 j\n[4.00 2.00] 1.00 d\n[] 0.00 d\n"));
        assert!(matches!(doc.set_line_cap_style("wavy"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_alpha_registers_state() {
        let mut doc = helvetica_doc();
        doc.set_alpha(0.5, "Multiply").unwrap();
        doc.set_alpha(0.5, "Multiply").unwrap();
        assert_eq!(doc.blend_states.len(), 1);
        assert_eq!(doc.pdf_version(), "1.4");
        assert!(content(&doc, 1).contains("/GS1 gs"));
        assert!(matches!(doc.set_alpha(1.5, ""), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_spot_colors() {
        let mut doc = helvetica_doc();
        assert!(matches!(
            doc.set_fill_spot_color("Gold", 50),
            Err(Error::SpotColorNotFound(_))
        ));
        doc.clear_error();
        doc.add_spot_color("Gold", 0, 20, 60, 10).unwrap();
        doc.set_fill_spot_color("Gold", 50).unwrap();
        assert!(content(&doc, 1).contains("/CS1 cs\n0.500 scn"));
    }

    #[test]
    fn test_gradient_is_clipped() {
        let mut doc = helvetica_doc();
        doc.linear_gradient(10.0, 10.0, 50.0, 20.0, RgbColor::BLACK, RgbColor::WHITE, [0.0, 0.0, 1.0, 0.0])
            .unwrap();
        let c = content(&doc, 1);
        assert!(c.contains("W\nn"));
        assert!(c.contains("/Sh1 sh\nQ"));
        assert_eq!(doc.gradients.len(), 1);
    }

    #[test]
    fn test_page_box_validation() {
        let mut doc = helvetica_doc();
        doc.set_page_box("/trim", 10.0, 10.0, 100.0, 100.0).unwrap();
        assert!(doc.pages[1].boxes.contains_key(&PageBox::Trim));
        doc.add_page().unwrap();
        assert!(doc.pages[2].boxes.contains_key(&PageBox::Trim));
        assert!(matches!(
            doc.set_page_box("shoebox", 0.0, 0.0, 1.0, 1.0),
            Err(Error::UnknownPageBox(_))
        ));
    }

    #[test]
    fn test_links_and_bookmarks() {
        let mut doc = helvetica_doc();
        let link = doc.add_link();
        doc.set_link(link, 20.0, None).unwrap();
        doc.link(10.0, 10.0, 30.0, 5.0, link).unwrap();
        doc.link_string(10.0, 20.0, 30.0, 5.0, "https://example.com").unwrap();
        assert_eq!(doc.pages[1].links.len(), 2);
        assert!(doc.links.get(link).is_some());
        assert!(doc.set_link(99, 0.0, None).is_err());
        doc.clear_error();

        doc.bookmark("Intro", 0, -1.0).unwrap();
        assert!(doc.bookmark("Skipped", 2, 0.0).is_err());
    }

    #[test]
    fn test_templates() {
        let mut doc = helvetica_doc();
        assert!(doc.end_template().is_err());
        doc.clear_error();

        doc.begin_template(50.0, 20.0).unwrap();
        doc.rect(0.0, 0.0, 50.0, 20.0, "D").unwrap();
        let id = doc.end_template().unwrap();
        assert_eq!(id, 1);
        doc.use_template(id, 10.0, 10.0, 0.0, 0.0).unwrap();
        assert!(content(&doc, 1).contains("/TPL1 Do"));
        assert!(!doc.templates[0].content.is_empty());
        assert!(doc.use_template(7, 0.0, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_output_twice_is_sequence_error() {
        let mut doc = helvetica_doc();
        doc.cell(20.0, 10.0, "once").unwrap();
        let mut out = Vec::new();
        doc.output(&mut out).unwrap();
        assert!(out.starts_with(b"%PDF-1.3"));
        let mut again = Vec::new();
        assert!(matches!(doc.output(&mut again), Err(Error::Sequence(_))));
        assert!(again.is_empty());
    }

    #[test]
    fn test_empty_document_gets_a_page() {
        let mut doc = Document::new();
        let mut out = Vec::new();
        doc.output(&mut out).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_document_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Document>();
    }
}
