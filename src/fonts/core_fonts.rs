//! The fourteen standard PDF fonts.
//!
//! These are never embedded. Widths are the AFM advance widths laid out by
//! cp1252 code, so a text run can be measured with the same table it is
//! encoded with.

use super::font_definition::{FontBBox, FontDescriptor, FontFlags};

/// A standard Type1 font every conforming viewer provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreFont {
    /// Courier
    Courier,
    /// Courier-Bold
    CourierBold,
    /// Courier-Oblique
    CourierOblique,
    /// Courier-BoldOblique
    CourierBoldOblique,
    /// Helvetica
    Helvetica,
    /// Helvetica-Bold
    HelveticaBold,
    /// Helvetica-Oblique
    HelveticaOblique,
    /// Helvetica-BoldOblique
    HelveticaBoldOblique,
    /// Times-Roman
    TimesRoman,
    /// Times-Bold
    TimesBold,
    /// Times-Italic
    TimesItalic,
    /// Times-BoldItalic
    TimesBoldItalic,
    /// Symbol
    Symbol,
    /// ZapfDingbats
    ZapfDingbats,
}

impl CoreFont {
    /// Every standard font.
    pub const ALL: [CoreFont; 14] = [
        CoreFont::Courier,
        CoreFont::CourierBold,
        CoreFont::CourierOblique,
        CoreFont::CourierBoldOblique,
        CoreFont::Helvetica,
        CoreFont::HelveticaBold,
        CoreFont::HelveticaOblique,
        CoreFont::HelveticaBoldOblique,
        CoreFont::TimesRoman,
        CoreFont::TimesBold,
        CoreFont::TimesItalic,
        CoreFont::TimesBoldItalic,
        CoreFont::Symbol,
        CoreFont::ZapfDingbats,
    ];

    /// The `/BaseFont` name.
    pub fn postscript_name(self) -> &'static str {
        match self {
            CoreFont::Courier => "Courier",
            CoreFont::CourierBold => "Courier-Bold",
            CoreFont::CourierOblique => "Courier-Oblique",
            CoreFont::CourierBoldOblique => "Courier-BoldOblique",
            CoreFont::Helvetica => "Helvetica",
            CoreFont::HelveticaBold => "Helvetica-Bold",
            CoreFont::HelveticaOblique => "Helvetica-Oblique",
            CoreFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            CoreFont::TimesRoman => "Times-Roman",
            CoreFont::TimesBold => "Times-Bold",
            CoreFont::TimesItalic => "Times-Italic",
            CoreFont::TimesBoldItalic => "Times-BoldItalic",
            CoreFont::Symbol => "Symbol",
            CoreFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Look up a standard font by its PostScript name.
    pub fn from_postscript_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.postscript_name() == name)
    }

    /// Resolve a lowercase family and a normalized style (`""`, `"B"`, `"I"`,
    /// `"BI"`). `arial` is an alias of Helvetica. Symbol and ZapfDingbats
    /// have a single face and accept any style.
    pub fn lookup(family: &str, style: &str) -> Option<Self> {
        let (bold, italic) = match style {
            "" => (false, false),
            "B" => (true, false),
            "I" => (false, true),
            "BI" => (true, true),
            _ => return None,
        };
        let font = match (family, bold, italic) {
            ("symbol", _, _) => CoreFont::Symbol,
            ("zapfdingbats", _, _) => CoreFont::ZapfDingbats,
            ("courier", false, false) => CoreFont::Courier,
            ("courier", true, false) => CoreFont::CourierBold,
            ("courier", false, true) => CoreFont::CourierOblique,
            ("courier", true, true) => CoreFont::CourierBoldOblique,
            ("helvetica" | "arial", false, false) => CoreFont::Helvetica,
            ("helvetica" | "arial", true, false) => CoreFont::HelveticaBold,
            ("helvetica" | "arial", false, true) => CoreFont::HelveticaOblique,
            ("helvetica" | "arial", true, true) => CoreFont::HelveticaBoldOblique,
            ("times", false, false) => CoreFont::TimesRoman,
            ("times", true, false) => CoreFont::TimesBold,
            ("times", false, true) => CoreFont::TimesItalic,
            ("times", true, true) => CoreFont::TimesBoldItalic,
            _ => return None,
        };
        Some(font)
    }

    /// True for a family name that resolves to a standard font.
    pub fn is_core_family(family: &str) -> bool {
        matches!(family, "courier" | "helvetica" | "arial" | "times" | "symbol" | "zapfdingbats")
    }

    /// Symbol and ZapfDingbats use their built-in encoding.
    pub fn is_symbolic(self) -> bool {
        matches!(self, CoreFont::Symbol | CoreFont::ZapfDingbats)
    }

    /// Advance widths by cp1252 code, in 1/1000 em.
    pub fn widths(self) -> [u16; 256] {
        match self {
            CoreFont::Courier
            | CoreFont::CourierBold
            | CoreFont::CourierOblique
            | CoreFont::CourierBoldOblique => [600; 256],
            CoreFont::Helvetica | CoreFont::HelveticaOblique => full_table(278, &HELVETICA),
            CoreFont::HelveticaBold | CoreFont::HelveticaBoldOblique => {
                full_table(278, &HELVETICA_BOLD)
            },
            CoreFont::TimesRoman => full_table(250, &TIMES_ROMAN),
            CoreFont::TimesBold => times_variant(&TIMES_BOLD_ASCII),
            CoreFont::TimesItalic => times_variant(&TIMES_ITALIC_ASCII),
            CoreFont::TimesBoldItalic => times_variant(&TIMES_BOLD_ITALIC_ASCII),
            CoreFont::Symbol => ascii_table(250, &SYMBOL_ASCII, 250),
            CoreFont::ZapfDingbats => ascii_table(0, &ZAPF_DINGBATS_ASCII, 0),
        }
    }

    /// Font descriptor values from the AFM header.
    pub fn descriptor(self) -> FontDescriptor {
        let (ascent, descent, cap_height, bbox, italic_angle, stem_v) = match self {
            CoreFont::Courier => (629, -157, 562, [-23, -250, 715, 805], 0.0, 51),
            CoreFont::CourierBold => (629, -157, 562, [-113, -250, 749, 801], 0.0, 106),
            CoreFont::CourierOblique => (629, -157, 562, [-27, -250, 849, 805], -12.0, 51),
            CoreFont::CourierBoldOblique => (629, -157, 562, [-57, -250, 869, 801], -12.0, 106),
            CoreFont::Helvetica => (718, -207, 718, [-166, -225, 1000, 931], 0.0, 88),
            CoreFont::HelveticaBold => (718, -207, 718, [-170, -228, 1003, 962], 0.0, 140),
            CoreFont::HelveticaOblique => (718, -207, 718, [-170, -225, 1116, 931], -12.0, 88),
            CoreFont::HelveticaBoldOblique => {
                (718, -207, 718, [-174, -228, 1114, 962], -12.0, 140)
            },
            CoreFont::TimesRoman => (683, -217, 662, [-168, -218, 1000, 898], 0.0, 84),
            CoreFont::TimesBold => (683, -217, 676, [-168, -218, 1000, 935], 0.0, 139),
            CoreFont::TimesItalic => (683, -217, 653, [-169, -217, 1010, 883], -15.5, 76),
            CoreFont::TimesBoldItalic => (683, -217, 669, [-200, -218, 996, 921], -15.0, 121),
            CoreFont::Symbol => (1010, -293, 1010, [-180, -293, 1090, 1010], 0.0, 85),
            CoreFont::ZapfDingbats => (820, -143, 820, [-1, -143, 981, 820], 0.0, 90),
        };

        let mut flags = if self.is_symbolic() {
            FontFlags::SYMBOLIC
        } else {
            FontFlags::NONSYMBOLIC
        };
        if matches!(
            self,
            CoreFont::Courier
                | CoreFont::CourierBold
                | CoreFont::CourierOblique
                | CoreFont::CourierBoldOblique
        ) {
            flags |= FontFlags::FIXED_PITCH;
        }
        if matches!(
            self,
            CoreFont::TimesRoman | CoreFont::TimesBold | CoreFont::TimesItalic | CoreFont::TimesBoldItalic
        ) {
            flags |= FontFlags::SERIF;
        }
        if italic_angle != 0.0 {
            flags |= FontFlags::ITALIC;
        }

        FontDescriptor {
            ascent,
            descent,
            cap_height,
            flags,
            font_bbox: FontBBox {
                xmin: bbox[0],
                ymin: bbox[1],
                xmax: bbox[2],
                ymax: bbox[3],
            },
            italic_angle,
            stem_v,
            missing_width: self.widths()[32] as u32,
        }
    }
}

/// Codes 0..32 get `control`, 32..=255 come from `upper`.
fn full_table(control: u16, upper: &[u16; 224]) -> [u16; 256] {
    let mut table = [control; 256];
    table[32..].copy_from_slice(upper);
    table
}

/// Codes 32..=127 from `ascii`, the rest filled.
fn ascii_table(control: u16, ascii: &[u16; 96], high: u16) -> [u16; 256] {
    let mut table = [high; 256];
    table[..32].fill(control);
    table[32..128].copy_from_slice(ascii);
    table
}

/// Times faces other than Roman carry their own ASCII widths and share the
/// Roman widths above 127.
fn times_variant(ascii: &[u16; 96]) -> [u16; 256] {
    let mut table = full_table(250, &TIMES_ROMAN);
    table[32..128].copy_from_slice(ascii);
    table
}

#[rustfmt::skip]
const HELVETICA: [u16; 224] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 224] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 350,
    556, 350, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 224] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 350,
    500, 350, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 350, 611, 350,
    350, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 350, 444, 722,
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333,
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444,
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500,
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500,
];

#[rustfmt::skip]
const TIMES_BOLD_ASCII: [u16; 96] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520, 350,
];

#[rustfmt::skip]
const TIMES_ITALIC_ASCII: [u16; 96] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541, 350,
];

#[rustfmt::skip]
const TIMES_BOLD_ITALIC_ASCII: [u16; 96] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722,
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500,
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500,
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570, 350,
];

#[rustfmt::skip]
const SYMBOL_ASCII: [u16; 96] = [
    250, 333, 713, 500, 549, 833, 778, 439, 333, 333, 500, 549, 250, 549, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 549, 549, 549, 444,
    549, 722, 667, 722, 612, 611, 763, 603, 722, 333, 631, 722, 686, 889, 722, 722,
    768, 741, 556, 592, 611, 690, 439, 768, 645, 795, 611, 333, 863, 333, 658, 500,
    500, 631, 549, 549, 494, 439, 521, 411, 603, 329, 603, 549, 549, 576, 521, 549,
    549, 521, 549, 603, 439, 576, 713, 686, 493, 686, 494, 480, 200, 480, 549, 250,
];

#[rustfmt::skip]
const ZAPF_DINGBATS_ASCII: [u16; 96] = [
    278, 974, 961, 974, 980, 719, 789, 790, 791, 690, 960, 939, 549, 855, 911, 933,
    911, 945, 974, 755, 846, 762, 761, 571, 677, 763, 760, 759, 754, 494, 552, 537,
    577, 692, 786, 788, 788, 790, 793, 794, 816, 823, 789, 841, 823, 833, 816, 831,
    923, 744, 723, 749, 790, 792, 695, 776, 768, 792, 759, 707, 708, 682, 701, 826,
    815, 789, 789, 707, 687, 696, 689, 786, 787, 713, 791, 785, 791, 873, 761, 762,
    762, 759, 759, 892, 892, 788, 784, 438, 138, 277, 415, 392, 392, 668, 668, 278,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_widths() {
        let w = CoreFont::Helvetica.widths();
        assert_eq!(w[b' ' as usize], 278);
        assert_eq!(w[b'H' as usize], 722);
        assert_eq!(w[b'e' as usize], 556);
        assert_eq!(w[b'W' as usize], 944);
        // cp1252 euro sign
        assert_eq!(w[0x80], 556);
        assert_eq!(CoreFont::HelveticaOblique.widths(), w);
    }

    #[test]
    fn test_courier_is_monospaced() {
        assert!(CoreFont::CourierBold.widths().iter().all(|w| *w == 600));
        assert!(CoreFont::Courier.descriptor().flags.contains(FontFlags::FIXED_PITCH));
    }

    #[test]
    fn test_times_variants_share_upper_half() {
        let roman = CoreFont::TimesRoman.widths();
        let bold = CoreFont::TimesBold.widths();
        assert_eq!(bold[b'W' as usize], 1000);
        assert_eq!(roman[b'W' as usize], 944);
        assert_eq!(bold[200..], roman[200..]);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(CoreFont::lookup("arial", "B"), Some(CoreFont::HelveticaBold));
        assert_eq!(CoreFont::lookup("times", "BI"), Some(CoreFont::TimesBoldItalic));
        assert_eq!(CoreFont::lookup("symbol", "B"), Some(CoreFont::Symbol));
        assert_eq!(CoreFont::lookup("dejavu", ""), None);
        assert_eq!(CoreFont::lookup("courier", "X"), None);
    }

    #[test]
    fn test_postscript_names_round_trip() {
        for font in CoreFont::ALL {
            assert_eq!(CoreFont::from_postscript_name(font.postscript_name()), Some(font));
        }
    }

    #[test]
    fn test_descriptor_flags() {
        let d = CoreFont::TimesItalic.descriptor();
        assert!(d.flags.contains(FontFlags::SERIF | FontFlags::ITALIC));
        assert!(CoreFont::Symbol.descriptor().flags.contains(FontFlags::SYMBOLIC));
        assert_eq!(CoreFont::Helvetica.descriptor().missing_width, 278);
    }
}
