//! ToUnicode CMap generation.
//!
//! Maps two-byte character codes back to Unicode so viewers can extract and
//! search text. The header and footer are fixed; only the `bfchar` table
//! depends on the font's used characters.

/// Maximum entries per `beginbfchar` block.
pub const BFCHAR_CHUNK: usize = 100;

const CMAP_HEADER: &str = "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo <<\n  /Registry (Adobe)\n  /Ordering (UCS)\n  /Supplement 0\n>> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<0000> <FFFF>\n\
endcodespacerange\n";

const CMAP_FOOTER: &str = "endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end\n";

/// Hex form of a Unicode scalar in UTF-16BE, with surrogates above the BMP.
fn unicode_hex(cp: u32) -> String {
    if cp <= 0xFFFF {
        format!("{:04X}", cp)
    } else {
        let v = cp - 0x10000;
        format!("{:04X}{:04X}", 0xD800 + (v >> 10), 0xDC00 + (v & 0x3FF))
    }
}

/// Build a ToUnicode CMap from `(code, unicode)` pairs.
///
/// Pairs are written in the order given; callers pass them sorted by code.
pub fn build_to_unicode_cmap(pairs: &[(u16, u32)]) -> Vec<u8> {
    let mut out = String::with_capacity(CMAP_HEADER.len() + CMAP_FOOTER.len() + pairs.len() * 16);
    out.push_str(CMAP_HEADER);
    for chunk in pairs.chunks(BFCHAR_CHUNK) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (code, unicode) in chunk {
            out.push_str(&format!("<{:04X}> <{}>\n", code, unicode_hex(*unicode)));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str(CMAP_FOOTER);
    out.into_bytes()
}

/// ToUnicode CMap of a UTF-8 font, where every code is its own code point.
pub fn identity_to_unicode_cmap(code_points: impl IntoIterator<Item = u32>) -> Vec<u8> {
    let pairs: Vec<(u16, u32)> = code_points
        .into_iter()
        .filter(|cp| *cp <= 0xFFFF)
        .map(|cp| (cp as u16, cp))
        .collect();
    build_to_unicode_cmap(&pairs)
}
