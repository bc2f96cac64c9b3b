//! Text encodings used in content streams and string objects.
//!
//! Single-byte fonts use Windows-1252 (`/WinAnsiEncoding`). UTF-8 fonts use
//! Identity-H with CID = code point, so their text runs are the UTF-16BE form
//! of the string. Document-level text strings (info, outlines, file names) are
//! written as UTF-16BE with a byte order mark.

/// cp1252 codes 0x80..=0x9F and the Unicode scalars they stand for.
const CP1252_HIGH: [(u8, u32); 27] = [
    (0x80, 0x20AC),
    (0x82, 0x201A),
    (0x83, 0x0192),
    (0x84, 0x201E),
    (0x85, 0x2026),
    (0x86, 0x2020),
    (0x87, 0x2021),
    (0x88, 0x02C6),
    (0x89, 0x2030),
    (0x8A, 0x0160),
    (0x8B, 0x2039),
    (0x8C, 0x0152),
    (0x8E, 0x017D),
    (0x91, 0x2018),
    (0x92, 0x2019),
    (0x93, 0x201C),
    (0x94, 0x201D),
    (0x95, 0x2022),
    (0x96, 0x2013),
    (0x97, 0x2014),
    (0x98, 0x02DC),
    (0x99, 0x2122),
    (0x9A, 0x0161),
    (0x9B, 0x203A),
    (0x9C, 0x0153),
    (0x9E, 0x017E),
    (0x9F, 0x0178),
];

/// Map one character to its cp1252 code, if it has one.
pub fn cp1252_code(ch: char) -> Option<u8> {
    let cp = ch as u32;
    match cp {
        0x00..=0x7F | 0xA0..=0xFF => Some(cp as u8),
        _ => CP1252_HIGH
            .iter()
            .find(|(_, u)| *u == cp)
            .map(|(code, _)| *code),
    }
}

/// Translate UTF-8 text to cp1252; characters without a code become `?`.
pub fn utf8_to_cp1252(text: &str) -> Vec<u8> {
    text.chars().map(|c| cp1252_code(c).unwrap_or(b'?')).collect()
}

/// UTF-16BE bytes without a byte order mark.
pub fn utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

/// UTF-16BE bytes preceded by the `FE FF` byte order mark.
pub fn utf16be_with_bom(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    out.extend(utf16be(text));
    out
}

/// Encode a document-level text string: plain bytes when the text is ASCII,
/// otherwise UTF-16BE with a byte order mark.
pub fn text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        text.as_bytes().to_vec()
    } else {
        utf16be_with_bom(text)
    }
}

/// Replace every occurrence of `from` with `to`, returning the number of
/// replacements made.
pub fn replace_bytes(buf: &mut Vec<u8>, from: &[u8], to: &[u8]) -> usize {
    if from.is_empty() || buf.len() < from.len() {
        return 0;
    }
    let mut out = Vec::with_capacity(buf.len());
    let mut count = 0;
    let mut i = 0;
    while i < buf.len() {
        if buf[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
            count += 1;
        } else {
            out.push(buf[i]);
            i += 1;
        }
    }
    if count > 0 {
        *buf = out;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp1252_translation() {
        assert_eq!(utf8_to_cp1252("Aé€"), vec![b'A', 0xE9, 0x80]);
        assert_eq!(utf8_to_cp1252("Ω"), vec![b'?']);
        assert_eq!(cp1252_code('\u{2014}'), Some(0x97));
        assert_eq!(cp1252_code('\u{81}'), None);
    }

    #[test]
    fn test_utf16() {
        assert_eq!(utf16be("A€"), vec![0x00, 0x41, 0x20, 0xAC]);
        assert_eq!(utf16be_with_bom("A"), vec![0xFE, 0xFF, 0x00, 0x41]);
        // surrogate pair for U+1F600
        assert_eq!(utf16be("\u{1F600}"), vec![0xD8, 0x3D, 0xDE, 0x00]);
    }

    #[test]
    fn test_text_string() {
        assert_eq!(text_string("Title"), b"Title".to_vec());
        assert_eq!(&text_string("Tïtle")[..2], &[0xFE, 0xFF]);
    }

    #[test]
    fn test_replace_bytes() {
        let mut buf = b"Page 1/{nb} and {nb}".to_vec();
        assert_eq!(replace_bytes(&mut buf, b"{nb}", b"12"), 2);
        assert_eq!(buf, b"Page 1/12 and 12".to_vec());
        assert_eq!(replace_bytes(&mut buf, b"{nb}", b"12"), 0);
        assert_eq!(replace_bytes(&mut buf, b"", b"x"), 0);
    }
}
