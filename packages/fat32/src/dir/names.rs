use crate::error::{FatError, Result};

/// Display form of an 8.3 name: at most eight characters, a dot, three more.
pub type ShortName = heapless::String<12>;

pub const DOT_NAME: [u8; 11] = *b".          ";
pub const DOTDOT_NAME: [u8; 11] = *b"..         ";

fn trim_trailing_spaces(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

fn display_char(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '?'
    }
}

/// `"NAME.EXT"`, or `"NAME"` when the extension field is blank.
pub fn format_name(raw: &[u8; 11]) -> ShortName {
    let name = trim_trailing_spaces(&raw[0..8]);
    let ext = trim_trailing_spaces(&raw[8..11]);

    let mut out = ShortName::new();
    for &b in name {
        let _ = out.push(display_char(b));
    }
    if !ext.is_empty() {
        let _ = out.push('.');
        for &b in ext {
            let _ = out.push(display_char(b));
        }
    }
    out
}

fn normalize_short_char(byte: u8) -> Option<u8> {
    let up = byte.to_ascii_uppercase();
    let allowed = up.is_ascii_alphanumeric()
        || matches!(
            up,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'(' | b')' | b'-' | b'@' | b'^' | b'_'
                | b'`' | b'{' | b'}' | b'~'
        );
    allowed.then_some(up)
}

/// Packs a user-supplied name into the space-padded uppercase 11-byte form.
///
/// The base is cut to eight characters and the extension to three; anything
/// past those widths is dropped. `.` and `..` are not creatable names.
pub fn encode_short_name(input: &str) -> Result<[u8; 11]> {
    let invalid = || FatError::InvalidName(input.to_string());
    let bytes = input.as_bytes();
    let (base, ext) = match bytes.iter().rposition(|&b| b == b'.') {
        Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
        None => (bytes, &[][..]),
    };
    if base.is_empty() {
        return Err(invalid());
    }

    let mut out = [b' '; 11];
    for (slot, &b) in out[..8].iter_mut().zip(base.iter()) {
        *slot = normalize_short_char(b).ok_or_else(invalid)?;
    }
    for (slot, &b) in out[8..].iter_mut().zip(ext.iter()) {
        *slot = normalize_short_char(b).ok_or_else(invalid)?;
    }
    // Characters past the field widths are dropped, but must still be legal.
    if base.iter().chain(ext.iter()).any(|&b| normalize_short_char(b).is_none()) {
        return Err(invalid());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_name_and_extension_independently() {
        assert_eq!(format_name(b"HI      TXT").as_str(), "HI.TXT");
        assert_eq!(format_name(b"README     ").as_str(), "README");
        assert_eq!(format_name(b"ABCDEFGHXYZ").as_str(), "ABCDEFGH.XYZ");
        assert_eq!(format_name(&DOT_NAME).as_str(), ".");
        assert_eq!(format_name(&DOTDOT_NAME).as_str(), "..");
    }

    #[test]
    fn inner_spaces_survive_trimming() {
        assert_eq!(format_name(b"MY FILE TX ").as_str(), "MY FILE.TX");
    }

    #[test]
    fn encodes_padded_uppercase() {
        assert_eq!(&encode_short_name("hi.txt").unwrap(), b"HI      TXT");
        assert_eq!(&encode_short_name("DIR").unwrap(), b"DIR        ");
        assert_eq!(&encode_short_name("a.b").unwrap(), b"A       B  ");
    }

    #[test]
    fn truncates_overlong_fields() {
        assert_eq!(&encode_short_name("longfilename.text").unwrap(), b"LONGFILETEX");
    }

    #[test]
    fn rejects_unencodable_names() {
        for bad in ["", ".", "..", ".hidden", "a b", "a/b", "a.b.c", "ß.txt", "x*"] {
            assert!(
                matches!(encode_short_name(bad), Err(FatError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn encoded_names_format_back() {
        let raw = encode_short_name("notes.md").unwrap();
        assert_eq!(format_name(&raw).as_str(), "NOTES.MD");
    }
}
