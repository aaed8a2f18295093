//! Little-endian primitives for the binary model file.
//!
//! All multi-byte integers are written little-endian. Strings are written as
//! a `u64` byte length followed by the raw UTF-8 bytes. A truncated record is
//! reported as [`TokenizerError::MalformedModelFile`] rather than a bare io
//! error so callers can distinguish a short file from a missing one.

use std::io::{Read, Write};

use crate::error::{Result, TokenizerError};

pub fn write_u8<W: Write>(out: &mut W, value: u8) -> Result<()> {
    out.write_all(&[value])?;
    Ok(())
}

pub fn write_u64<W: Write>(out: &mut W, value: u64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_f32<W: Write>(out: &mut W, value: f32) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn write_string<W: Write>(out: &mut W, value: &str) -> Result<()> {
    write_u64(out, value.len() as u64)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_exact<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TokenizerError::MalformedModelFile(format!("truncated {what}"))
        } else {
            TokenizerError::Io(e)
        }
    })
}

pub fn read_u8<R: Read>(input: &mut R, what: &str) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact(input, &mut buf, what)?;
    Ok(buf[0])
}

pub fn read_u64<R: Read>(input: &mut R, what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(input, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_i32<R: Read>(input: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact(input, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}

pub fn read_f32<R: Read>(input: &mut R, what: &str) -> Result<f32> {
    let mut buf = [0u8; 4];
    read_exact(input, &mut buf, what)?;
    Ok(f32::from_le_bytes(buf))
}

pub fn read_string<R: Read>(input: &mut R, what: &str) -> Result<String> {
    let len = read_u64(input, what)?;
    // Read through a bounded adaptor instead of pre-allocating `len` bytes,
    // so a corrupt length prefix fails as a short read rather than an
    // enormous allocation.
    let mut buf = Vec::new();
    input
        .by_ref()
        .take(len)
        .read_to_end(&mut buf)
        .map_err(TokenizerError::Io)?;
    if buf.len() as u64 != len {
        return Err(TokenizerError::MalformedModelFile(format!(
            "truncated {what}"
        )));
    }
    String::from_utf8(buf)
        .map_err(|e| TokenizerError::InvalidUtf8(format!("{what}: {e}")))
}

/// Verify that a reader is exhausted. Trailing bytes after the expected
/// sections mean the file does not match the declared layout.
pub fn expect_eof<R: Read>(input: &mut R) -> Result<()> {
    let mut probe = [0u8; 1];
    match input.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(TokenizerError::MalformedModelFile(
            "trailing bytes after final section".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_roundtrip() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0xDEAD_BEEF_u64).expect("write");
        let mut cursor = buf.as_slice();
        assert_eq!(read_u64(&mut cursor, "test").expect("read"), 0xDEAD_BEEF);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "héllo ▁world").expect("write");
        let mut cursor = buf.as_slice();
        assert_eq!(
            read_string(&mut cursor, "test").expect("read"),
            "héllo ▁world"
        );
    }

    #[test]
    fn test_truncated_string_is_malformed() {
        let mut buf = Vec::new();
        write_string(&mut buf, "hello").expect("write");
        buf.truncate(buf.len() - 2);
        let mut cursor = buf.as_slice();
        let err = read_string(&mut cursor, "token text").expect_err("short read");
        assert!(matches!(err, TokenizerError::MalformedModelFile(_)));
    }

    #[test]
    fn test_negative_id_roundtrip() {
        let mut buf = Vec::new();
        write_i32(&mut buf, -1).expect("write");
        let mut cursor = buf.as_slice();
        assert_eq!(read_i32(&mut cursor, "id").expect("read"), -1);
    }

    #[test]
    fn test_expect_eof_flags_trailing_bytes() {
        let data = [1u8, 2, 3];
        let mut cursor = &data[..];
        let _ = read_u8(&mut cursor, "lead").expect("read");
        assert!(expect_eof(&mut cursor).is_err());
        let _ = read_u8(&mut cursor, "mid").expect("read");
        let _ = read_u8(&mut cursor, "tail").expect("read");
        assert!(expect_eof(&mut cursor).is_ok());
    }
}
