//! Little-endian primitive encoding shared by every on-disk archive format.

use std::io::{self, Read, Write};

/// Upper bound on a length-prefixed string, guarding against corrupt headers.
const MAX_STRING_LEN: u32 = 1 << 16;

pub trait ReadLe: Read {
    fn read_u8_le(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_i64_le(&mut self) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_f64_le(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn read_string_le(&mut self) -> io::Result<String> {
        let len = self.read_u32_le()?;
        if len > MAX_STRING_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("string length {len} exceeds {MAX_STRING_LEN}"),
            ));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: Read + ?Sized> ReadLe for R {}

pub trait WriteLe: Write {
    fn write_u8_le(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    fn write_u32_le(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_u64_le(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_i64_le(&mut self, value: i64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f64_le(&mut self, value: f64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_string_le(&mut self, value: &str) -> io::Result<()> {
        let len = u32::try_from(value.len())
            .ok()
            .filter(|len| *len <= MAX_STRING_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
        self.write_u32_le(len)?;
        self.write_all(value.as_bytes())
    }
}

impl<W: Write + ?Sized> WriteLe for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_values_are_little_endian() {
        let mut buf = Vec::new();
        buf.write_u32_le(0x0102_0304).unwrap();
        assert_eq!(buf, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_mixed_sequence_reads_back() {
        let mut buf = Vec::new();
        buf.write_u8_le(7).unwrap();
        buf.write_i64_le(-42).unwrap();
        buf.write_f64_le(1.25).unwrap();
        buf.write_string_le("png").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(cursor.read_u8_le().unwrap(), 7);
        assert_eq!(cursor.read_i64_le().unwrap(), -42);
        assert_eq!(cursor.read_f64_le().unwrap(), 1.25);
        assert_eq!(cursor.read_string_le().unwrap(), "png");
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut cursor = Cursor::new(vec![1u8, 2]);
        let err = cursor.read_u32_le().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_string_header_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32_le(u32::MAX).unwrap();
        let err = Cursor::new(buf).read_string_le().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
