//! Little-endian primitives and LZ4 chunk framing for mind images.

use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"STYNKER1";
pub const VERSION_V1: u32 = 1;
pub const VERSION_CURRENT: u32 = VERSION_V1;

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    // Strict format: raw LZ4 block with external expected size.
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

/// Sink that only counts bytes; used to size an image without buffering it.
pub struct CountingWriter {
    written: usize,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self { written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Default for CountingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written = self.written.saturating_add(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_i64_le<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Lengths and ids are stored as `u32`; anything larger is rejected.
pub fn write_len<W: Write>(w: &mut W, v: usize) -> io::Result<()> {
    let v = u32::try_from(v)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "length exceeds u32"))?;
    write_u32_le(w, v)
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    Ok(read_exact::<1, _>(r)?[0])
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_i64_le<R: Read>(r: &mut R) -> io::Result<i64> {
    Ok(i64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    Ok(read_u32_le(r)? as usize)
}

/// Write a chunk whose payload is LZ4-compressed and preceded by the
/// uncompressed length (u32).
///
/// Layout:
/// - tag: [u8;4]
/// - len: u32 (bytes following, including the 4-byte uncompressed length)
/// - uncompressed_len: u32
/// - compressed payload bytes
pub fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let uncompressed_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

pub fn read_chunk_header<R: Read>(r: &mut R) -> io::Result<([u8; 4], u32)> {
    let tag = read_exact::<4, _>(r)?;
    let len = read_u32_le(r)?;
    Ok((tag, len))
}

/// Reads and decompresses the body of a chunk whose header was just read.
pub fn read_chunk_payload_lz4<R: Read>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
    if len < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "chunk shorter than its length prefix",
        ));
    }
    let mut take = r.take(len as u64);
    let uncompressed_len = read_u32_le(&mut take)? as usize;
    let mut compressed = Vec::with_capacity((len as usize).saturating_sub(4));
    take.read_to_end(&mut compressed)?;
    if compressed.len() + 4 != len as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated chunk",
        ));
    }
    decompress_lz4(&compressed, uncompressed_len)
}
