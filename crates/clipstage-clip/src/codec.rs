//! Binary clip container.
//!
//! Layout, every integer a little-endian `u32`:
//!
//! ```text
//! 0   magic          0x000F1DE0
//! 4   frame count    n
//! 8   width
//! 12  height
//! 16  mask offset    (8 + n) * 4
//! 20  mask length
//! 24  data offset    mask offset + mask length
//! 28  data length
//! 32  n frame offsets, relative to the data region
//! ..  mask bytes
//! ..  frame data bytes
//! ```
//!
//! Frame lengths are not stored: frame `i` runs to the next frame's offset,
//! the last frame to the end of the data region.

use clipstage_core::{ClipstageError, ClipstageResult};

use crate::clip::{Clip, FrameInfo};

/// First word of every clip file.
pub const CLIP_MAGIC: u32 = 0x000F_1DE0;

/// Number of `u32` words in the fixed header.
pub const HEADER_WORDS: usize = 8;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = HEADER_WORDS * 4;

/// The fixed 8-word header of a serialized clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipHeader {
    pub magic: u32,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub mask_offset: u32,
    pub mask_length: u32,
    pub data_offset: u32,
    pub data_length: u32,
}

impl ClipHeader {
    /// Compute the header describing `clip`'s serialized layout.
    pub fn for_clip(clip: &Clip) -> ClipstageResult<Self> {
        let too_large = || ClipstageError::format("clip too large for 32-bit container offsets");
        let table_len = (clip.frame_count() as u64) * 4;
        let mask_offset = u32::try_from(HEADER_LEN as u64 + table_len).map_err(|_| too_large())?;
        let mask_length = u32::try_from(clip.mask().len()).map_err(|_| too_large())?;
        let data_offset = mask_offset.checked_add(mask_length).ok_or_else(too_large)?;
        let data_length = u32::try_from(clip.data().len()).map_err(|_| too_large())?;
        data_offset.checked_add(data_length).ok_or_else(too_large)?;

        Ok(Self {
            magic: CLIP_MAGIC,
            frame_count: clip.frame_count(),
            width: clip.width(),
            height: clip.height(),
            mask_offset,
            mask_length,
            data_offset,
            data_length,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        for word in [
            self.magic,
            self.frame_count,
            self.width,
            self.height,
            self.mask_offset,
            self.mask_length,
            self.data_offset,
            self.data_length,
        ] {
            w.put_u32(word);
        }
    }

    fn read(r: &mut ByteReader<'_>) -> ClipstageResult<Self> {
        if r.remaining() < HEADER_LEN {
            return Err(ClipstageError::format(format!(
                "truncated header: {} bytes, need {}",
                r.remaining(),
                HEADER_LEN
            )));
        }
        let magic = r.read_u32("magic number")?;
        if magic != CLIP_MAGIC {
            return Err(ClipstageError::format(format!(
                "bad magic number {:#010x}, expected {:#010x}",
                magic, CLIP_MAGIC
            )));
        }
        Ok(Self {
            magic,
            frame_count: r.read_u32("frame count")?,
            width: r.read_u32("width")?,
            height: r.read_u32("height")?,
            mask_offset: r.read_u32("mask offset")?,
            mask_length: r.read_u32("mask length")?,
            data_offset: r.read_u32("data offset")?,
            data_length: r.read_u32("data length")?,
        })
    }

    /// Byte offset one past the frame offset table.
    pub fn table_end(&self) -> u64 {
        HEADER_LEN as u64 + (self.frame_count as u64) * 4
    }

    /// Total size of a file with this header.
    pub fn file_len(&self) -> u64 {
        self.data_offset as u64 + self.data_length as u64
    }

    /// Check every region against the table and a file of `len` bytes.
    fn validate(&self, len: usize) -> ClipstageResult<()> {
        let len = len as u64;
        let table_end = self.table_end();
        if table_end > len {
            return Err(ClipstageError::format(format!(
                "truncated frame offset table: {} frames need {} bytes, file has {}",
                self.frame_count, table_end, len
            )));
        }
        if (self.mask_offset as u64) < table_end {
            return Err(ClipstageError::format(format!(
                "mask offset {} overlaps the frame offset table ending at {}",
                self.mask_offset, table_end
            )));
        }
        let mask_end = self.mask_offset as u64 + self.mask_length as u64;
        if mask_end > len {
            return Err(ClipstageError::format(format!(
                "mask region {}..{} exceeds file length {}",
                self.mask_offset, mask_end, len
            )));
        }
        if (self.data_offset as u64) < mask_end {
            return Err(ClipstageError::format(format!(
                "frame data offset {} overlaps the mask region ending at {}",
                self.data_offset, mask_end
            )));
        }
        if self.file_len() > len {
            return Err(ClipstageError::format(format!(
                "frame data region {}..{} exceeds file length {}",
                self.data_offset,
                self.file_len(),
                len
            )));
        }
        if self.frame_count == 0 && self.data_length != 0 {
            return Err(ClipstageError::format(format!(
                "{} bytes of frame data but no frames",
                self.data_length
            )));
        }
        Ok(())
    }
}

/// Append-only little-endian writer over an owned buffer.
struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked little-endian cursor.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_u32(&mut self, what: &str) -> ClipstageResult<u32> {
        let end = self.pos + 4;
        let word = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| ClipstageError::format(format!("truncated while reading {}", what)))?;
        self.pos = end;
        Ok(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }

    /// Copy `len` bytes at absolute `offset` without moving the cursor.
    fn copy_region(&self, offset: u32, len: u32, what: &str) -> ClipstageResult<Vec<u8>> {
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or_else(|| ClipstageError::format(format!("{} region overflows", what)))?;
        self.bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ClipstageError::format(format!("{} region {}..{} out of bounds", what, start, end)))
    }
}

/// Serialize a clip to its container bytes.
pub fn encode(clip: &Clip) -> ClipstageResult<Vec<u8>> {
    let header = ClipHeader::for_clip(clip)?;
    let mut w = ByteWriter::with_capacity(header.file_len() as usize);
    header.write(&mut w);
    for info in clip.frame_table() {
        w.put_u32(info.offset);
    }
    w.put_bytes(clip.mask());
    w.put_bytes(clip.data());

    let bytes = w.finish();
    tracing::debug!(
        "Encoded clip: {} frames, {}x{}, {} bytes",
        header.frame_count,
        header.width,
        header.height,
        bytes.len()
    );
    Ok(bytes)
}

/// Validate and return the header of a serialized clip without copying payloads.
pub fn read_header(bytes: &[u8]) -> ClipstageResult<ClipHeader> {
    let header = ClipHeader::read(&mut ByteReader::new(bytes))?;
    header.validate(bytes.len())?;
    Ok(header)
}

/// Parse container bytes into an owned [`Clip`].
///
/// Any inconsistency between header, offset table and payload sizes is a
/// format error; no partial clip is ever returned.
pub fn decode(bytes: &[u8]) -> ClipstageResult<Clip> {
    let mut r = ByteReader::new(bytes);
    let header = ClipHeader::read(&mut r)?;
    header.validate(bytes.len())?;

    let mut offsets = Vec::with_capacity(header.frame_count as usize);
    for i in 0..header.frame_count {
        offsets.push(r.read_u32(&format!("offset of frame {}", i))?);
    }

    let frames = derive_frame_table(&offsets, header.data_length)?;
    let mask = r.copy_region(header.mask_offset, header.mask_length, "mask")?;
    let data = r.copy_region(header.data_offset, header.data_length, "frame data")?;

    Ok(Clip::from_parts(header.width, header.height, frames, mask, data))
}

/// Rebuild `(offset, length)` pairs from bare offsets.
fn derive_frame_table(offsets: &[u32], data_length: u32) -> ClipstageResult<Vec<FrameInfo>> {
    match offsets.first() {
        None => return Ok(Vec::new()),
        Some(0) => {}
        Some(first) => {
            return Err(ClipstageError::format(format!(
                "first frame offset is {}, expected 0",
                first
            )))
        }
    }

    let ends = offsets.iter().skip(1).copied().chain(std::iter::once(data_length));
    offsets
        .iter()
        .zip(ends)
        .enumerate()
        .map(|(i, (&offset, end))| {
            let length = end.checked_sub(offset).ok_or_else(|| {
                ClipstageError::format(format!(
                    "frame {} has negative length (offset {}, next boundary {})",
                    i, offset, end
                ))
            })?;
            Ok(FrameInfo { offset, length })
        })
        .collect()
}
