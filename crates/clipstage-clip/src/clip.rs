use clipstage_core::{ClipstageError, ClipstageResult};

/// Location of one compressed frame inside a clip's frame-data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Byte offset from the start of the frame-data region.
    pub offset: u32,
    /// Byte length of the compressed image.
    pub length: u32,
}

impl FrameInfo {
    pub fn end(&self) -> usize {
        self.offset as usize + self.length as usize
    }
}

/// A video clip: fixed raster dimensions, a compositing mask, and an ordered
/// run of compressed frames stored back to back.
///
/// Frames are only ever appended, so frame `i` starts where frame `i - 1`
/// ends. The serialized form relies on that to omit frame lengths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clip {
    width: u32,
    height: u32,
    frames: Vec<FrameInfo>,
    mask: Vec<u8>,
    data: Vec<u8>,
}

impl Clip {
    /// An empty clip whose frames will be `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Builder-style mask setter.
    pub fn with_mask(mut self, mask: Vec<u8>) -> Self {
        self.mask = mask;
        self
    }

    pub fn set_mask(&mut self, mask: Vec<u8>) {
        self.mask = mask;
    }

    /// Rebuild a clip from already-validated parts.
    pub(crate) fn from_parts(
        width: u32,
        height: u32,
        frames: Vec<FrameInfo>,
        mask: Vec<u8>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            frames,
            mask,
            data,
        }
    }

    /// Append one compressed image as the next frame.
    pub fn append_frame(&mut self, image: &[u8]) -> ClipstageResult<()> {
        let offset = u32::try_from(self.data.len())
            .map_err(|_| ClipstageError::format("frame data exceeds 4 GiB"))?;
        let length = u32::try_from(image.len())
            .ok()
            .filter(|len| offset.checked_add(*len).is_some())
            .ok_or_else(|| ClipstageError::format("frame data exceeds 4 GiB"))?;
        if self.frames.len() >= u32::MAX as usize {
            return Err(ClipstageError::format("too many frames"));
        }

        self.data.extend_from_slice(image);
        self.frames.push(FrameInfo { offset, length });
        Ok(())
    }

    pub fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The compressed compositing mask; empty when the clip has none.
    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    /// The concatenated compressed frames.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn frame_table(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn frame_info(&self, index: usize) -> ClipstageResult<FrameInfo> {
        self.frames
            .get(index)
            .copied()
            .ok_or(ClipstageError::FrameIndex {
                index,
                count: self.frame_count(),
            })
    }

    /// The compressed bytes of frame `index`. Never clamps.
    pub fn frame_bytes(&self, index: usize) -> ClipstageResult<&[u8]> {
        let info = self.frame_info(index)?;
        self.data
            .get(info.offset as usize..info.end())
            .ok_or_else(|| ClipstageError::format(format!("frame {} lies outside frame data", index)))
    }

    /// Resolve a fractional frame number from the script VM to a frame index:
    /// rounded to nearest, clamped into `0..frame_count`. `None` for an empty clip.
    pub fn clamp_frame_number(&self, frame: f64) -> Option<usize> {
        let last = self.frames.len().checked_sub(1)?;
        if !frame.is_finite() || frame <= 0.0 {
            return Some(0);
        }
        Some((frame.round() as usize).min(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_with_lengths(lengths: &[usize]) -> Clip {
        let mut clip = Clip::new(4, 3);
        for (i, len) in lengths.iter().enumerate() {
            clip.append_frame(&vec![i as u8; *len]).unwrap();
        }
        clip
    }

    #[test]
    fn test_append_records_contiguous_offsets() {
        let clip = clip_with_lengths(&[100, 150, 90]);
        assert_eq!(clip.frame_count(), 3);
        assert_eq!(
            clip.frame_table(),
            &[
                FrameInfo { offset: 0, length: 100 },
                FrameInfo { offset: 100, length: 150 },
                FrameInfo { offset: 250, length: 90 },
            ]
        );
        assert_eq!(clip.data().len(), 340);
    }

    #[test]
    fn test_frame_bytes() {
        let clip = clip_with_lengths(&[2, 3]);
        assert_eq!(clip.frame_bytes(0).unwrap(), &[0, 0]);
        assert_eq!(clip.frame_bytes(1).unwrap(), &[1, 1, 1]);
    }

    #[test]
    fn test_frame_bytes_out_of_range() {
        let clip = clip_with_lengths(&[2, 3]);
        let err = clip.frame_bytes(2).unwrap_err();
        assert!(matches!(err, ClipstageError::FrameIndex { index: 2, count: 2 }));
    }

    #[test]
    fn test_empty_frames_allowed() {
        let clip = clip_with_lengths(&[0, 5, 0]);
        assert_eq!(clip.frame_bytes(0).unwrap(), &[] as &[u8]);
        assert_eq!(clip.frame_info(2).unwrap(), FrameInfo { offset: 5, length: 0 });
    }

    #[test]
    fn test_clamp_frame_number() {
        let clip = clip_with_lengths(&[1, 1, 1]);
        assert_eq!(clip.clamp_frame_number(0.4), Some(0));
        assert_eq!(clip.clamp_frame_number(1.5), Some(2));
        assert_eq!(clip.clamp_frame_number(17.0), Some(2));
        assert_eq!(clip.clamp_frame_number(-3.0), Some(0));
        assert_eq!(clip.clamp_frame_number(f64::NAN), Some(0));
        assert_eq!(Clip::new(1, 1).clamp_frame_number(0.0), None);
    }

    #[test]
    fn test_mask_independent_of_frames() {
        let clip = Clip::new(2, 2).with_mask(vec![9; 20]);
        assert_eq!(clip.mask().len(), 20);
        assert!(clip.is_empty());
    }
}
