//! # clipstage-clip
//!
//! The clip container: an append-only sequence of compressed still frames
//! plus a compositing mask, serialized with a fixed header and an offset
//! table for random-access frame lookup.
//! Pixel decoding is delegated to a [`FrameDecoder`].

pub mod clip;
pub mod codec;
pub mod decode;
pub mod io;

pub use clip::{Clip, FrameInfo};
pub use codec::{decode, encode, read_header, ClipHeader, CLIP_MAGIC, HEADER_LEN};
pub use decode::{FrameDecoder, ImageFrameDecoder};
pub use io::{load_clip, save_clip};
