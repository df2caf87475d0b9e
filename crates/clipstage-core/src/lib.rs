//! # clipstage-core
//!
//! Core types and primitives for Clipstage.
//! This crate contains foundational types shared across all Clipstage crates:
//! raster and depth buffers, colors, 2-D transforms, timestamps, the host
//! clock, configuration, error types, and the polyline simplifier.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod math;
pub mod simplify;
pub mod time;

pub use config::*;

pub use color::Color;
pub use error::{ClipstageError, ClipstageResult};
pub use frame::{DepthBuffer, FrameBuffer, DEPTH_CLEAR};
pub use math::{Affine2D, Point2D, Size2D};
pub use simplify::simplify;
pub use time::{Duration, HostTime, Timestamp};
