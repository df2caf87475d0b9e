//! # clipstage-player
//!
//! The real-time player. Once per display tick it advances the script VM,
//! mixes every playing sound into one buffer, renders each visible video
//! entity concurrently on a worker pool, and keeps the depth layer of the
//! last completed tick for pointer hit-testing.

pub mod assets;
pub mod clock;
pub mod effects;
pub mod mixer;
pub mod pointer;
pub mod render_frame;
pub mod renderer;
pub mod scheduler;
pub mod sinks;
pub mod vm;

pub use assets::{ClipLibrary, MemorySampleStore};
pub use clock::{Driver, FixedRateClock, ManualClock, RunSummary, TickClock};
pub use hit_test::{DepthLayer, HitTester};
pub use mixer::{AudioMixer, AudioSink, MixRequest, SampleStore};
pub use pointer::{PointerController, PointerEvent, PointerPhase, SurfaceMapping};
pub use render_frame::{RenderFrame, VideoEffects};
pub use renderer::{ComposedFrame, DisplaySink, RenderBackend, SoftwareRenderer};
pub use scheduler::{Player, PlayerParts, TickPhase, TickReport};
pub use sinks::{CollectingAudioSink, LatestFrameSink, NullAudioSink, NullDisplaySink};
pub use vm::{RecordedVm, ScriptVm, VideoTarget, VmEvent, VmSnapshot};
