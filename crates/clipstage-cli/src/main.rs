mod session;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use clipstage_clip::decode::{decode_frame, image_dimensions, save_png};
use clipstage_clip::{load_clip, read_header, save_clip, Clip, ImageFrameDecoder};
use clipstage_core::hash::hash_bytes;
use clipstage_core::{simplify, ClipstageConfig, Point2D, Timestamp};
use clipstage_player::{
    Driver, FixedRateClock, LatestFrameSink, ManualClock, NullAudioSink, Player, PlayerParts,
    SoftwareRenderer, TickClock,
};

use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "clipstage",
    version,
    about = "Clipstage — clip container tools and a headless player for recorded stages"
)]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a clip's header, sizes and SHA-256
    Inspect {
        #[arg()]
        clip: PathBuf,

        /// Also list every frame's offset and length
        #[arg(long)]
        frames: bool,
    },

    /// Build a clip from encoded images, one frame per image
    Pack {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Image used as the compositing mask (white keeps, black cuts)
        #[arg(long)]
        mask: Option<PathBuf>,
    },

    /// Write one frame of a clip out as PNG (or its raw stored bytes)
    Extract {
        #[arg()]
        clip: PathBuf,

        /// Frame number, clamped to the last frame
        #[arg(long, conflicts_with = "at")]
        frame: Option<f64>,

        /// Position through the clip, 0.0 = first frame, 1.0 = last
        #[arg(long)]
        at: Option<f64>,

        #[arg(short, long)]
        output: PathBuf,

        /// Write the stored image bytes instead of decoding
        #[arg(long)]
        raw: bool,
    },

    /// Simplify a polyline read from a JSON array of {"x", "y"} points
    Simplify {
        #[arg()]
        points: PathBuf,

        #[arg(short, long, default_value_t = 1.0)]
        tolerance: f64,
    },

    /// Play a recorded session headless
    Play {
        #[arg()]
        session: PathBuf,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Save the last composed frame as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tick on the wall clock at the configured fps instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ClipstageConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => ClipstageConfig::default(),
    };

    match cli.command {
        Commands::Inspect { clip, frames } => cmd_inspect(&clip, frames),
        Commands::Pack {
            images,
            output,
            mask,
        } => cmd_pack(&images, &output, mask.as_deref()),
        Commands::Extract {
            clip,
            frame,
            at,
            output,
            raw,
        } => cmd_extract(&clip, frame, at, &output, raw),
        Commands::Simplify { points, tolerance } => cmd_simplify(&points, tolerance),
        Commands::Play {
            session,
            ticks,
            output,
            realtime,
        } => run_async(cmd_play(config, session, ticks, output, realtime)),
    }
}

fn run_async<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    runtime.block_on(future)
}

fn cmd_inspect(path: &Path, frames: bool) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read clip: {}", path.display()))?;
    let header = read_header(&bytes)?;
    let clip = clipstage_clip::decode(&bytes)
        .with_context(|| format!("invalid clip: {}", path.display()))?;

    println!("🔍 {}", path.display());
    println!("   Frames:     {}", header.frame_count);
    println!("   Size:       {}x{}", header.width, header.height);
    println!(
        "   Mask:       {} bytes at {}",
        header.mask_length, header.mask_offset
    );
    println!(
        "   Data:       {} bytes at {}",
        header.data_length, header.data_offset
    );
    println!("   File:       {} bytes", bytes.len());
    println!("   SHA-256:    {}", hash_bytes(&bytes));

    if frames {
        println!();
        println!("   {:>6}  {:>10}  {:>10}", "frame", "offset", "length");
        for (i, info) in clip.frame_table().iter().enumerate() {
            println!("   {:>6}  {:>10}  {:>10}", i, info.offset, info.length);
        }
    }
    Ok(())
}

fn cmd_pack(images: &[PathBuf], output: &Path, mask: Option<&Path>) -> Result<()> {
    let mut clip: Option<Clip> = None;
    for path in images {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image: {}", path.display()))?;
        let (width, height) = image_dimensions(&bytes)
            .with_context(|| format!("not an image: {}", path.display()))?;
        let current = clip.get_or_insert_with(|| Clip::new(width, height));
        if (width, height) != (current.width(), current.height()) {
            anyhow::bail!(
                "{} is {}x{}, expected {}x{} like the first frame",
                path.display(),
                width,
                height,
                current.width(),
                current.height()
            );
        }
        current.append_frame(&bytes)?;
    }
    let Some(mut clip) = clip else {
        anyhow::bail!("no images given");
    };

    if let Some(mask) = mask {
        let bytes = std::fs::read(mask)
            .with_context(|| format!("failed to read mask: {}", mask.display()))?;
        let dims = image_dimensions(&bytes)
            .with_context(|| format!("not an image: {}", mask.display()))?;
        if dims != (clip.width(), clip.height()) {
            anyhow::bail!(
                "mask is {}x{}, frames are {}x{}",
                dims.0,
                dims.1,
                clip.width(),
                clip.height()
            );
        }
        clip.set_mask(bytes);
    }

    save_clip(&clip, output)?;
    println!(
        "   ✓ Packed {} frames into {}",
        clip.frame_count(),
        output.display()
    );
    Ok(())
}

fn cmd_extract(
    path: &Path,
    frame: Option<f64>,
    at: Option<f64>,
    output: &Path,
    raw: bool,
) -> Result<()> {
    let clip = load_clip(path)?;
    let number = match (frame, at) {
        (Some(frame), _) => frame,
        (None, Some(at)) => at.clamp(0.0, 1.0) * (clip.frame_count().saturating_sub(1)) as f64,
        (None, None) => 0.0,
    };
    let Some(index) = clip.clamp_frame_number(number) else {
        anyhow::bail!("{} has no frames", path.display());
    };

    if raw {
        std::fs::write(output, clip.frame_bytes(index)?)
            .with_context(|| format!("failed to write {}", output.display()))?;
    } else {
        let fb = decode_frame(&clip, index, &ImageFrameDecoder)?;
        save_png(&fb, output)?;
    }
    println!("   ✓ Frame {} -> {}", index, output.display());
    Ok(())
}

fn cmd_simplify(path: &Path, tolerance: f64) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read points: {}", path.display()))?;
    let points: Vec<Point2D> = serde_json::from_str(&source)
        .with_context(|| format!("failed to parse points: {}", path.display()))?;
    let simplified = simplify(&points, tolerance);
    tracing::info!("Simplified {} points to {}", points.len(), simplified.len());
    println!("{}", serde_json::to_string(&simplified)?);
    Ok(())
}

async fn cmd_play(
    config: ClipstageConfig,
    session_path: PathBuf,
    ticks: Option<u64>,
    output: Option<PathBuf>,
    realtime: bool,
) -> Result<()> {
    let (session, base) = Session::load(&session_path)?;
    let loaded = session.open(&base)?;

    let mut clock: Box<dyn TickClock> = if realtime {
        Box::new(FixedRateClock::new(config.timing.fps)?)
    } else {
        let count = ticks.unwrap_or(loaded.vm.len() as u64) as usize;
        Box::new(ManualClock::at_rate(Timestamp::zero(), config.timing.fps, count))
    };

    let display = LatestFrameSink::new();
    let mut player = Player::new(
        config.clone(),
        PlayerParts {
            vm: Box::new(loaded.vm),
            clips: loaded.clips,
            samples: Arc::new(loaded.samples),
            backend: Arc::new(SoftwareRenderer::new(&config.render)?),
            display: Box::new(display.clone()),
            audio: Box::new(NullAudioSink),
        },
    )?;

    let driver = Driver::new().with_max_ticks(ticks);
    let stop = driver.stop_handle();
    let mut run = tokio::task::spawn_blocking(move || driver.run(&mut player, clock.as_mut()));

    let finished = tokio::select! {
        joined = &mut run => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            tracing::info!("Interrupted, finishing current tick");
            stop.store(true, Ordering::Relaxed);
            run.await
        }
    };
    let summary = joined.context("player thread panicked")??;

    println!(
        "   ✓ {} ticks, {} rendered, {} stalls, {} failed submissions",
        summary.ticks, summary.rendered, summary.stalls, summary.failed_submissions
    );

    if let Some(output) = output {
        let Some(frame) = display.latest() else {
            anyhow::bail!("no frame was rendered");
        };
        save_png(&frame.color, &output)?;
        println!("   ✓ Last frame -> {}", output.display());
    }
    Ok(())
}
