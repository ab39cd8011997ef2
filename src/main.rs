use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use clip_cutter::{
    clipping::{Clipping, ClippingConversion, ProgressHandler},
    config::Config,
    player::{FrameCallback, FrameInfo, Player},
    timefmt::{seconds_to_str, str_to_milliseconds},
    video::{types::Frame, Decoder, Encoder, EncoderSettings, FrameSink, FrameSource},
};

#[derive(Parser)]
#[command(
    name = "clip-cutter",
    version,
    about = "Frame-accurate video cutting with keyframed crop, rotation and scale",
    long_about = "clip-cutter inspects and cuts video files, and renders clipping projects (keyframed crop regions that move, rotate and scale over time) into new videos."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print stream information
    Info {
        video: PathBuf,
    },

    /// Write one decoded frame as an image
    Snapshot {
        video: PathBuf,

        /// Frame number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        frame: i64,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Play a time range in real time, logging each frame
    Play {
        video: PathBuf,

        /// Start time (HH:MM:SS,mmm)
        #[arg(short, long, default_value = "00:00:00")]
        start: String,

        /// End time (HH:MM:SS,mmm), the end of the video when omitted
        #[arg(short, long)]
        end: Option<String>,

        /// Playback speed, overrides the configured one
        #[arg(long)]
        speed: Option<f64>,
    },

    /// Re-encode a time range without clipping
    Cut {
        video: PathBuf,

        /// Start time (HH:MM:SS,mmm)
        #[arg(short, long, default_value = "00:00:00")]
        start: String,

        /// End time (HH:MM:SS,mmm), the end of the video when omitted
        #[arg(short, long)]
        end: Option<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        encoding: EncodingArgs,
    },

    /// Render a clipping project into a video
    Convert {
        /// Clipping project (JSON)
        clipping: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Use this video instead of the one stored in the project
        #[arg(long)]
        video: Option<PathBuf>,

        /// Play the clipping backwards
        #[arg(long)]
        reverse: bool,

        /// Follow the clip with its own reverse
        #[arg(long)]
        append_reverse: bool,

        /// Blend the first frame into the last one
        #[arg(long)]
        merge: bool,

        /// Frames cross-faded at the loop point
        #[arg(long)]
        transition: Option<usize>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },
}

#[derive(Args)]
struct EncodingArgs {
    /// Codec (webm, mp4-x264, mp4-x265, mjpeg)
    #[arg(long)]
    codec: Option<String>,

    /// Bitrate in bits per second
    #[arg(long)]
    bitrate: Option<u64>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<f64>,
}

impl EncodingArgs {
    /// Apply the command line overrides on top of the configuration
    fn apply(&self, config: &mut Config) {
        if let Some(codec) = &self.codec {
            config.encoder.codec = codec.clone();
        }
        if self.bitrate.is_some() {
            config.encoder.bitrate = self.bitrate;
        }
        if self.fps.is_some() {
            config.encoder.fps = self.fps;
        }
    }
}

/// Reports conversion progress through the log, every 5%
struct LogProgress {
    last_step: usize,
}

impl ProgressHandler for LogProgress {
    fn set_progress(&mut self, position: usize, max: usize) {
        let step = position * 20 / max.max(1);
        if step > self.last_step || position == max {
            self.last_step = step;
            info!("Rendered {}/{} frames ({}%)", position, max, step * 5);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging, RUST_LOG takes precedence
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting clip-cutter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            debug!("Using default configuration");
            Config::default()
        }
    };

    match cli.command {
        Command::Info { video } => info_command(&config, &video),
        Command::Snapshot { video, frame, output } => snapshot(&config, &video, frame, &output),
        Command::Play { video, start, end, speed } => {
            if let Some(speed) = speed {
                config.player.speed = speed;
            }
            config.validate()?;
            play(&config, &video, &start, end.as_deref())
        }
        Command::Cut { video, start, end, output, encoding } => {
            encoding.apply(&mut config);
            config.validate()?;
            cut(&config, &video, &start, end.as_deref(), &output)
        }
        Command::Convert {
            clipping,
            output,
            video,
            reverse,
            append_reverse,
            merge,
            transition,
            encoding,
        } => {
            encoding.apply(&mut config);
            if reverse {
                config.conversion.from_start = false;
            }
            if append_reverse {
                config.conversion.append_reverse = true;
            }
            if merge {
                config.conversion.merge_frames = true;
            }
            if let Some(frames) = transition {
                config.conversion.transition_frames = frames;
            }
            config.validate()?;
            convert(&config, &clipping, video.as_deref(), &output)
        }
    }
}

fn open_decoder(config: &Config, path: &Path) -> Result<Decoder> {
    Decoder::open_with_mode(path, config.decoder.pixel_mode)
        .with_context(|| format!("Could not open {}", path.display()))
}

fn info_command(config: &Config, path: &Path) -> Result<()> {
    let decoder = open_decoder(config, path)?;
    let info = decoder.info();

    println!("File:         {}", path.display());
    println!("Codec:        {}", info.codec);
    println!("Size:         {}x{}", info.width, info.height);
    println!("Aspect ratio: {}:{}", info.aspect_ratio.0, info.aspect_ratio.1);
    println!("Frame rate:   {:.3} fps", info.fps);
    println!("Frames:       {}", info.frame_count);
    println!("Duration:     {}", seconds_to_str(info.duration, true));
    println!("Time base:    {}/{}", info.time_base.0, info.time_base.1);
    Ok(())
}

fn snapshot(config: &Config, path: &Path, frame: i64, output: &Path) -> Result<()> {
    let mut decoder = open_decoder(config, path)?;
    decoder.seek_frame(frame);

    if decoder.frame_number() != frame {
        warn!("Requested frame {}, landed on {}", frame, decoder.frame_number());
    }

    let (w, h) = (decoder.width(), decoder.height());
    let picture = decoder.picture()?.to_vec();
    let image = Frame::from_rgb_bytes(w, h, picture)
        .ok_or_else(|| anyhow::anyhow!("Decoded picture does not match {}x{}", w, h))?;

    image.save_png(output)?;
    info!("Frame {} saved to {:?}", decoder.frame_number(), output);
    Ok(())
}

fn play(config: &Config, path: &Path, start: &str, end: Option<&str>) -> Result<()> {
    let (frames_tx, frames_rx) = mpsc::channel::<FrameInfo>();
    let on_frame: FrameCallback = Box::new(move |info| {
        let _ = frames_tx.send(info);
    });

    let source_path = path.to_path_buf();
    let mode = config.decoder.pixel_mode;
    let player = Player::with_config(
        move || Ok(Decoder::open_with_mode(&source_path, mode)?),
        Some(on_frame),
        &config.player,
    )
    .with_context(|| format!("Could not open {}", path.display()))?;

    let (fps, frame_count) = player
        .query(|source| (source.fps().max(1.0), source.frame_count()))
        .ok_or_else(|| anyhow::anyhow!("Player worker stopped"))?;
    let end_ms = match end {
        Some(end) => str_to_milliseconds(end),
        None => (frame_count as f64 * 1000.0 / fps) as i64,
    };

    player.seek_time(str_to_milliseconds(start)).wait();
    info!("Playing {:?} at {:.1}x", path, player.speed());
    player.play().wait();

    let timeout = Duration::from_secs(2);
    loop {
        match frames_rx.recv_timeout(timeout) {
            Ok(frame) => {
                let time = (frame.position - 1) as f64 / fps;
                debug!("Frame {}/{} at {}", frame.position, frame.count, seconds_to_str(time, true));
                if time * 1000.0 >= end_ms as f64 {
                    player.pause().wait();
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) if player.is_playing() => {}
            Err(_) => break,
        }
    }

    let position = player.query(|source| source.frame_number()).unwrap_or(0);
    info!("Stopped on frame {}", position);
    Ok(())
}

fn encoder_settings(config: &Config, output: &Path, w: u32, h: u32, source_fps: f64) -> EncoderSettings {
    EncoderSettings::new(
        &config.encoder.codec,
        &output.to_string_lossy(),
        w,
        h,
        config.encoder.fps.unwrap_or(source_fps),
        config.encoder.bitrate.unwrap_or(0),
    )
}

fn cut(config: &Config, path: &Path, start: &str, end: Option<&str>, output: &Path) -> Result<()> {
    let mut decoder = open_decoder(config, path)?;

    let start_ms = str_to_milliseconds(start);
    let end_ms = match end {
        Some(end) => str_to_milliseconds(end),
        None => (decoder.duration() * 1000.0) as i64,
    };
    if end_ms <= start_ms {
        bail!("The end time must come after the start time");
    }

    let settings = encoder_settings(config, output, decoder.width(), decoder.height(), decoder.fps());
    let mut encoder = Encoder::create(settings)?;

    info!(
        "Cutting {} to {} from {:?}",
        seconds_to_str(start_ms as f64 / 1000.0, true),
        seconds_to_str(end_ms as f64 / 1000.0, true),
        path
    );

    decoder.seek_time(start_ms);
    let mut written = 0;
    loop {
        if decoder.frame_time() * 1000.0 > end_ms as f64 {
            break;
        }

        encoder.frame(decoder.picture()?)?;
        written += 1;

        if !decoder.next() {
            break;
        }
    }

    encoder.finish()?;
    info!("Wrote {} frames to {:?}", written, output);
    Ok(())
}

fn convert(config: &Config, project: &Path, video: Option<&Path>, output: &Path) -> Result<()> {
    let mut clipping = Clipping::from_file(project)
        .with_context(|| format!("Could not load clipping {}", project.display()))?;

    if let Some(video) = video {
        clipping.set_video_path(&video.to_string_lossy());
    }
    if clipping.video_path().is_empty() {
        bail!("The clipping has no video attached");
    }

    let mut decoder = open_decoder(config, Path::new(clipping.video_path()))?;
    let frame_count = u32::try_from(decoder.frame_count()).unwrap_or(0);
    clipping.set_video_info(decoder.width(), decoder.height(), frame_count);

    if let Some(width) = config.encoder.width {
        let height = (f64::from(width) * f64::from(clipping.h()) / f64::from(clipping.w().max(1))).round() as u32;
        clipping.set_wh(width, height.max(1));
    }

    let settings = encoder_settings(config, output, clipping.w(), clipping.h(), decoder.fps());
    let mut encoder = Encoder::create(settings)?;

    let conversion = ClippingConversion::new(&clipping, config.conversion.options());
    let mut progress = LogProgress { last_step: 0 };
    let written = conversion.convert(&mut decoder, &mut encoder, &mut progress)?;

    info!("Conversion complete! {} frames saved to {:?}", written, output);
    Ok(())
}
