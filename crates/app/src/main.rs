use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vectorscope_core::{
    AudioStream, FrameClock, FrameOutput, OperationalMode, RenderBackend, RenderFrameProducer,
    ScopeConfig, StreamReader, VectorScopeError,
};

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK_SIZE: usize = 512;

fn main() -> vectorscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            frames,
            fps,
            config,
            polar,
        } => run_demo(frames, fps, config.as_deref(), polar),
        Commands::Dump { config, output } => run_dump(config.as_deref(), &output),
        Commands::Config { output } => write_default_config(&output),
    }
}

fn load_config(path: Option<&Path>) -> vectorscope_core::Result<ScopeConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            ScopeConfig::from_path(path)
        }
        None => Ok(ScopeConfig::default()),
    }
}

fn run_demo(
    frames: u32,
    fps: f32,
    config: Option<&Path>,
    polar: bool,
) -> vectorscope_core::Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(VectorScopeError::msg(format!("fps must be positive, got {fps}")));
    }
    let mut config = load_config(config)?;
    if polar {
        config.mode = OperationalMode::Polar;
    }
    tracing::info!(frames, fps, mode = ?config.mode, "starting vectorscope demo");

    let stream = Arc::new(AudioStream::with_history_ms(
        2,
        SAMPLE_RATE,
        config.history_capacity_ms,
    )?);
    let running = Arc::new(AtomicBool::new(true));
    let audio = spawn_test_signal(stream.clone(), running.clone());

    let mut producer = RenderFrameProducer::new(StreamReader::new(stream), config)?;
    let mut backend = LoggingBackend::default();
    let mut clock = FrameClock::new();
    let frame_interval = Duration::from_secs_f32(1.0 / fps);

    let mut result = Ok(());
    for _ in 0..frames {
        if let Err(err) = producer.tick(&mut clock, &mut backend) {
            result = Err(err);
            break;
        }
        thread::sleep(frame_interval);
    }

    running.store(false, Ordering::Release);
    if audio.join().is_err() {
        tracing::warn!("test signal thread panicked");
    }

    let diagnostics = producer.diagnostics();
    tracing::info!(
        frames = diagnostics.frames_rendered,
        fps = diagnostics.fps,
        samples_per_second = diagnostics.samples_per_second,
        "demo finished"
    );
    result
}

fn run_dump(config: Option<&Path>, output: &Path) -> vectorscope_core::Result<()> {
    let config = load_config(config)?;
    tracing::info!(?output, mode = ?config.mode, "rendering a single frame");

    let stream = Arc::new(AudioStream::with_history_ms(
        2,
        SAMPLE_RATE,
        config.history_capacity_ms,
    )?);
    let mut signal = TestSignal::default();
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];
    let blocks = (SAMPLE_RATE as usize / 10) / BLOCK_SIZE;
    for _ in 0..blocks {
        signal.fill(&mut left, &mut right);
        stream.append_samples(&[left.as_slice(), right.as_slice()])?;
    }

    let mut producer = RenderFrameProducer::new(StreamReader::new(stream), config)?;
    let frame = producer.render_frame((blocks * BLOCK_SIZE) as f32 / SAMPLE_RATE)?;
    let json = serde_json::to_string_pretty(frame)?;
    std::fs::write(output, json)?;
    tracing::info!(vertices = frame.plot.len(), "frame written");
    Ok(())
}

fn write_default_config(output: &Path) -> vectorscope_core::Result<()> {
    std::fs::write(output, ScopeConfig::default().to_json_string()?)?;
    tracing::info!(?output, "default configuration written");
    Ok(())
}

/// Two detuned sines with a slowly drifting pan, for exercising both meters.
#[derive(Debug, Default)]
struct TestSignal {
    position: u64,
}

impl TestSignal {
    fn fill(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let t = self.position as f32 / SAMPLE_RATE;
            let pan = 0.5 + 0.5 * (t * 0.25 * std::f32::consts::TAU).sin();
            let tone = (t * 220.0 * std::f32::consts::TAU).sin();
            let detuned = (t * 221.5 * std::f32::consts::TAU).sin();
            *l = 0.6 * tone * (1.0 - pan);
            *r = 0.6 * detuned * pan;
            self.position += 1;
        }
    }
}

fn spawn_test_signal(stream: Arc<AudioStream>, running: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut signal = TestSignal::default();
        let mut left = vec![0.0; BLOCK_SIZE];
        let mut right = vec![0.0; BLOCK_SIZE];
        let block_time = Duration::from_secs_f32(BLOCK_SIZE as f32 / SAMPLE_RATE);
        while running.load(Ordering::Acquire) {
            signal.fill(&mut left, &mut right);
            if let Err(err) = stream.append_samples(&[left.as_slice(), right.as_slice()]) {
                tracing::error!(error = %err, "audio thread stopped");
                break;
            }
            thread::sleep(block_time);
        }
    })
}

#[derive(Debug, Default)]
struct LoggingBackend {
    submitted: u64,
}

impl RenderBackend for LoggingBackend {
    fn submit(&mut self, frame: &FrameOutput) -> vectorscope_core::Result<()> {
        self.submitted += 1;
        tracing::info!(
            frame = self.submitted,
            vertices = frame.plot.len(),
            gain = frame.gain,
            balance = frame.readout.balance_slow,
            phase = frame.readout.phase_slow,
            frozen = frame.frozen,
            "frame"
        );
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time stereo vectorscope", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render frames from a generated test signal and log them.
    Demo {
        /// Number of frames to render.
        #[arg(short, long, default_value_t = 120)]
        frames: u32,
        /// Target frame rate.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Force polar mode regardless of the configuration.
        #[arg(long)]
        polar: bool,
    },
    /// Render one frame of the test signal and write it as JSON.
    Dump {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write the default configuration as JSON.
    Config {
        #[arg(short, long)]
        output: PathBuf,
    },
}
