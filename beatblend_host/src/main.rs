//! beatblend - blend four drum patterns on a pad, listen, export WAV.
//!
//! # Commands
//!
//! - `beatblend presets` - list the built-in patterns
//! - `beatblend blend` - print the pattern at a pad position
//! - `beatblend play` - monitor the blended pattern on the output device
//! - `beatblend render` - render the blended pattern to a WAV file
//! - `beatblend config` - write the effective config as JSON

mod project_io;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use beatblend_engine::{BlendEngine, GridModel, HybridRenderer, LiveEngine, PatternStore, RenderRequest};
use beatblend_shared::{presets, BlendPosition, Corner, EngineConfig, Pattern};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beatblend")]
#[command(about = "Blend drum patterns and render them to WAV")]
#[command(version)]
struct Cli {
    /// JSON config file; defaults apply to anything it leaves out
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the paced headless output instead of the audio device
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in patterns
    Presets,

    /// Print the pattern at a pad position
    Blend(BlendArgs),

    /// Play the blended pattern on the output device
    Play(PlayArgs),

    /// Render the blended pattern to a WAV file
    Render(RenderArgs),

    /// Write the effective config to a file
    Config {
        /// Destination JSON file
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelChoice {
    /// Reference latent model
    Grid,
    /// Local threshold blend only
    Local,
}

#[derive(Args)]
struct BlendArgs {
    /// Horizontal pad position, 0 = A/C side
    #[arg(short, long, default_value_t = 0.2)]
    x: f64,

    /// Vertical pad position, 0 = A/B side
    #[arg(short, long, default_value_t = 0.3)]
    y: f64,

    /// Replace a corner, e.g. `--corner B=Backbeat`
    #[arg(long = "corner", value_parser = parse_corner)]
    corners: Vec<(Corner, Pattern)>,

    #[arg(long, value_enum, default_value_t = ModelChoice::Grid)]
    model: ModelChoice,
}

#[derive(Args)]
struct PlayArgs {
    #[command(flatten)]
    blend: BlendArgs,

    /// Tempo; the config session tempo otherwise
    #[arg(long)]
    bpm: Option<f64>,

    /// How long to listen
    #[arg(long, default_value_t = 8.0)]
    seconds: f64,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    blend: BlendArgs,

    #[arg(long)]
    bpm: Option<f64>,

    #[arg(long)]
    bars: Option<u32>,

    /// Output file or directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Also print the WAV as a base64 data URL
    #[arg(long)]
    data_url: bool,
}

fn parse_corner(s: &str) -> Result<(Corner, Pattern), String> {
    let (corner, name) = s.split_once('=').ok_or_else(|| format!("expected CORNER=PRESET, got '{s}'"))?;
    let corner = Corner::parse(corner.trim()).ok_or_else(|| format!("unknown corner '{corner}'"))?;
    let pattern = presets::preset(name.trim()).ok_or_else(|| format!("unknown preset '{name}'"))?;
    Ok((corner, pattern))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = project_io::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Presets => {
            for name in presets::preset_names() {
                if let Some(pattern) = presets::preset(name) {
                    println!("{name}\n{pattern}");
                }
            }
            Ok(())
        }
        Commands::Blend(args) => {
            let engine = blend(&config, &args)?;
            print_blend(&engine);
            Ok(())
        }
        Commands::Play(args) => play(&config, &args, cli.headless),
        Commands::Render(args) => render(&config, &args, cli.headless),
        Commands::Config { out } => project_io::save_config(&config, &out),
    }
}

/// Builds a blend engine over the session corners and settles it at the requested position.
fn blend(config: &EngineConfig, args: &BlendArgs) -> Result<BlendEngine> {
    let corners = config.session.corner_set()?;
    let store = PatternStore::new(corners, presets::default_pattern());
    let mut engine = match args.model {
        ModelChoice::Grid if config.blend.model_assisted => {
            BlendEngine::with_model(store, config.blend.clone(), Arc::new(GridModel::default()))?
        }
        _ => BlendEngine::new(store, config.blend.clone()),
    };
    let idle = Duration::from_millis(config.blend.debounce_ms * 2 + 500);
    settle(&mut engine, idle);

    for (corner, pattern) in &args.corners {
        engine.set_corner(*corner, *pattern);
    }
    settle(&mut engine, idle);

    engine.set_position(BlendPosition::new(args.x, args.y));
    settle(&mut engine, idle);
    Ok(engine)
}

/// Handles worker events until none arrives for `idle`.
fn settle(engine: &mut BlendEngine, idle: Duration) {
    while engine.pump(idle) {}
}

fn print_blend(engine: &BlendEngine) {
    let pos = engine.position();
    let w = engine.weights();
    println!(
        "position ({:.2}, {:.2})  weights A {:.2} B {:.2} C {:.2} D {:.2}  model {:?}{}",
        pos.x(),
        pos.y(),
        w.get(Corner::A),
        w.get(Corner::B),
        w.get(Corner::C),
        w.get(Corner::D),
        engine.model_state(),
        if engine.uses_model() { "" } else { " (local blend)" },
    );
    print!("{}", engine.blended());
}

fn open_live(config: &EngineConfig, headless: bool) -> Result<LiveEngine> {
    let delay = Duration::from_millis(config.render.start_delay_ms);
    if headless {
        return Ok(LiveEngine::headless(&config.audio, delay)?);
    }
    match LiveEngine::with_default_device(&config.audio, delay) {
        Ok(live) => Ok(live),
        Err(e) => {
            warn!(error = %e, "no usable audio device, falling back to headless output");
            Ok(LiveEngine::headless(&config.audio, delay)?)
        }
    }
}

fn play(config: &EngineConfig, args: &PlayArgs, headless: bool) -> Result<()> {
    if !(args.seconds.is_finite() && args.seconds > 0.0) {
        bail!("--seconds must be positive");
    }
    let engine = blend(config, &args.blend)?;
    print_blend(&engine);
    let bpm = args.bpm.unwrap_or(config.session.bpm);

    let live = open_live(config, headless)?;
    live.play(engine.shared_blended(), bpm, None)?;
    info!(bpm, seconds = args.seconds, "monitoring");

    let until = Instant::now() + Duration::from_secs_f64(args.seconds);
    let mut last = None;
    while Instant::now() < until {
        let step = live.current_step();
        if step != last {
            if let Some(step) = step {
                tracing::trace!(step, "playhead");
            }
            last = step;
        }
        thread::sleep(Duration::from_millis(10));
    }
    live.stop();
    Ok(())
}

fn render(config: &EngineConfig, args: &RenderArgs, headless: bool) -> Result<()> {
    let engine = blend(config, &args.blend)?;
    print_blend(&engine);
    let bpm = args.bpm.unwrap_or(config.session.bpm);
    let bars = args.bars.unwrap_or(config.session.bars);
    let request = RenderRequest::new(engine.blended(), bpm, bars)?;

    let mut live = open_live(config, headless)?;
    let mut renderer = HybridRenderer::new(config);
    let result = renderer.render(&request, &mut live).context("rendering pattern")?;

    let path = project_io::write_render(&result, &args.out, &request.filename())?;
    println!("{} ({}, {:.2}s)", path.display(), result.provenance.as_str(), result.buffer.duration_secs());
    if args.data_url {
        println!("{}", result.data_url());
    }
    Ok(())
}
