use bubble_pond::audio::{AudioEngine, LogAudioEngine};
use bubble_pond::events::event_channel;
use bubble_pond::orchestra::Orchestra;
use bubble_pond::pond::PondConfig;
use bubble_pond::score::Score;
use bubble_pond::simulator::{self, SimCommand, Simulator};
use bubble_pond::themes::{self, ThemeCatalog};
use bubble_pond::types::*;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

#[derive(Parser)]
#[command(name = "bubble-pond")]
#[command(about = "Generative bubble pond: bubbles arrive, drift, collide and depart to a score")]
struct Cli {
    /// Score file (.bpscore JSON). Overrides --theme.
    #[arg(long)]
    score: Option<PathBuf>,

    /// Theme to play, by name (bundled or from --themes-dir)
    #[arg(long)]
    theme: Option<String>,

    /// Directory of additional .bpscore themes
    #[arg(long)]
    themes_dir: Option<PathBuf>,

    /// List the available themes and exit
    #[arg(long)]
    list_themes: bool,

    /// Print the selected score as pretty JSON and exit
    #[arg(long)]
    print_score: bool,

    /// Random seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Surface width
    #[arg(long, default_value_t = 1024.0)]
    width: f32,

    /// Surface height
    #[arg(long, default_value_t = 768.0)]
    height: f32,

    /// Ticks per second
    #[arg(long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Stop after this many seconds (runs until killed if omitted)
    #[arg(long)]
    seconds: Option<u64>,

    /// Scripted gesture sequence to play first: "basic"
    #[arg(long)]
    demo: Option<String>,

    /// Send audio to an external synth over OSC instead of logging it
    #[arg(long)]
    osc: bool,

    /// OSC target address
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Soundcheck a note pool on start: arrival, departure, bells or rhodes
    #[arg(long)]
    soundcheck: Option<String>,
}

fn fatal(msg: impl std::fmt::Display) -> ! {
    error!("{}", msg);
    process::exit(1);
}

fn audio_engine(cli: &Cli) -> Box<dyn AudioEngine> {
    if cli.osc {
        #[cfg(feature = "osc")]
        return Box::new(bubble_pond::audio::OscAudioEngine::new(cli.osc_target.clone()));
        #[cfg(not(feature = "osc"))]
        warn!("OSC output requires the 'osc' feature. Logging audio instead.");
    }
    Box::new(LogAudioEngine::new())
}

fn select_score(cli: &Cli, catalog: &ThemeCatalog) -> Score {
    if let Some(path) = &cli.score {
        return themes::load_file(path).unwrap_or_else(|e| fatal(e));
    }
    match &cli.theme {
        Some(name) => catalog.get(name).cloned().unwrap_or_else(|e| fatal(e)),
        None => catalog
            .default_score()
            .cloned()
            .unwrap_or_else(|| fatal("No themes available")),
    }
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();

    let mut catalog = ThemeCatalog::bundled();
    if let Some(dir) = &cli.themes_dir {
        match ThemeCatalog::load_dir(dir) {
            Ok(extra) => catalog.merge(extra),
            Err(e) => fatal(format!("Cannot read themes from {}: {}", dir.display(), e)),
        }
    }

    if cli.list_themes {
        for name in catalog.names() {
            println!("{}", name);
        }
        return;
    }

    let score = select_score(&cli, &catalog);
    if cli.print_score {
        match score.to_json_pretty() {
            Ok(text) => println!("{}", text),
            Err(e) => fatal(e),
        }
        return;
    }

    let soundcheck = cli.soundcheck.as_deref().map(|name| {
        SoundSource::from_str(name)
            .unwrap_or_else(|| fatal(format!("Unknown soundcheck source {:?}", name)))
    });
    let demo = cli.demo.as_deref().map(|name| {
        simulator::demo_sequence(name).unwrap_or_else(|| {
            fatal(format!(
                "Unknown demo {:?} (available: {})",
                name,
                simulator::DEMOS.join(", ")
            ))
        })
    });

    let seed = cli.seed.unwrap_or_else(rand::random);
    let bounds = SurfaceBounds::new(cli.width, cli.height);
    let config = PondConfig {
        tick_rate: cli.tick_rate.max(1),
        ..PondConfig::new(bounds)
    };
    let engine = audio_engine(&cli);
    let score = Arc::new(score);

    info!("═══════════════════════════════════════════════");
    info!("  BUBBLE POND v{}", env!("CARGO_PKG_VERSION"));
    info!("  Score: {} ({} bpm)", score.name, score.tempo);
    info!("  Surface: {} at {} ticks/s", bounds, config.tick_rate);
    info!("  Audio: {}", if cli.osc { cli.osc_target.as_str() } else { "log" });
    info!("  Seed: {}", seed);
    info!("═══════════════════════════════════════════════");

    // Channels: pond → orchestra, signals → orchestra, commands → simulator
    let (publisher, event_rx) = event_channel(4096);
    let (signal_tx, signal_rx) = bounded::<AudioSignal>(16);
    let (cmd_tx, cmd_rx) = unbounded::<SimCommand>();

    // ─── Orchestra ──────────────────────────────────────────────────
    let clock = SessionClock::new();
    let orch_score = Arc::clone(&score);
    let orchestra = thread::Builder::new()
        .name("orchestra".into())
        .spawn(move || {
            let mut orchestra = Orchestra::new(orch_score, engine, event_rx, seed.wrapping_add(1));
            orchestra.run(&clock, Some(signal_rx));
        })
        .unwrap_or_else(|e| fatal(format!("Cannot start orchestra thread: {}", e)));

    // ─── Simulator (main thread) ────────────────────────────────────
    if let Some(source) = soundcheck {
        let _ = cmd_tx.send(SimCommand::Soundcheck(source));
    }
    let mut sim = Simulator::new(score, config, publisher, cmd_rx, seed)
        .with_signals(signal_tx)
        .with_themes(catalog);

    let mut running = true;
    if let Some(gestures) = demo {
        running = sim.run_demo(&gestures);
    }
    if running {
        let max_ticks = cli.seconds.map(|s| s * config.tick_rate as u64);
        match max_ticks {
            Some(n) => info!("Running for {} ticks", n),
            None => info!("Running headless. Press Ctrl+C to stop."),
        }
        sim.run(max_ticks);
    }

    info!(
        "Pond stopped after {} ticks with {} bubbles live",
        sim.ticks(),
        sim.pond().live_count()
    );
    drop(sim);
    drop(cmd_tx);
    if orchestra.join().is_err() {
        warn!("Orchestra thread panicked");
    }
}
