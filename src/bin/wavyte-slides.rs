use std::io::BufRead as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use wavyte_slides::assemble::media::{DEFAULT_MAX_SEGMENT_DURATION, is_tool_on_path};
use wavyte_slides::config::keys::key_code_from_name;
use wavyte_slides::config::{DEFAULT_CONFIG_PATH, DEFAULT_FOLDER_PATH};
use wavyte_slides::slides::model::{list_presentation_configs, scene_name};
use wavyte_slides::{
    AssembleOpts, Assembler, Config, DisplaySink, FfmpegClipOpener, FfmpegRecorder,
    FfmpegRecorderOpts, FfmpegTools, NullDisplay, Player, PlayerOpts, Presentation,
    PresentationConfig, Recorder, ReverseOpts, RunOutcome, SceneManifest, SlidesError,
};

#[derive(Parser, Debug)]
#[command(name = "wavyte-slides", version, about = "Present rendered scenes as slides")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play one or more scenes.
    Present(PresentArgs),
    /// List the scenes available in the slides folder.
    ListScenes(FolderArg),
    /// Build slides from a recorded scene manifest (requires `ffmpeg` on PATH).
    Assemble(AssembleArgs),
    /// Write the default keybinding configuration.
    Init(InitArgs),
    /// Report external tool availability.
    Checkhealth,
}

#[derive(Parser, Debug)]
struct FolderArg {
    /// Slides folder.
    #[arg(long, default_value = DEFAULT_FOLDER_PATH)]
    folder: PathBuf,
}

#[derive(Parser, Debug)]
struct PresentArgs {
    /// Scene names; all valid scenes in the folder when empty.
    scenes: Vec<String>,

    #[command(flatten)]
    folder: FolderArg,

    /// Keybinding configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long)]
    start_paused: bool,

    #[arg(long)]
    full_screen: bool,

    /// Play every slide without input, then exit.
    #[arg(long)]
    skip_all: bool,

    #[arg(long)]
    exit_after_last_slide: bool,

    #[arg(long)]
    hide_mouse: bool,

    /// Start scene index (negative counts from the end).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    start_at_scene_number: isize,

    /// Start slide index (negative counts from the end).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    start_at_slide_number: isize,

    /// Screen to present on.
    #[arg(long)]
    screen: Option<usize>,

    /// Global playback rate multiplier.
    #[arg(long, default_value_t = 1.0)]
    playback_rate: f64,

    /// Next on a loop finishes the current iteration instead of jumping.
    #[arg(long)]
    next_terminates_loop: bool,

    /// Also record the presentation to this MP4 file.
    #[arg(long)]
    record: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    /// Scene manifest JSON written by the renderer.
    manifest: PathBuf,

    #[command(flatten)]
    folder: FolderArg,

    /// Redo every merge and reversal.
    #[arg(long)]
    no_cache: bool,

    /// Use the forward clip for reversed playback.
    #[arg(long)]
    skip_reversing: bool,

    /// Clips longer than this (seconds) are reversed in parallel segments.
    #[arg(long, default_value_t = DEFAULT_MAX_SEGMENT_DURATION)]
    max_segment_duration: f64,

    /// Always reverse in a single pass.
    #[arg(long, conflicts_with = "max_segment_duration")]
    single_pass: bool,

    /// Worker threads for segment reversal.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct InitArgs {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Present(args) => cmd_present(args),
        Command::ListScenes(args) => cmd_list_scenes(args),
        Command::Assemble(args) => cmd_assemble(args),
        Command::Init(args) => cmd_init(args),
        Command::Checkhealth => cmd_checkhealth(),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_list_scenes(args: FolderArg) -> anyhow::Result<()> {
    for path in list_presentation_configs(&args.folder)? {
        if let Some(name) = scene_name(&path) {
            println!("{name}");
        }
    }
    Ok(())
}

fn load_presentations(folder: &Path, scenes: &[String]) -> anyhow::Result<Vec<Presentation>> {
    let paths: Vec<PathBuf> = if scenes.is_empty() {
        list_presentation_configs(folder)?
    } else {
        scenes
            .iter()
            .map(|s| folder.join(format!("{s}.json")))
            .collect()
    };
    if paths.is_empty() {
        anyhow::bail!(
            "no presentation found in '{}'; assemble a scene first",
            folder.display()
        );
    }

    let opener = Arc::new(FfmpegClipOpener);
    let mut presentations = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = scene_name(path).unwrap_or_default();
        if !path.is_file() {
            anyhow::bail!("scene '{name}' not found in '{}'", folder.display());
        }
        match PresentationConfig::from_file(path) {
            Ok(cfg) => presentations.push(Presentation::new(name, cfg, opener.clone())?),
            Err(e @ SlidesError::MissingAnimationFile { .. }) => {
                tracing::error!("skipping scene '{name}': {e}");
            }
            Err(e) => return Err(e).with_context(|| format!("load scene '{name}'")),
        }
    }
    if presentations.is_empty() {
        anyhow::bail!("none of the requested scenes could be loaded");
    }
    Ok(presentations)
}

fn cmd_present(args: PresentArgs) -> anyhow::Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let presentations = load_presentations(&args.folder.folder, &args.scenes)?;

    if let Some(screen) = args.screen {
        tracing::debug!("screen {screen} requested; frames are not shown in a window");
    }

    let mut display: Box<dyn DisplaySink> = Box::new(NullDisplay::new());
    if let Some(out) = &args.record {
        let opts = FfmpegRecorderOpts::for_presentation(out, presentations[0].config());
        display = Box::new(FfmpegRecorder::new(opts, display)?);
    }
    if args.full_screen {
        display.toggle_full_screen();
    }
    if args.hide_mouse {
        display.toggle_mouse();
    }

    let opts = PlayerOpts {
        start_paused: args.start_paused,
        skip_all: args.skip_all,
        exit_after_last: args.exit_after_last_slide || args.skip_all,
        playback_rate: args.playback_rate,
        next_terminates_loop: args.next_terminates_loop,
        start_at_scene_number: args.start_at_scene_number,
        start_at_slide_number: args.start_at_slide_number,
        realtime: true,
    };
    let mut player = Player::new(presentations, &config.keys, display, opts)?;

    let relay = player.relay();
    let stop = player.stop_handle();
    std::thread::Builder::new()
        .name("wavyte-slides-keys".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match key_code_from_name(&line) {
                    Some(code) => relay.put(code),
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!("unknown key '{}'", line.trim()),
                }
                if stop.is_stopped() {
                    break;
                }
            }
        })
        .context("spawn key event thread")?;

    match player.run() {
        RunOutcome::Failed(msg) => anyhow::bail!("presentation failed: {msg}"),
        outcome => {
            tracing::debug!("presentation ended: {outcome:?}");
            Ok(())
        }
    }
}

fn cmd_assemble(args: AssembleArgs) -> anyhow::Result<()> {
    let manifest = SceneManifest::from_file(&args.manifest)?;
    let descriptors = Recorder::replay(&manifest.events)?;

    let tools = FfmpegTools::new(ReverseOpts {
        max_segment_duration: (!args.single_pass).then_some(args.max_segment_duration),
        threads: args.threads,
    })?;
    let assembler = Assembler::new(
        tools,
        AssembleOpts {
            folder: args.folder.folder,
            use_cache: !args.no_cache,
            skip_reversing: args.skip_reversing,
        },
    );
    let report = assembler.assemble(&descriptors, &manifest)?;

    if !report.is_complete() {
        for failure in &report.failures {
            eprintln!("slide {}: {}", failure.number, failure.error);
        }
        anyhow::bail!(
            "{} slide(s) of '{}' failed; '{}' lists the others",
            report.failures.len(),
            manifest.scene,
            report.config_path.display()
        );
    }
    println!("{}", report.config_path.display());
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    if args.config.exists() && !args.force {
        anyhow::bail!(
            "'{}' already exists; pass --force to overwrite it",
            args.config.display()
        );
    }
    Config::default().to_file(&args.config)?;
    println!("wrote {}", args.config.display());
    Ok(())
}

fn cmd_checkhealth() -> anyhow::Result<()> {
    println!("wavyte-slides {}", env!("CARGO_PKG_VERSION"));
    for tool in ["ffmpeg", "ffprobe"] {
        let status = if is_tool_on_path(tool) {
            "found"
        } else {
            "missing"
        };
        println!("{tool}: {status}");
    }
    Ok(())
}
