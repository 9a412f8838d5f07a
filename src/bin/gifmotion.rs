use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gifmotion", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an animated GIF to H.264 video (requires `ffmpeg` on PATH).
    Convert(ConvertArgs),
    /// Print canvas, delays and both timing plans as JSON.
    Inspect(InspectArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimingArg {
    /// One buffer per frame at accumulated timestamps.
    Direct,
    /// Frames repeated at a constant gcd(delays) rate.
    Gcd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ContainerArg {
    Mp4,
    Mov,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input GIF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,

    /// JSON file with conversion options; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Timing policy.
    #[arg(long, value_enum)]
    timing: Option<TimingArg>,

    /// Output time base in ticks per second (multiple of 100).
    #[arg(long)]
    timescale: Option<u32>,

    /// Target bitrate in bits per second.
    #[arg(long)]
    bitrate: Option<u32>,

    /// Scale the source canvas by an integer factor.
    #[arg(long, conflicts_with = "size")]
    scale: Option<u32>,

    /// Explicit output canvas, `WIDTHxHEIGHT`.
    #[arg(long)]
    size: Option<String>,

    /// Output container.
    #[arg(long, value_enum)]
    container: Option<ContainerArg>,

    /// Fail instead of overwriting an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    /// Abort on the first frame the encoder rejects.
    #[arg(long, default_value_t = false)]
    abort_on_reject: bool,

    /// Print the conversion report as JSON on stdout.
    #[arg(long, default_value_t = false)]
    report: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input GIF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Time base used for the plans.
    #[arg(long, default_value_t = 600)]
    timescale: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gifmotion={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_opts(args: &ConvertArgs) -> anyhow::Result<gifmotion::ConvertOpts> {
    let mut opts = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            serde_json::from_str::<gifmotion::ConvertOpts>(&text)
                .with_context(|| format!("parse config '{}'", path.display()))?
        }
        None => gifmotion::ConvertOpts::default(),
    };

    if let Some(timing) = args.timing {
        opts.timing = match timing {
            TimingArg::Direct => gifmotion::TimingPolicyKind::DirectAccumulation,
            TimingArg::Gcd => gifmotion::TimingPolicyKind::GcdExpansion,
        };
    }
    if let Some(ts) = args.timescale {
        opts.codec.timescale = gifmotion::Timescale::new(ts)?;
    }
    if let Some(bitrate) = args.bitrate {
        opts.codec.bitrate_bps = bitrate;
    }
    if let Some(factor) = args.scale {
        opts.canvas = gifmotion::CanvasSizing::Scaled(factor);
    }
    if let Some(size) = &args.size {
        let (w, h) = size
            .split_once(['x', 'X'])
            .context("--size must look like WIDTHxHEIGHT")?;
        opts.canvas = gifmotion::CanvasSizing::Fixed {
            width: w.trim().parse().context("--size width")?,
            height: h.trim().parse().context("--size height")?,
        };
    }
    if let Some(container) = args.container {
        opts.output.container = match container {
            ContainerArg::Mp4 => gifmotion::Container::Mp4,
            ContainerArg::Mov => gifmotion::Container::Mov,
        };
    }
    if args.no_overwrite {
        opts.output.overwrite = false;
    }
    if args.abort_on_reject {
        opts.reject_policy = gifmotion::RejectPolicy::Abort;
    }
    opts.validate()?;
    Ok(opts)
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let opts = load_opts(&args)?;
    let report =
        gifmotion::convert_gif_file(&args.in_path, &args.out, &opts).map_err(|err| {
            let hint = odd_canvas_hint(&err);
            let err =
                anyhow::Error::new(err).context(format!("convert '{}'", args.in_path.display()));
            match hint {
                Some(hint) => err.context(hint),
                None => err,
            }
        })?;

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !report.issues.is_empty() {
        eprintln!(
            "{} frame(s) dropped, {} rejected",
            report.dropped, report.rejected
        );
    }
    eprintln!(
        "wrote {} ({} frames, {:.2}s)",
        args.out.display(),
        report.frames_read,
        report.total_duration.as_secs_f64()
    );
    Ok(())
}

/// yuv420p needs even dimensions, which many GIFs do not have.
fn odd_canvas_hint(err: &gifmotion::GifMotionError) -> Option<&'static str> {
    match err {
        gifmotion::GifMotionError::Configuration(msg) if msg.contains("even dimensions") => Some(
            "the output canvas has odd dimensions; rerun with `--scale 2` or `--size WIDTHxHEIGHT` \
             using even values",
        ),
        _ => None,
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let timescale = gifmotion::Timescale::new(args.timescale)?;
    let asset = gifmotion::GifAsset::new(&args.in_path);
    let inspection = gifmotion::inspect(&asset, timescale)
        .with_context(|| format!("inspect '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}
