//! Summarize an xtc trajectory, frame by frame.
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gmxtraj::geometry::get_surf_area;
use gmxtraj::{FrameRange, Index, Trajectory};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Load an xtc trajectory and print the time, step and box volume of the selected frames.
///
/// With `--radius`, the Monte-Carlo surface area of a group (or of all atoms) is printed as a
/// fourth column.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Input path (xtc).
    input: PathBuf,

    /// Index file (ndx) defining atom groups.
    #[arg(short = 'n', long)]
    index: Option<PathBuf>,

    /// Frame selection in the format `begin:end:stride`. Each of these values is optional.
    ///
    /// - `:100` will select the first 100 frames.
    ///
    /// - `3:14` will select the frames with indices 3 up to and including 13, 11 frames in total.
    ///
    /// - `:100:2` will select every second frame from the first 100 frames, 50 in total.
    #[arg(short, long)]
    frames: Option<FrameRange>,

    /// Group whose atoms are used as surface sites. Requires an index file.
    #[arg(short, long, requires = "index")]
    group: Option<String>,

    /// Probe radius (nm) for the surface area estimate.
    #[arg(short, long)]
    radius: Option<f32>,

    /// Number of random points generated around each site.
    #[arg(long, default_value_t = 100)]
    samples: usize,

    /// Seed for the random number generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all logging.
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbosity: u8, quiet: bool) {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = Trajectory::options();
    if let Some(range) = args.frames {
        options.range(range);
    }
    if let Some(path) = &args.index {
        options.index(Index::from_path(path)?);
    }
    let traj = options.open(&args.input)?;
    debug!(
        nframes = traj.nframes(),
        natoms = traj.natoms(),
        "loaded trajectory"
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut out = BufWriter::new(std::io::stdout().lock());
    for frame in 0..traj.nframes() {
        write!(
            out,
            "{:.3}\t{}\t{:.4}",
            traj.time(frame)?,
            traj.step(frame)?,
            traj.box_volume(frame)?
        )?;

        if let Some(radius) = args.radius {
            let sites = match &args.group {
                Some(group) => traj.group_positions(frame, group)?,
                None => traj.positions(frame)?.to_vec(),
            };
            let boxvec = traj.boxvec(frame)?;
            let area = get_surf_area(&mut rng, &sites, radius, args.samples, &boxvec);
            write!(out, "\t{area:.4}")?;
        }

        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}
