use clap::Parser;
use log::{error, info};
use rayon::ThreadPoolBuilder;
use regiontracks::bam::HtslibSource;
use regiontracks::config::Config;
use regiontracks::pipeline::{self, RunOptions};
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Plot annotation and paired-end alignment tracks for a genomic region.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON configuration describing region, annotation and alignments.
    #[clap(short = 'c', long, value_parser, default_value = "config.json")]
    config: PathBuf,

    /// Path of the rendered image.
    #[clap(short = 'o', long, value_parser, default_value = "plot.png")]
    output: PathBuf,

    /// Also write the preview rendering as SVG to this path.
    #[clap(long, value_parser)]
    preview: Option<PathBuf>,

    /// Number of threads for loading alignment files.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN))]
    threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Configure thread pool
    ThreadPoolBuilder::new()
        .num_threads(args.threads.into())
        .build_global()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {e}")))?;

    let config = Config::from_path(&args.config).inspect_err(|e| error!("{}", e))?;
    let options = RunOptions {
        output: args.output,
        preview: args.preview,
        parallel: args.threads.get() > 1,
    };

    let report = pipeline::run(&config, &options, &HtslibSource).inspect_err(|e| error!("{}", e))?;

    if !report.failures.is_empty() {
        // Always shown, independent of the log level
        eprintln!(
            "{} alignment file(s) could not be plotted:",
            report.failures.len()
        );
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.path.display(), failure.error);
        }
    }
    info!(
        "Plotted {} tracks to {}",
        report.tracks.len(),
        report.output.display()
    );

    Ok(())
}
