use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use murmur::cluster::{cluster, LinkEngine};
use murmur::config::Config;
use murmur::db::Database;
use murmur::kernel::DistanceKernel;
use murmur::output;
use murmur::variant::SequenceIndex;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Murmur - single-linkage clustering of amplicons by bounded edit distance", long_about = None)]
#[command(version)]
struct Cli {
    /// Input FASTA file; '-' or nothing reads stdin
    #[arg(value_name = "FASTA")]
    input: Option<PathBuf>,

    /// Maximum number of differences between linked amplicons
    #[arg(short = 'd', long, value_name = "INT", default_value_t = 1)]
    differences: u32,

    /// Output result filename (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short = 't', long, value_name = "INT", default_value_t = 1)]
    threads: usize,

    /// Reward for a nucleotide match
    #[arg(short = 'm', long, value_name = "INT", default_value_t = 5)]
    match_reward: i64,

    /// Penalty for a nucleotide mismatch
    #[arg(short = 'p', long, value_name = "INT", default_value_t = 4)]
    mismatch_penalty: i64,

    /// Gap opening penalty
    #[arg(short = 'g', long, value_name = "INT", default_value_t = 12)]
    gap_opening_penalty: i64,

    /// Gap extension penalty
    #[arg(short = 'e', long, value_name = "INT", default_value_t = 4)]
    gap_extension_penalty: i64,

    /// Dump swarm statistics to file
    #[arg(short = 's', long, value_name = "FILE")]
    statistics_file: Option<PathBuf>,

    /// Output in UCLUST-like format to file
    #[arg(short = 'u', long, value_name = "FILE")]
    uclust_file: Option<PathBuf>,

    /// Report the internal links of each swarm
    #[arg(short = 'b', long)]
    break_swarms: bool,

    /// Output in mothur list file format
    #[arg(short = 'r', long)]
    mothur: bool,

    /// Use the variant-enumeration algorithm for d = 1
    #[arg(short = 'a', long)]
    alternative_algorithm: bool,

    /// Abundance annotated in usearch style (;size=N)
    #[arg(short = 'z', long)]
    usearch_abundance: bool,

    /// Write internal swarm structure to file (implies -b)
    #[arg(short = 'i', long, value_name = "FILE")]
    internal_structure: Option<PathBuf>,

    /// Log to file instead of stderr
    #[arg(short = 'l', long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Never link amplicons more abundant than their parent
    #[arg(short = 'n', long)]
    no_valley: bool,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false);
    if let Some(path) = &cli.log {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Unable to open log file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }
    builder.init();

    let config = Config {
        resolution: cli.differences,
        threads: cli.threads,
        match_reward: cli.match_reward,
        mismatch_penalty: cli.mismatch_penalty,
        gap_opening_penalty: cli.gap_opening_penalty,
        gap_extension_penalty: cli.gap_extension_penalty,
        no_valley: cli.no_valley,
        break_swarms: cli.break_swarms || cli.internal_structure.is_some(),
        mothur: cli.mothur,
        usearch_abundance: cli.usearch_abundance,
        alternative_algorithm: cli.alternative_algorithm,
        input_file: cli.input,
        output_file: cli.output_file,
        statistics_file: cli.statistics_file,
        uclust_file: cli.uclust_file,
        internal_structure_file: cli.internal_structure,
        log_file: cli.log,
    };

    if let Err(e) = config.validate() {
        log::error!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build_global()
    {
        log::warn!(
            "Failed to configure thread pool: {} (may already be initialized)",
            e
        );
    }

    if let Err(e) = run(&config) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let start = Instant::now();
    let costs = config.costs()?;

    let shown = |p: &Option<PathBuf>, fallback: &str| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| fallback.to_string())
    };
    log::info!("murmur {}", env!("CARGO_PKG_VERSION"));
    log::info!("Database file:     {}", shown(&config.input_file, "(stdin)"));
    log::info!("Output file:       {}", shown(&config.output_file, "(stdout)"));
    if let Some(p) = &config.statistics_file {
        log::info!("Statistics file:   {}", p.display());
    }
    if let Some(p) = &config.uclust_file {
        log::info!("Uclust file:       {}", p.display());
    }
    log::info!("Resolution (d):    {}", config.resolution);
    log::info!("Threads:           {}", config.threads);
    log::info!(
        "Algorithm:         {}",
        if config.use_unit_engine() {
            "variant enumeration"
        } else {
            "alignment kernel"
        }
    );
    log::info!(
        "Scores:            match: {}, mismatch: {}",
        config.match_reward,
        -config.mismatch_penalty
    );
    log::info!(
        "Gap penalties:     opening: {}, extension: {}",
        config.gap_opening_penalty,
        config.gap_extension_penalty
    );
    log::info!(
        "Converted costs:   mismatch: {}, gap opening: {}, gap extension: {}",
        costs.mismatch,
        costs.gap_open,
        costs.gap_extend
    );

    // A bad output path must fail the run before clustering starts.
    let mut out = output::create(config.output_file.as_deref())?;
    let mut stats_out = match config.statistics_file.as_deref() {
        Some(p) => Some(output::create(Some(p))?),
        None => None,
    };
    let mut uclust_out = match config.uclust_file.as_deref() {
        Some(p) => Some(output::create(Some(p))?),
        None => None,
    };
    let mut structure_out = if config.break_swarms {
        Some(output::create_or_stderr(
            config.internal_structure_file.as_deref(),
        )?)
    } else {
        None
    };

    let db = Database::from_path(config.input_file.as_deref(), config.abundance_style())?;
    log::info!(
        "Database info:     {} nt in {} sequences, longest {} nt",
        db.nucleotides(),
        db.len(),
        db.longest()
    );

    let engine = if config.use_unit_engine() {
        LinkEngine::Unit(SequenceIndex::build(&db))
    } else {
        let kernel = DistanceKernel::new(costs, config.resolution)?;
        log::debug!(
            "Kernel lanes:      {} x {}-bit",
            kernel.width().lanes(),
            kernel.width().bits()
        );
        LinkEngine::Lanes(kernel)
    };

    let swarms = cluster(&db, &engine, config.no_valley);

    log::info!("Number of swarms:  {}", swarms.len());
    log::info!(
        "Largest swarm:     {}",
        swarms.iter().map(|s| s.size()).max().unwrap_or(0)
    );
    log::info!("Elapsed:           {:.2}s", start.elapsed().as_secs_f64());

    if config.mothur {
        output::write_mothur(&mut *out, &db, &swarms, config.resolution)?;
    } else {
        output::write_plain(&mut *out, &db, &swarms)?;
    }
    out.flush()?;

    if let Some(stats) = &mut stats_out {
        output::write_statistics(&mut **stats, &db, &swarms)?;
        stats.flush()?;
    }
    if let Some(uc) = &mut uclust_out {
        output::write_uclust(&mut **uc, &db, &swarms, &costs)?;
        uc.flush()?;
    }
    if let Some(structure) = &mut structure_out {
        output::write_structure(&mut **structure, &db, &swarms)?;
        structure.flush()?;
    }

    Ok(())
}
