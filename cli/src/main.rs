use std::{
    fs::File,
    io::{self, BufWriter},
    path::PathBuf,
};

use anyhow::{anyhow, Result};
use cache_sim::{
    cache::{WriteAccounting, WritePolicy},
    config::{SweepConfig, SweepTarget},
    metrics::MissRateCombine,
    report, sweep, trace,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[cfg(feature = "stat")]
use cache_sim::stat::{AddStats, Stats};
#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// sweep split L1 instruction/data caches
    L1(L1Args),
    /// sweep the shared L2 behind fixed L1 caches
    L2(L2Args),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Wt,
    Wb,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Accounting {
    Lookup,
    AlwaysMiss,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Combine {
    Mean,
    Pooled,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// File path to the trace (`<op> <hex-address>` per line)
    #[arg(short, long)]
    trace: PathBuf,
    /// File path to a JSON sweep configuration; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// File path to the CSV report (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write policy of every level
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// How data writes are credited in the statistics
    #[arg(long, value_enum)]
    accounting: Option<Accounting>,
    /// How L1 miss rates are merged for the hierarchical AMAT
    #[arg(long, value_enum)]
    combine: Option<Combine>,
    /// Associativities to sweep
    #[arg(long, value_delimiter = ',')]
    assoc: Vec<u64>,
    /// Block sizes in bytes to sweep
    #[arg(long, value_delimiter = ',')]
    block_size: Vec<u64>,
    /// L1 size in bytes
    #[arg(long)]
    size: Option<u64>,
    /// Hit time (H1) in cycles
    #[arg(long)]
    hit_time: Option<f64>,
    /// L2 hit time (H2) in cycles
    #[arg(long)]
    l2_hit_time: Option<f64>,
    /// Miss penalty (M) in cycles
    #[arg(long)]
    miss_penalty: Option<f64>,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct L1Args {
    #[command(flatten)]
    delegate: CommonArgs,
}

#[derive(Args, Debug)]
struct L2Args {
    #[command(flatten)]
    delegate: CommonArgs,
    /// L2 size in bytes
    #[arg(long)]
    l2_size: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let (delegate, target, l2_size) = match args.command {
        Command::L1(L1Args { delegate }) => (delegate, SweepTarget::L1, None),
        Command::L2(L2Args { delegate, l2_size }) => (delegate, SweepTarget::L2, l2_size),
    };
    if delegate.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let mut config = read_config(delegate.config.as_ref(), target)?;
    apply_args(&mut config, &delegate, l2_size)?;
    let trace = trace::read(&delegate.trace)?;
    let outcomes = sweep::run(&config, &trace)?;
    log::info!("finished sweep. # of points: {}", outcomes.len());
    output_stat(&outcomes);
    let records = sweep::records(&outcomes);
    if records.is_empty() {
        return Err(anyhow!("no sweep point has a valid geometry"));
    }
    match delegate.output {
        Some(path) => {
            report::write_csv(BufWriter::new(File::create(&path)?), &records)?;
            log::info!("results have been written to {}", path.display());
        }
        None => report::write_csv(io::stdout().lock(), &records)?,
    }
    Ok(())
}

fn read_config(path: Option<&PathBuf>, target: SweepTarget) -> Result<SweepConfig> {
    let mut config = match path {
        Some(p) => SweepConfig::deser(File::open(p)?)?,
        None => match target {
            SweepTarget::L1 => SweepConfig::l1_default(),
            SweepTarget::L2 => SweepConfig::l2_default(),
        },
    };
    config.sweep.target = target;
    config.validate()?;
    Ok(config)
}

fn apply_args(config: &mut SweepConfig, args: &CommonArgs, l2_size: Option<u64>) -> Result<()> {
    if let Some(policy) = args.policy {
        config.policy = match policy {
            Policy::Wt => WritePolicy::WriteThrough,
            Policy::Wb => WritePolicy::WriteBack,
        };
    }
    if let Some(accounting) = args.accounting {
        config.accounting = match accounting {
            Accounting::Lookup => WriteAccounting::Lookup,
            Accounting::AlwaysMiss => WriteAccounting::AlwaysMiss,
        };
    }
    if let Some(combine) = args.combine {
        config.combine = match combine {
            Combine::Mean => MissRateCombine::Mean,
            Combine::Pooled => MissRateCombine::Pooled,
        };
    }
    if !args.assoc.is_empty() {
        config.sweep.associativities = args.assoc.clone();
    }
    if !args.block_size.is_empty() {
        config.sweep.block_sizes = args.block_size.clone();
    }
    if let Some(size) = args.size {
        config.l1.size = size;
    }
    if let Some(size) = l2_size {
        let l2 = config
            .l2
            .as_mut()
            .ok_or_else(|| anyhow!("--l2-size given without an L2 level"))?;
        l2.size = size;
    }
    if let Some(h) = args.hit_time {
        config.latency.hit_time = h;
    }
    if let Some(h) = args.l2_hit_time {
        config.latency.l2_hit_time = h;
    }
    if let Some(m) = args.miss_penalty {
        config.latency.miss_penalty = m;
    }
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &[sweep::SweepOutcome]) {}

#[cfg(feature = "stat")]
fn output_stat(outcomes: &[sweep::SweepOutcome]) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    for o in outcomes {
        if let Ok(run) = &o.result {
            let mut ss = Stats::default();
            run.add_stats(&mut ss);
            log::info!(
                "assoc {} / block {} B:\n{}",
                o.point.associativity,
                o.point.block_size,
                ss.view(max_width)
            );
        }
    }
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (CommonArgs, SweepTarget, Option<u64>) {
        match Cli::try_parse_from(args).unwrap().command {
            Command::L1(L1Args { delegate }) => (delegate, SweepTarget::L1, None),
            Command::L2(L2Args { delegate, l2_size }) => (delegate, SweepTarget::L2, l2_size),
        }
    }

    #[test]
    fn test_l1_args() {
        let (args, target, l2_size) = parse(&[
            "cli", "l1", "-t", "cc.trace", "--policy", "wt", "--assoc", "1,4", "--hit-time", "2",
        ]);
        let mut config = read_config(None, target).unwrap();
        apply_args(&mut config, &args, l2_size).unwrap();
        assert_eq!(WritePolicy::WriteThrough, config.policy);
        assert_eq!(vec![1, 4], config.sweep.associativities);
        assert_eq!(2., config.latency.hit_time);
        assert_eq!(None, config.l2);
        assert!(apply_args(&mut config, &args, Some(4096)).is_err());
    }
    #[test]
    fn test_l2_args() {
        let (args, target, l2_size) = parse(&[
            "cli",
            "l2",
            "--trace",
            "tex.trace",
            "--l2-size",
            "32768",
            "--accounting",
            "always-miss",
            "--combine",
            "pooled",
        ]);
        let mut config = read_config(None, target).unwrap();
        apply_args(&mut config, &args, l2_size).unwrap();
        assert_eq!(SweepTarget::L2, config.sweep.target);
        assert_eq!(32768, config.l2.unwrap().size);
        assert_eq!(WriteAccounting::AlwaysMiss, config.accounting);
        assert_eq!(MissRateCombine::Pooled, config.combine);
    }
}
