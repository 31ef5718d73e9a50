use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use env_logger::Builder;
use log::{error, info};

use replay_energy::{run_from_files, RunConfig};

/// Replays recorded CPU usage traces of services on a simulated host and records its energy consumption
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Tested system, e.g. sockshop
    system: String,

    /// Load scenario
    scenario: String,

    /// Number of users
    users: String,

    /// Repetition of the recorded experiment
    repetition: String,

    /// Replay run identifier
    run: String,

    /// Root directory of recorded traces
    #[clap(long, default_value = "traces")]
    traces_root: PathBuf,

    /// Root directory of outputs
    #[clap(long, default_value = "outputs")]
    output_root: PathBuf,

    /// Platform description (default: <traces-root>/platform.yaml)
    #[clap(long)]
    platform: Option<PathBuf>,

    /// Replay config with timing parameters
    #[clap(long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let run = RunConfig::new(&args.system, &args.scenario, &args.users, &args.repetition, &args.run)
        .with_traces_root(args.traces_root)
        .with_output_root(args.output_root);
    let platform = args.platform.unwrap_or_else(|| run.default_platform_path());

    let t = Instant::now();
    match run_from_files(&run, args.config.as_deref(), &platform) {
        Ok(summary) => {
            info!(
                "Replayed {} services, {} energy records, {:.0} J consumed, {} overrun samples",
                summary.workloads.len(),
                summary.records.len(),
                summary.final_energy,
                summary.drift_count()
            );
            info!("Output: {}", run.energy_output_path().display());
            info!("Elapsed time: {:.2}s", t.elapsed().as_secs_f64());
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
