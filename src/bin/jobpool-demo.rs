use std::process::exit;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use rand::Rng;

use jobpool::{PoolConfig, Result, WorkerPool};

#[derive(Parser)]
#[command(
    name = "jobpool-demo",
    version,
    about = "Runs a batch of sleeping jobs on a worker pool"
)]
struct Cli {
    /// Number of worker threads (defaults to available parallelism)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Number of jobs to submit
    #[arg(long, default_value_t = 4, value_name = "N")]
    jobs: usize,

    /// Shortest delay a job sleeps for
    #[arg(long, default_value_t = 2000, value_name = "MS")]
    min_delay_ms: u64,

    /// Longest delay a job sleeps for
    #[arg(long, default_value_t = 6000, value_name = "MS")]
    max_delay_ms: u64,

    /// Log pool lifecycle events at debug instead of info
    #[arg(long)]
    quiet: bool,
}

/// A dummy object whose method is run as a job.
struct Foo {
    id: usize,
}

impl Foo {
    fn bar(&self, delay: Duration) {
        println!("Foo number {} checking-in.", self.id);
        thread::sleep(delay);
        println!("Foo number {} checking-out.", self.id);
    }
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("jobpool-demo {}", env!("CARGO_PKG_VERSION"));

    let mut config = PoolConfig::new().verbose(!cli.quiet);
    if let Some(workers) = cli.workers {
        config = config.workers(workers);
    }
    let pool = WorkerPool::with_config(config)?;

    let (lo, hi) = if cli.min_delay_ms <= cli.max_delay_ms {
        (cli.min_delay_ms, cli.max_delay_ms)
    } else {
        (cli.max_delay_ms, cli.min_delay_ms)
    };

    let foos: Vec<Arc<Foo>> = (0..cli.jobs).map(|id| Arc::new(Foo { id })).collect();
    let mut rng = rand::thread_rng();
    for foo in &foos {
        let foo = Arc::clone(foo);
        let delay = Duration::from_millis(rng.gen_range(lo..=hi));
        pool.submit(move || foo.bar(delay))?;
    }

    pool.wait_for_idle()?;
    pool.shutdown()?;

    for failure in pool.drain_failures() {
        error!("{}", failure);
    }
    println!(
        "completed {} jobs on {} workers",
        foos.len(),
        pool.worker_count()
    );
    Ok(())
}
