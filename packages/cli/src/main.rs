use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use krepis_allocator::{
    AllocResult, AllocationPolicy, DeadlockMonitor, ManagerConfig, ResourceManager, StateReport,
    Units,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_WORKERS: usize = 4;
const DEMO_EXISTING: [Units; 6] = [8, 6, 7, 5, 9, 4];
const POLL: Duration = Duration::from_millis(50);

/// Krepis resource manager demo
/// Four scripted workers competing for six resource types
#[derive(Parser)]
#[command(name = "krepis-rm")]
#[command(about = "Deadlock avoidance / detection demo", long_about = None)]
struct Cli {
    /// 1 = Banker's avoidance, 0 = detection
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    avoid: u8,

    /// JSON manager config (worker_count >= 4, six resource types)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Multiplier applied to every scripted sleep (1.0 = one-second ticks)
    #[arg(short, long, default_value_t = 1.0)]
    time_scale: f64,
}

/// One scripted worker action
enum Step {
    Claim(Vec<Units>),
    Sleep(u64),
    Request(Vec<Units>),
    Release(Vec<Units>),
    Print(&'static str),
}

use Step::*;

fn detection_script(slot: usize) -> Vec<Step> {
    match slot {
        0 => vec![
            Sleep(1),
            Request(vec![2, 1, 5, 3, 4, 2]),
            Print("After First Request of Thread 0"),
            Sleep(5),
            Request(vec![0, 0, 3, 0, 0, 0]),
            Print("After Second Request of Thread 0"),
            Release(vec![2, 1, 5, 3, 4, 2]),
            Release(vec![0, 0, 3, 0, 0, 0]),
            Print("After First and Second Release of Thread 0"),
        ],
        1 => single_request(1, 2, 5, vec![3, 2, 0, 1, 2, 0]),
        2 => single_request(2, 3, 5, vec![2, 2, 1, 0, 1, 1]),
        _ => single_request(3, 4, 5, vec![1, 1, 1, 1, 2, 1]),
    }
}

fn avoidance_script(slot: usize) -> Vec<Step> {
    match slot {
        0 => vec![
            Claim(vec![3, 2, 6, 4, 5, 3]),
            Sleep(1),
            Request(vec![2, 1, 3, 2, 3, 2]),
            Print("After First Request of Thread 0"),
            Sleep(6),
            Request(vec![0, 1, 0, 0, 0, 0]),
            Print("After Second Request of Thread 0 (Waited by Avoidance)"),
            Release(vec![2, 1, 3, 2, 3, 2]),
            Release(vec![0, 1, 0, 0, 0, 0]),
            Print("After First and Second Release of Thread 0"),
        ],
        1 => claimed(vec![4, 3, 3, 2, 2, 1], single_request(1, 2, 7, vec![2, 2, 1, 1, 2, 1])),
        2 => claimed(vec![2, 3, 1, 1, 2, 3], single_request(2, 3, 7, vec![2, 2, 1, 0, 1, 1])),
        _ => claimed(vec![1, 1, 1, 1, 1, 1], single_request(3, 4, 7, vec![0, 0, 0, 1, 0, 0])),
    }
}

/// Sleep, request, hold, release: the shape shared by workers 1..=3
fn single_request(slot: usize, delay: u64, hold: u64, request: Vec<Units>) -> Vec<Step> {
    let (after_request, after_release) = match slot {
        1 => ("After First Request of Thread 1", "After First Release of Thread 1"),
        2 => ("After First Request of Thread 2", "After First Release of Thread 2"),
        _ => ("After First Request of Thread 3", "After First Release of Thread 3"),
    };
    vec![
        Sleep(delay),
        Request(request.clone()),
        Print(after_request),
        Sleep(hold),
        Release(request),
        Print(after_release),
    ]
}

fn claimed(claim: Vec<Units>, mut steps: Vec<Step>) -> Vec<Step> {
    steps.insert(0, Claim(claim));
    steps
}

fn print_state(rm: &ResourceManager, header: &str) {
    println!("{}", StateReport::new(header, &rm.snapshot()));
}

fn run_worker(rm: &ResourceManager, slot: usize, script: Vec<Step>, scale: f64) -> AllocResult<()> {
    let token = rm.register_start(slot)?;
    for step in script {
        match step {
            Claim(claim) => rm.declare_claim(&token, &claim)?,
            Sleep(secs) => thread::sleep(Duration::from_secs_f64(secs as f64 * scale)),
            Request(request) => {
                let grant = rm.request(&token, &request)?;
                if !grant.was_immediate() {
                    info!(slot, waits = grant.waits, rollbacks = grant.rollbacks, "request granted after waiting");
                }
            }
            Release(release) => rm.release(&token, &release)?,
            Print(header) => print_state(rm, header),
        }
    }
    rm.register_end(token)
}

fn load_config(cli: &Cli, policy: AllocationPolicy) -> Result<ManagerConfig> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ManagerConfig::new(DEMO_WORKERS, DEMO_EXISTING.to_vec(), policy),
    };
    config.policy = policy;

    ensure!(
        config.resource_count() == DEMO_EXISTING.len(),
        "the demo scripts use {} resource types, config has {}",
        DEMO_EXISTING.len(),
        config.resource_count()
    );
    ensure!(
        config.worker_count >= DEMO_WORKERS,
        "the demo needs at least {} worker slots, config has {}",
        DEMO_WORKERS,
        config.worker_count
    );
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ensure!(
        cli.time_scale.is_finite() && cli.time_scale >= 0.0,
        "time scale must be a non-negative number"
    );

    let policy = AllocationPolicy::from_flag(cli.avoid == 1);
    let config = load_config(&cli, policy)?;
    let rm = Arc::new(ResourceManager::new(config)?);
    info!(%policy, "starting demo");

    print_state(&rm, "Initial State");

    let workers = (0..DEMO_WORKERS)
        .map(|slot| {
            let rm = Arc::clone(&rm);
            let script = match policy {
                AllocationPolicy::Avoidance => avoidance_script(slot),
                AllocationPolicy::Detection => detection_script(slot),
            };
            let scale = cli.time_scale;
            thread::Builder::new()
                .name(format!("worker-{}", slot))
                .spawn(move || run_worker(&rm, slot, script, scale))
                .context("spawning worker thread")
        })
        .collect::<Result<Vec<JoinHandle<AllocResult<()>>>>>()?;

    let mut deadlocks = None;
    let _monitor = match policy {
        AllocationPolicy::Detection => {
            let (tx, rx) = mpsc::channel();
            deadlocks = Some(rx);
            let interval = Duration::from_secs_f64(cli.time_scale).max(POLL);
            Some(DeadlockMonitor::spawn(Arc::clone(&rm), interval, move |report, snapshot| {
                let _ = tx.send((report, snapshot));
            }))
        }
        AllocationPolicy::Avoidance => None,
    };

    while !workers.iter().all(|w| w.is_finished()) {
        let Some(rx) = &deadlocks else {
            thread::sleep(POLL);
            continue;
        };
        match rx.recv_timeout(POLL) {
            Ok((report, snapshot)) => {
                let header = format!(
                    "Deadlock Happened ({} Processes are Deadlocked). Terminating...",
                    report.count()
                );
                println!("{}", StateReport::new(&header, &snapshot));
                warn!(deadlocked = ?report.deadlocked, "terminating with blocked workers");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => deadlocks = None,
        }
    }

    for worker in workers {
        worker.join().map_err(|_| anyhow!("worker thread panicked"))??;
    }
    info!("all workers finished");
    Ok(())
}
