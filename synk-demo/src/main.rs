///
/// synk-demo - Threaded demonstration of the synk futex locks
///
/// Two scenarios, mirroring how the primitives are meant to be used:
/// - mutex: N worker threads each do M read-sleep-increment rounds on
///   a shared counter; the final value must be exactly N x M
/// - rwlock: reader threads log the shared data value under read locks
///   while writer threads bump it under write locks
///
/// All shared state lives in a `DemoState` passed to the workers via
/// `Arc` - no process-wide globals.
///

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use synk::{Mutex, RwLock};

#[derive(Parser)]
#[command(name = "synk-demo")]
#[command(author, version, about = "Demonstration of the synk futex locks", long_about = None)]
struct Cli {
    /// Worker threads contending on the mutex
    #[arg(long, default_value_t = 5)]
    threads: usize,

    /// Increments each mutex worker performs
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Reader threads contending on the rwlock
    #[arg(long, default_value_t = 3)]
    readers: usize,

    /// Writer threads contending on the rwlock
    #[arg(long, default_value_t = 2)]
    writers: usize,

    /// Suppress informational output
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Error)]
enum DemoError {
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Shared state for both scenarios, owned here and lent to workers.
struct DemoState {
    counter: Mutex<i64>,
    data: RwLock<i64>,
}

// Simulated work inside and outside the critical sections, so the
// threads actually interleave instead of finishing within one quantum.
const WORK_IN_SECTION: Duration = Duration::from_millis(10);
const WORK_BETWEEN: Duration = Duration::from_millis(5);

fn demo_mutex(cli: &Cli, state: &Arc<DemoState>) -> Result<(), DemoError> {
    info!("=== DEMO: Mutex ===");

    let handles: Vec<_> = (1..=cli.threads)
        .map(|thread_id| {
            let state = Arc::clone(state);
            let iterations = cli.iterations;
            thread::spawn(move || {
                for _ in 0..iterations {
                    {
                        let mut counter = state.counter.lock();
                        let tmp = *counter;
                        info!(thread_id, counter = tmp, "read counter");
                        thread::sleep(WORK_IN_SECTION);
                        *counter = tmp + 1;
                        info!(thread_id, counter = tmp + 1, "updated counter");
                    }

                    thread::sleep(WORK_BETWEEN);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().map_err(|_| DemoError::WorkerPanicked)?;
    }

    let final_value = *state.counter.lock();
    let expected = (cli.threads * cli.iterations) as i64;
    info!(final_value, expected, "mutex demo finished");

    Ok(())
}

fn demo_rwlock(cli: &Cli, state: &Arc<DemoState>) -> Result<(), DemoError> {
    info!("=== DEMO: RW-Lock ===");

    let readers: Vec<_> = (1..=cli.readers)
        .map(|reader_id| {
            let state = Arc::clone(state);
            let iterations = cli.iterations;
            thread::spawn(move || {
                for _ in 0..iterations {
                    {
                        let data = state.data.read();
                        info!(reader_id, data = *data, "reader observed data");
                        thread::sleep(WORK_IN_SECTION);
                    }

                    thread::sleep(WORK_BETWEEN);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (1..=cli.writers)
        .map(|writer_id| {
            let state = Arc::clone(state);
            let iterations = cli.iterations;
            thread::spawn(move || {
                for _ in 0..iterations {
                    {
                        let mut data = state.data.write();
                        let from = *data;
                        *data = from + 10;
                        info!(writer_id, from, to = from + 10, "writer updated data");
                        thread::sleep(WORK_IN_SECTION);
                    }

                    thread::sleep(WORK_BETWEEN);
                }
            })
        })
        .collect();

    for h in readers.into_iter().chain(writers) {
        h.join().map_err(|_| DemoError::WorkerPanicked)?;
    }

    let final_value = *state.data.read();
    let expected = (cli.writers * cli.iterations * 10) as i64;
    info!(final_value, expected, "rwlock demo finished");

    Ok(())
}

fn run(cli: &Cli) -> Result<(), DemoError> {
    let state = Arc::new(DemoState {
        counter: Mutex::new(0),
        data: RwLock::new(0),
    });

    demo_mutex(cli, &state)?;
    demo_rwlock(cli, &state)?;

    info!("demo completed successfully");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(&cli) {
        error!("demo failed: {e}");
        std::process::exit(1);
    }
}
