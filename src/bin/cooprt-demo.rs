//! Runs the sample application scripts on the cooperative runtime.
//!
//! ```text
//! cooprt-demo --virtual counter --until 3.5
//! cooprt-demo requests
//! RUST_LOG=cooprt=debug cooprt-demo --virtual join
//! ```

use cooprt::provider::net::http_request;
use cooprt::{Handle, JoinHandle, Runloop, Task, Timestamp, join, sleep};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cooprt-demo", about = "Sample scripts for the cooperative runtime")]
struct Cli {
    /// Use simulated time: idle waits complete instantly.
    #[arg(long = "virtual")]
    virtual_time: bool,

    /// Stop after this many logical seconds instead of draining the queue.
    #[arg(long, value_name = "SECONDS")]
    until: Option<f64>,

    #[command(subcommand)]
    script: Script,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Script {
    /// Print a counter once per second, forever.
    Counter,
    /// Issue five requests concurrently and wait for all of them.
    Requests,
    /// Two tasks await the same request.
    Shared,
    /// Join three tasks sleeping 1, 2 and 3 seconds.
    Join,
}

fn say(handle: &Handle, message: impl AsRef<str>) {
    println!("[{}] {}", handle.now(), message.as_ref());
}

async fn count_forever(handle: Handle) {
    let mut n = 0u64;

    loop {
        n += 1;
        say(&handle, format!("n: {n}"));
        sleep(&handle, Duration::from_secs(1)).await;
    }
}

fn counter(handle: Handle) -> JoinHandle<()> {
    Task::spawn(count_forever(handle))
}

fn requests(handle: Handle) -> JoinHandle<()> {
    Task::spawn(async move {
        let pending: Vec<_> = (0..5)
            .map(|i| http_request(&handle, format!("http://example.com/{i}")))
            .collect();

        for request in pending {
            if let Err(error) = request.await {
                say(&handle, format!("request failed: {error}"));
            }
        }

        say(&handle, "Done.");
    })
}

fn shared(handle: Handle) -> JoinHandle<()> {
    Task::spawn(async move {
        let response = http_request(&handle, "http://example.com/");

        let first = Task::spawn({
            let handle = handle.clone();
            let response = response.clone();
            async move {
                let _ = response.await;
                say(&handle, "Done 1.");
            }
        });

        let second = Task::spawn({
            let handle = handle.clone();
            async move {
                let _ = response.await;
                say(&handle, "Done 2.");
            }
        });

        let _ = first.await;
        let _ = second.await;

        say(&handle, "All done.");
    })
}

fn joined(handle: Handle) -> JoinHandle<()> {
    Task::spawn(async move {
        let workers: Vec<_> = (1..=3u64)
            .map(|i| {
                let handle = handle.clone();
                Task::spawn(async move {
                    sleep(&handle, Duration::from_secs(i)).await;
                    say(&handle, format!("Done {i}."));
                    i
                })
            })
            .collect();

        let results: Vec<String> = join(workers)
            .await
            .into_iter()
            .flatten()
            .flatten()
            .map(|value| value.to_string())
            .collect();

        say(&handle, format!("Results: {}", results.join(", ")));
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cooprt=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = if cli.virtual_time {
        Runloop::builder().virtual_time().build()
    } else {
        Runloop::new()
    };
    let handle = rt.handle();

    let main_task = match cli.script {
        Script::Counter => counter(handle.clone()),
        Script::Requests => requests(handle.clone()),
        Script::Shared => shared(handle.clone()),
        Script::Join => joined(handle.clone()),
    };

    let until = cli.until.map(|seconds| {
        Timestamp::try_from_secs_f64(seconds).map_err(|error| (seconds, error))
    });

    let stats = match until {
        Some(Ok(limit)) => rt.run_until(limit),
        Some(Err((seconds, error))) => {
            eprintln!("invalid --until value {seconds}: {error}");
            return ExitCode::FAILURE;
        }
        None => rt.run(),
    };

    tracing::info!(
        actions = stats.actions,
        idle_waits = stats.idle_waits,
        pending = handle.pending(),
        "runloop finished"
    );

    match main_task.peek() {
        Some(Err(error)) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}
