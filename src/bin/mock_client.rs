//! Mock client program for integration testing
//!
//! Stands in for a user's server executable: prints some output, optionally
//! forks a long-lived child into its own process group, then sleeps until
//! killed (or exits after a delay).

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mock_client", about = "Fixture program for harness tests")]
struct Options {
    /// Print "line 0" .. "line N-1" on stdout
    #[arg(long, default_value_t = 0)]
    lines: usize,

    /// Print this text on stderr
    #[arg(long)]
    stderr: Option<String>,

    /// Start a copy of this binary with --child
    #[arg(long)]
    spawn_child: bool,

    /// Exit after this many milliseconds instead of sleeping forever
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Exit status used with --exit-after-ms
    #[arg(long, default_value_t = 0)]
    exit_code: i32,

    /// Child mode: print "child ready" and sleep
    #[arg(long)]
    child: bool,
}

fn main() {
    let options = Options::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if options.child {
        writeln!(out, "child ready").ok();
        out.flush().ok();
        drop(out);
        sleep_forever();
    }

    for i in 0..options.lines {
        writeln!(out, "line {i}").ok();
    }
    out.flush().ok();
    drop(out);

    if let Some(text) = &options.stderr {
        eprintln!("{text}");
    }

    if options.spawn_child {
        let spawned = std::env::current_exe().and_then(|exe| {
            Command::new(exe)
                .arg("--child")
                .stdin(Stdio::null())
                .spawn()
        });
        match spawned {
            Ok(child) => {
                println!("spawned child {}", child.id());
                std::io::stdout().flush().ok();
            }
            Err(e) => eprintln!("mock_client: failed to spawn child: {e}"),
        }
    }

    match options.exit_after_ms {
        Some(ms) => {
            std::thread::sleep(Duration::from_millis(ms));
            std::process::exit(options.exit_code);
        }
        None => sleep_forever(),
    }
}

fn sleep_forever() -> ! {
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
