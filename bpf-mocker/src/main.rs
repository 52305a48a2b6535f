//! # bpf-mocker - Main Entry Point
//!
//! Parses arguments, runs the pre-flight checks and hands a finished
//! configuration to the daemon.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use bpf_mocker::cli::Args;
use bpf_mocker::daemon::Daemon;
use bpf_mocker::domain::Pid;
use bpf_mocker::ebpf::{EbpfObject, ProbeTypes};
use bpf_mocker::handler::EventPrinter;
use bpf_mocker::preflight::{bump_memlock_rlimit, run_preflight_checks};

// Exit codes
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    std::process::exit(match run(&args) {
        Ok(status) => status,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            code
        }
    });
}

/// Debug output (including aya's loader diagnostics) only with --verbose
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

fn run(args: &Args) -> Result<i32> {
    run_preflight_checks(Pid(args.pid))?;
    bump_memlock_rlimit();

    let config = args.to_config(ProbeTypes::detect());
    let handler = EventPrinter::from_config(&config, args.format);
    let instrumentation = EbpfObject::new(&args.object);

    Ok(Daemon::new(config, instrumentation, handler).start())
}
