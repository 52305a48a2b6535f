use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::Command;

const EBPF_PACKAGE: &str = "bpf-mocker-ebpf";
const DEFAULT_BPF_TARGET: &str = "bpfel-unknown-none";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Compile the kernel-side syscall probes
    BuildEbpf {
        #[arg(long, default_value = DEFAULT_BPF_TARGET)]
        target: String,
    },
    /// Build the probes and the daemon, then run the daemon as root
    Run {
        /// Process ID to trace
        #[arg(long)]
        pid: u32,
        /// Privilege escalation command
        #[arg(long, default_value = "sudo -E")]
        runner: String,
        /// Extra arguments passed to bpf-mocker
        #[arg(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target } => build_ebpf(&target)?,
        Cmd::Run { pid, runner, run_args } => run(pid, &runner, &run_args)?,
    }

    Ok(())
}

/// Object lands in target/<target>/release/bpf-mocker
fn build_ebpf(target: &str) -> Result<()> {
    // Debug builds of BPF code pull in formatting machinery the linker rejects
    let status = Command::new("cargo")
        .args(["+nightly", "build", "--package", EBPF_PACKAGE, "--target", target])
        .args(["-Z", "build-std=core", "--release"])
        .status()
        .context("Failed to build eBPF object")?;

    if !status.success() {
        bail!("Failed to build eBPF object");
    }

    println!("✓ eBPF object built: target/{target}/release/bpf-mocker");
    Ok(())
}

fn run(pid: u32, runner: &str, run_args: &[String]) -> Result<()> {
    build_ebpf(DEFAULT_BPF_TARGET)?;

    let status = Command::new("cargo")
        .args(["build", "--release", "--package", "bpf-mocker"])
        .status()
        .context("Failed to build bpf-mocker")?;
    if !status.success() {
        bail!("Failed to build bpf-mocker");
    }

    let mut words = runner.split_whitespace();
    let program = words.next().context("--runner must not be empty")?;
    let status = Command::new(program)
        .args(words)
        .arg("target/release/bpf-mocker")
        .args(["--pid", &pid.to_string()])
        .args(["--object", &format!("target/{DEFAULT_BPF_TARGET}/release/bpf-mocker")])
        .args(run_args)
        .status()
        .with_context(|| format!("Failed to run bpf-mocker via {program}"))?;

    // Propagate the daemon's status (1 on setup failure)
    std::process::exit(status.code().unwrap_or(1));
}
