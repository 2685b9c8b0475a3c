use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;
use clap::Parser;

#[derive(Parser)]
enum Cli {
    /// Compile the XDP object for bpfel-unknown-none.
    BuildEbpf {
        #[arg(long)]
        release: bool,
    },
    /// Compile the XDP object and the agent, then start the agent under sudo.
    Run {
        #[arg(long)]
        release: bool,
        /// Agent flags, e.g. `-- -i eth0 -t 1.1.1.1`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse() {
        Cli::BuildEbpf { release } => build_ebpf(release).map(drop),
        Cli::Run { release, args } => {
            let object = build_ebpf(release)?;
            cargo(None, &["build", "-p", "pktwatch"], release)?;

            let profile = if release { "release" } else { "debug" };
            let status = Command::new("sudo")
                .arg(format!("target/{profile}/pktwatch"))
                .arg("--program")
                .arg(&object)
                .args(&args)
                .status()
                .context("failed to start pktwatch")?;
            anyhow::ensure!(status.success(), "pktwatch exited with {status}");
            Ok(())
        }
    }
}

/// Builds the eBPF crate and returns the path of the object it produced.
fn build_ebpf(release: bool) -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../pktwatch-ebpf"));
    cargo(
        Some(&dir),
        &[
            "+nightly",
            "build",
            "--target",
            "bpfel-unknown-none",
            "-Z",
            "build-std=core",
        ],
        release,
    )?;

    let object = ebpf_object(&dir, release);
    anyhow::ensure!(object.exists(), "no eBPF object at {}", object.display());
    Ok(object)
}

fn ebpf_object(ebpf_dir: &Path, release: bool) -> PathBuf {
    let profile = if release { "release" } else { "debug" };
    ebpf_dir
        .join("target/bpfel-unknown-none")
        .join(profile)
        .join("pktwatch")
}

fn cargo(dir: Option<&Path>, args: &[&str], release: bool) -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.args(args);
    if release {
        cmd.arg("--release");
    }
    let status = cmd
        .status()
        .with_context(|| format!("failed to run cargo {}", args.join(" ")))?;
    anyhow::ensure!(status.success(), "cargo {} failed", args.join(" "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebpf_object_path_matches_agent_default() {
        let path = ebpf_object(Path::new("pktwatch-ebpf"), true);
        assert_eq!(
            path,
            Path::new("pktwatch-ebpf/target/bpfel-unknown-none/release/pktwatch")
        );
        assert!(ebpf_object(Path::new("x"), false).ends_with("debug/pktwatch"));
    }
}
