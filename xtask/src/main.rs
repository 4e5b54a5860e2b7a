//! Build automation tasks for the apns-feedback workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run all CI checks (format, lint, test, docs)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run unit and mock-server integration tests
//! - `doc`: Generate documentation
//! - `bench`: Run the decoder benchmarks
//! - `fuzz`: Run fuzz targets (requires cargo-fuzz + nightly)
//! - `coverage`: Run code coverage (requires cargo-llvm-cov)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Crates whose `tests/` directories talk to the mock feedback server.
const MOCK_SERVER_SUITES: &[&str] = &["apns-feedback-client", "apns-feedback-testing"];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for apns-feedback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, docs)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy on every target
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
        /// Only run the integration suites that use the mock server
        #[arg(long, conflicts_with = "package")]
        mock_server: bool,
    },
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run benchmarks
    Bench {
        /// Benchmark filter pattern
        filter: Option<String>,
    },
    /// Run fuzz targets (requires cargo-fuzz + nightly)
    Fuzz {
        /// Fuzz target to run; every target when omitted
        target: Option<String>,
        /// Maximum runtime per target in seconds
        #[arg(long, default_value = "60")]
        max_time: u64,
        /// List available fuzz targets
        #[arg(long)]
        list: bool,
    },
    /// Run code coverage
    Coverage {
        /// Output format (html, lcov, json)
        #[arg(long, default_value = "html")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let workspace_root = workspace_root()?;
    sh.change_dir(&workspace_root);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            test(&sh, None, false)?;
            doc(&sh, false)?;
            println!("\n✅ All CI checks passed!");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Test {
            package,
            mock_server,
        } => test(&sh, package.as_deref(), mock_server)?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Bench { filter } => bench(&sh, filter.as_deref())?,
        Command::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, target.as_deref(), max_time, list)?,
        Command::Coverage { format } => coverage(&sh, &format)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)
        .context("invalid UTF-8 in cargo output")?
        .trim()
        .to_string();

    Ok(PathBuf::from(path)
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Formatting applied.");
    } else {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Formatting check passed.");
    }
    Ok(())
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        cmd!(sh, "cargo clippy --all-targets --fix --allow-dirty").run()?;
        println!("✅ Clippy suggestions applied.");
    } else {
        cmd!(sh, "cargo clippy --all-targets -- -D warnings").run()?;
        println!("✅ Clippy check passed.");
    }
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, mock_server: bool) -> Result<()> {
    if mock_server {
        for suite in MOCK_SERVER_SUITES {
            println!("Running mock-server suites in {suite}...");
            cmd!(sh, "cargo test -p {suite} --tests").run()?;
        }
    } else if let Some(pkg) = package {
        cmd!(sh, "cargo test -p {pkg}").run()?;
    } else {
        cmd!(sh, "cargo test --workspace").run()?;
    }
    println!("✅ All tests passed.");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    cmd!(sh, "cargo doc --workspace --no-deps {open...}").run()?;
    println!("✅ Documentation generated.");
    Ok(())
}

fn bench(sh: &Shell, filter: Option<&str>) -> Result<()> {
    cmd!(sh, "cargo bench -p apns-feedback-protocol -- {filter...}").run()?;
    Ok(())
}

fn fuzz_targets(sh: &Shell) -> Result<Vec<String>> {
    let targets_dir = sh.current_dir().join("fuzz").join("fuzz_targets");
    if !targets_dir.exists() {
        bail!("fuzz targets not found at {}", targets_dir.display());
    }

    let mut targets = Vec::new();
    for entry in fs::read_dir(&targets_dir)? {
        if let Some(name) = entry?.path().file_stem() {
            targets.push(name.to_string_lossy().into_owned());
        }
    }
    targets.sort();
    Ok(targets)
}

fn fuzz(sh: &Shell, target: Option<&str>, max_time: u64, list: bool) -> Result<()> {
    let available = fuzz_targets(sh)?;

    if list {
        println!("Available fuzz targets:");
        for name in &available {
            println!("  - {name}");
        }
        return Ok(());
    }

    let selected = match target {
        Some(t) if available.iter().any(|a| a == t) => vec![t.to_string()],
        Some(t) => bail!("unknown fuzz target `{t}` (try --list)"),
        None => available,
    };

    let _dir = sh.push_dir("fuzz");
    let max_time = max_time.to_string();
    for target in selected {
        println!("Fuzzing {target} for {max_time}s...");
        cmd!(
            sh,
            "cargo +nightly fuzz run {target} -- -max_total_time={max_time}"
        )
        .run()?;
    }
    Ok(())
}

fn coverage(sh: &Shell, format: &str) -> Result<()> {
    let flag = match format {
        "html" => "--html",
        "lcov" => "--lcov",
        "json" => "--json",
        other => bail!("unsupported coverage format: {other}"),
    };
    cmd!(sh, "cargo llvm-cov --workspace {flag}").run()?;
    Ok(())
}
