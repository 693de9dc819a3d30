//! oxidized-ee — host runtime for statically recompiled PS2 programs
//!
//! Loads a guest ELF, then runs the recompiled entry point against the EE
//! memory model while scanning the GS framebuffer out to the host display.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use oe_core::Config;
use oe_gs::{FB_HEIGHT, FB_WIDTH};
use oe_runtime::{DisplayBackend, NullBackend, Runtime};

/// Host runtime for statically recompiled PS2 programs
#[derive(Debug, Parser)]
#[command(name = "runtime")]
struct Cli {
    /// Path to the guest ELF image
    elf_path: PathBuf,

    /// Host window title
    #[arg(long)]
    title: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(title) = cli.title {
        config.window_title = title;
    }

    oe_core::logging::init(&config);
    tracing::info!("starting oxidized-ee runtime");

    let runtime = Runtime::new(config.clone()).context("failed to initialize runtime")?;

    runtime
        .load_elf(&cli.elf_path)
        .with_context(|| format!("failed to load ELF {}", cli.elf_path.display()))?;

    let mut display = NullBackend::new();
    display
        .init(FB_WIDTH, FB_HEIGHT, &config.window_title)
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize display")?;

    runtime.run(&mut display).context("runtime error")?;

    Ok(())
}
