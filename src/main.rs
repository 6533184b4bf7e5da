use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use emmac::rsrc::ResourceFile;
use emmac::{screen, Core};

/// A classic Motorola 68000 Macintosh emulator for small single-application
/// programs.
#[derive(Parser)]
#[command(name = "mymac", version)]
struct Args {
    /// Application resource file (raw resource fork or MacBinary II).
    file: PathBuf,

    /// Trace every executed instruction to the log.
    #[arg(long)]
    disassemble: bool,

    /// A Mac OS "System" resource file to fall back to for resources.
    #[arg(long)]
    system_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = ResourceFile::load(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;
    let system_file = match &args.system_file {
        Some(path) => Some(
            ResourceFile::load(path).with_context(|| format!("loading {}", path.display()))?,
        ),
        None => None,
    };

    let mut core = Core::new(file, system_file)?;
    core.cpu.trace = args.disassemble;
    core.boot().context("booting the application")?;
    info!("booted {}", args.file.display());

    screen::run_event_loop(&mut core)?;
    Ok(())
}
