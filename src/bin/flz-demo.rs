use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info, Level};

use flz::*;

#[derive(Parser)]
#[command(name = "flz-demo")]
#[command(about = "Compress files for Solady's LibZip.flzDecompress", long_about = None)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Compress a file
    Compress {
        input: PathBuf,
        output: PathBuf,
        /// Decompress the result and check it matches the input
        #[arg(long)]
        verify: bool,
    },
    /// Decompress a file
    Decompress {
        input: PathBuf,
        output: PathBuf,
        /// Expected decompressed size, used to preallocate
        #[arg(long)]
        size_hint: Option<usize>,
    },
    /// List the commands in a compressed file
    Inspect { input: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.mode {
        Mode::Compress {
            input,
            output,
            verify,
        } => {
            let inp = read(&input)?;
            let outp = compress(&inp);
            if verify {
                let check = decompress_to_vec(&outp, Some(inp.len()))
                    .context("compressed output failed to decompress")?;
                if check != inp {
                    bail!("compressed output does not round-trip");
                }
                debug!("round trip verified");
            }
            write(&output, &outp)?;
            info!(
                input_len = inp.len(),
                output_len = outp.len(),
                "compressed {}",
                input.display()
            );
        }
        Mode::Decompress {
            input,
            output,
            size_hint,
        } => {
            let inp = read(&input)?;
            let outp = decompress_to_vec(&inp, size_hint)
                .with_context(|| format!("failed to decompress {}", input.display()))?;
            write(&output, &outp)?;
            info!(
                input_len = inp.len(),
                output_len = outp.len(),
                "decompressed {}",
                input.display()
            );
        }
        Mode::Inspect { input } => inspect(&read(&input)?)?,
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

fn inspect(inp: &[u8]) -> Result<()> {
    let mut cmds = Commands::new(inp);
    let mut out_pos = 0;
    let (mut n_lits, mut n_backrefs) = (0usize, 0usize);

    loop {
        let offset = inp.len() - cmds.remaining();
        let Some(cmd) = cmds.next() else {
            break;
        };
        let cmd = cmd.with_context(|| format!("bad command at offset {offset}"))?;
        match cmd {
            Command::Literals(lits) => {
                n_lits += 1;
                println!("{offset:>8} {out_pos:>10}  lits  len={}", lits.len());
            }
            Command::Backref { disp, len } => {
                n_backrefs += 1;
                println!("{offset:>8} {out_pos:>10}  copy  len={len} dist={}", disp + 1);
            }
        }
        out_pos += cmd.output_len();
    }

    println!(
        "{} bytes -> {out_pos} bytes, {n_lits} literal runs, {n_backrefs} backreferences",
        inp.len()
    );
    Ok(())
}
