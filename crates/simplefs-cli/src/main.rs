mod cli;

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use simplefs_rs::fs::{DiffOutcome, FileInfo};
use simplefs_rs::{ErrorClass, FsError, SimpleFs};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LogArgs};

const EXIT_NEGATIVE: u8 = 1;
const EXIT_INVALID_ARGUMENT: u8 = 2;
const EXIT_NOT_FOUND: u8 = 3;
const EXIT_CONFLICT: u8 = 4;
const EXIT_CAPACITY: u8 = 5;
const EXIT_IO: u8 = 6;
const EXIT_INCONSISTENT: u8 = 7;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_IO);
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_logging(args: &LogArgs) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("opening log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<FsError>().map(FsError::class) {
        Some(ErrorClass::InvalidArgument) => EXIT_INVALID_ARGUMENT,
        Some(ErrorClass::NotFound) => EXIT_NOT_FOUND,
        Some(ErrorClass::Conflict) => EXIT_CONFLICT,
        Some(ErrorClass::CapacityExhausted) => EXIT_CAPACITY,
        Some(ErrorClass::Io) | None => EXIT_IO,
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let geometry = cli.image.geometry()?;
    let fs = SimpleFs::new(&cli.image.image, geometry);
    info!(image = %fs.path().display(), command = command_name(&cli.command), "running command");
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Init => fs.init()?,
        Command::Format => fs.format()?,
        Command::Create { name } => {
            let slot = fs.create(&name)?;
            writeln!(out, "created '{name}' in slot {slot}")?;
        }
        Command::Delete { name } => fs.delete(&name)?,
        Command::Write { name, input } => {
            let data = input.load()?;
            let n = fs.write(&name, &data)?;
            writeln!(out, "wrote {n} bytes to '{name}'")?;
        }
        Command::Read { name, offset, size } => {
            let size = match size {
                Some(size) => size,
                None => usize::try_from(fs.size(&name)?).context("file too large")?,
            };
            let data = fs.read(&name, offset, size)?;
            out.write_all(&data)?;
        }
        Command::Cat { name } => {
            fs.cat(&name, &mut out)?;
        }
        Command::Ls => print_listing(&mut out, &fs.list()?)?,
        Command::Stat { name } => print_listing(&mut out, &[fs.stat(&name)?])?,
        Command::Rename { old, new } => fs.rename(&old, &new)?,
        Command::Mv { old, new } => fs.move_file(&old, &new)?,
        Command::Exists { name } => {
            let exists = fs.exists(&name);
            writeln!(out, "{exists}")?;
            if !exists {
                return Ok(ExitCode::from(EXIT_NEGATIVE));
            }
        }
        Command::Size { name } => writeln!(out, "{}", fs.size(&name)?)?,
        Command::Append { name, input } => {
            let data = input.load()?;
            let size = fs.append(&name, &data)?;
            writeln!(out, "'{name}' is now {size} bytes")?;
        }
        Command::Truncate { name, size } => fs.truncate(&name, size)?,
        Command::Cp { src, dst } => {
            let n = fs.copy(&src, &dst)?;
            writeln!(out, "copied {n} bytes from '{src}' to '{dst}'")?;
        }
        Command::Diff { a, b } => {
            let outcome = fs.diff(&a, &b)?;
            match outcome {
                DiffOutcome::Same => writeln!(out, "'{a}' and '{b}' are identical")?,
                DiffOutcome::Different => {
                    writeln!(out, "'{a}' and '{b}' differ")?;
                    return Ok(ExitCode::from(EXIT_NEGATIVE));
                }
            }
        }
        Command::Defrag => {
            let report = fs.defragment()?;
            writeln!(
                out,
                "examined {} files, moved {}, {} blocks in use",
                report.files_examined, report.files_moved, report.blocks_in_use
            )?;
        }
        Command::Check => {
            let report = fs.check_integrity()?;
            for issue in &report.issues {
                writeln!(out, "{issue}")?;
            }
            if !report.is_consistent() {
                writeln!(out, "integrity check failed: {} issues", report.issue_count())?;
                return Ok(ExitCode::from(EXIT_INCONSISTENT));
            }
            writeln!(out, "integrity check passed")?;
        }
        Command::Backup { path } => {
            let summary = fs.backup(&path)?;
            writeln!(
                out,
                "backed up {} bytes to {} (sha256 {})",
                summary.bytes,
                path.display(),
                summary.checksum_hex()
            )?;
        }
        Command::Restore { path } => {
            let summary = fs.restore(&path)?;
            writeln!(
                out,
                "restored {} bytes from {} (sha256 {})",
                summary.bytes,
                path.display(),
                summary.checksum_hex()
            )?;
            match summary.integrity {
                Some(report) if report.is_consistent() => {
                    writeln!(out, "integrity check passed")?;
                }
                Some(report) => {
                    writeln!(
                        out,
                        "warning: restored image has {} integrity issues",
                        report.issue_count()
                    )?;
                }
                None => writeln!(out, "warning: restored image could not be checked")?,
            }
        }
        Command::Df => {
            let usage = fs.usage()?;
            writeln!(
                out,
                "blocks: {} used, {} free, {} total ({} bytes each)",
                usage.used_blocks, usage.free_blocks, usage.total_blocks, usage.block_size
            )?;
            writeln!(out, "files: {} of {}", usage.active_files, usage.max_files)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_listing(out: &mut impl Write, files: &[FileInfo]) -> io::Result<()> {
    if files.is_empty() {
        return writeln!(out, "no files");
    }
    writeln!(
        out,
        "{:<5} {:<24} {:>10} {:>7} {:>7} {:>12}",
        "SLOT", "NAME", "SIZE", "START", "BLOCKS", "CREATED"
    )?;
    for f in files {
        let start = f
            .start_block
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        writeln!(
            out,
            "{:<5} {:<24} {:>10} {:>7} {:>7} {:>12}",
            f.slot, f.name, f.size, start, f.block_count, f.created_at
        )?;
    }
    Ok(())
}

const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Format => "format",
        Command::Create { .. } => "create",
        Command::Delete { .. } => "delete",
        Command::Write { .. } => "write",
        Command::Read { .. } => "read",
        Command::Cat { .. } => "cat",
        Command::Ls => "ls",
        Command::Stat { .. } => "stat",
        Command::Rename { .. } => "rename",
        Command::Mv { .. } => "mv",
        Command::Exists { .. } => "exists",
        Command::Size { .. } => "size",
        Command::Append { .. } => "append",
        Command::Truncate { .. } => "truncate",
        Command::Cp { .. } => "cp",
        Command::Diff { .. } => "diff",
        Command::Defrag => "defrag",
        Command::Check => "check",
        Command::Backup { .. } => "backup",
        Command::Restore { .. } => "restore",
        Command::Df => "df",
    }
}
