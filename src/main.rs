#![allow(non_snake_case)]

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use MemProbe::encoding::PayloadEncoding;
use MemProbe::engine;
use MemProbe::error::Result;
use MemProbe::pattern::ValueEncoding;
use MemProbe::regions::ProtectionChoice;

#[derive(Parser, Debug)]
#[command(name = "memprobe", version, about = "MemProbe Cross-Process Memory CLI")]
struct Cli {
    /// Write the report to a file instead of stdout.
    #[arg(long, global = true)]
    json: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the engine is usable on this machine.
    Check,
    /// List the memory regions of a process.
    Regions {
        #[arg(long)]
        pid: Option<u32>,
    },
    /// Scan committed readable memory for a pattern.
    Scan {
        #[arg(long)]
        pid: Option<u32>,
        pattern: String,
        #[arg(long, value_enum, default_value = "hex")]
        encoding: ValueEncoding,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Read bytes from an address.
    Read {
        #[arg(long)]
        pid: Option<u32>,
        address: String,
        length: usize,
        #[arg(long, value_enum, default_value = "hex")]
        encoding: PayloadEncoding,
    },
    /// Write a payload to an address.
    Write {
        #[arg(long)]
        pid: Option<u32>,
        address: String,
        payload: String,
        #[arg(long, value_enum, default_value = "hex")]
        encoding: PayloadEncoding,
    },
    /// Change the protection of a memory range.
    Protect {
        #[arg(long)]
        pid: Option<u32>,
        address: String,
        size: usize,
        #[arg(value_enum)]
        protection: ProtectionChoice,
    },
    /// Report the protection of the region containing an address.
    CheckProtection {
        #[arg(long)]
        pid: Option<u32>,
        address: String,
    },
    /// List the modules loaded in a process.
    Modules {
        #[arg(long)]
        pid: Option<u32>,
    },
    /// Load a DLL into a process.
    InjectDll {
        #[arg(long)]
        pid: u32,
        dll: PathBuf,
    },
    /// Run a shellcode payload in a process.
    InjectShellcode {
        #[arg(long)]
        pid: u32,
        payload: String,
        #[arg(long, value_enum, default_value = "hex")]
        encoding: PayloadEncoding,
    },
    /// Check whether a debugger is attached to a process.
    Probe {
        #[arg(long)]
        pid: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli) {
        let body = serde_json::json!({ "success": false, "error": err.to_string() });
        println!("{}", body);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let json = cli.json.as_ref();

    match &cli.command {
        Command::Check => emit(json, &engine::check_availability()),
        Command::Regions { pid } => emit(json, &engine::list_regions(target_pid(*pid))?),
        Command::Scan {
            pid,
            pattern,
            encoding,
            max_results,
        } => emit(
            json,
            &engine::scan_memory(target_pid(*pid), pattern, *encoding, *max_results)?,
        ),
        Command::Read {
            pid,
            address,
            length,
            encoding,
        } => emit(
            json,
            &engine::read_memory(target_pid(*pid), address, *length, *encoding)?,
        ),
        Command::Write {
            pid,
            address,
            payload,
            encoding,
        } => emit(
            json,
            &engine::write_memory(target_pid(*pid), address, payload, *encoding)?,
        ),
        Command::Protect {
            pid,
            address,
            size,
            protection,
        } => emit(
            json,
            &engine::change_protection(target_pid(*pid), address, *size, *protection)?,
        ),
        Command::CheckProtection { pid, address } => emit(
            json,
            &engine::check_memory_protection(target_pid(*pid), address)?,
        ),
        Command::Modules { pid } => emit(json, &engine::list_modules(target_pid(*pid))?),
        Command::InjectDll { pid, dll } => emit(json, &engine::inject_dll(*pid, dll)?),
        Command::InjectShellcode {
            pid,
            payload,
            encoding,
        } => emit(json, &engine::inject_shellcode(*pid, payload, *encoding)?),
        Command::Probe { pid } => emit(json, &engine::probe_debugger(target_pid(*pid))?),
    }

    Ok(())
}

fn target_pid(pid: Option<u32>) -> u32 {
    pid.unwrap_or_else(std::process::id)
}

fn emit<T: Serialize>(json: Option<&PathBuf>, report: &T) {
    if let Some(path) = json {
        if let Err(err) = write_json_file(path, report) {
            eprintln!("Failed to write JSON: {}", err);
            std::process::exit(1);
        }
        println!("JSON report written: {}", path.display());
    } else {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                eprintln!("Failed to render JSON: {}", err);
                std::process::exit(1);
            }
        }
    }
}

fn write_json_file<T: Serialize>(path: &PathBuf, report: &T) -> io::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
