//! Thin CLI front end (`myatari <program.xex>`). Flag parsing is hand-rolled
//! rather than `clap`-based: no example repo in the corpus reaches for an
//! argument-parsing crate, and the flag set here is small and fixed.

use mini6502::config::{Configuration, ErrorLevel, HostIo};
use mini6502::error::SimError;
use mini6502::Emulator;
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    program: PathBuf,
    debug: bool,
    raw_io: bool,
    error_level: ErrorLevel,
    cycle_limit: Option<u64>,
}

fn parse_args() -> Result<Args, String> {
    let mut program = None;
    let mut debug = false;
    let mut raw_io = false;
    let mut error_level = ErrorLevel::default();
    let mut cycle_limit = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" => debug = true,
            "--raw-io" => raw_io = true,
            "--error-level" => {
                let v = iter.next().ok_or("--error-level needs a value")?;
                error_level = match v.as_str() {
                    "none" => ErrorLevel::None,
                    "memory" => ErrorLevel::Memory,
                    "full" => ErrorLevel::Full,
                    other => return Err(format!("unknown error level: {other}")),
                };
            }
            "--cycle-limit" => {
                let v = iter.next().ok_or("--cycle-limit needs a value")?;
                cycle_limit = Some(v.parse::<u64>().map_err(|e| e.to_string())?);
            }
            other if program.is_none() => program = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Args {
        program: program.ok_or("usage: myatari [--debug] [--raw-io] [--error-level LEVEL] [--cycle-limit N] <program.xex>")?,
        debug,
        raw_io,
        error_level,
        cycle_limit,
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let data = match std::fs::read(&args.program) {
        Ok(d) => d,
        Err(e) => {
            log::error!("cannot read {}: {e}", args.program.display());
            return ExitCode::FAILURE;
        }
    };

    let config = Configuration {
        error_level: args.error_level,
        cycle_limit: args.cycle_limit,
        raw_io: args.raw_io,
        debug: args.debug,
        host_io: HostIo::stdio(args.raw_io),
        ..Configuration::default()
    };
    let mut emulator = Emulator::new(config);
    let fault = emulator.run_xex(&data);
    log::info!("halted: {fault}");
    if args.debug {
        print!("{}", emulator.cpu.profiler.snapshot_text());
    }

    match fault {
        SimError::Break(_) | SimError::CycleLimit(_) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
