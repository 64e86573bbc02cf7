use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{Level, event};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{Alarm, Alto};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum SystemTypeArg {
    /// Alto I
    AltoI,
    /// Alto II without the extended memory options
    AltoII,
    /// Alto II with the 2K microcode ROM option
    AltoII2kRom,
    /// Alto II with the 3K microcode RAM option
    AltoII3kRam,
}

impl From<SystemTypeArg> for SystemType {
    fn from(arg: SystemTypeArg) -> SystemType {
        match arg {
            SystemTypeArg::AltoI => SystemType::AltoI,
            SystemTypeArg::AltoII => SystemType::AltoII,
            SystemTypeArg::AltoII2kRom => SystemType::AltoIIXm2k,
            SystemTypeArg::AltoII3kRam => SystemType::AltoIIXm3k,
        }
    }
}

/// Simulate the Xerox Alto's microcoded processor.
#[derive(Debug, Parser)]
#[command(about, author)]
struct Cli {
    /// Directory holding the raw microcode, constant and dispatch ROM
    /// images.  Without it the machine starts with blank ROMs.
    #[arg(long)]
    rom_dir: Option<PathBuf>,

    /// Which hardware generation to simulate.
    #[arg(long, value_enum, default_value_t = SystemTypeArg::AltoII2kRom)]
    system_type: SystemTypeArg,

    /// How many microinstruction cycles to run.
    #[arg(long, default_value_t = 1_000_000)]
    steps: u64,
}

fn colour_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stderr) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn report_alarm(alarm: &Alarm) {
    let mut stream = StandardStream::stderr(colour_choice());
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Red)).set_bold(true);
    let _ = stream.set_color(&spec);
    let _ = writeln!(stream, "alarm: {alarm}");
    let _ = stream.reset();
}

fn build_machine(cli: &Cli) -> Result<Alto, RomImageError> {
    let system_type = SystemType::from(cli.system_type);
    match &cli.rom_dir {
        Some(dir) => {
            let constants = ConstantRom::load(dir)?;
            let acsource = AcSourceRom::load(dir)?;
            let microcode = MicrocodeRom::load(dir)?;
            Ok(Alto::with_roms(system_type, constants, acsource, &microcode))
        }
        None => {
            event!(
                Level::INFO,
                "no --rom-dir given, starting with blank ROMs"
            );
            Ok(Alto::new(system_type))
        }
    }
}

fn run_simulator() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // See the tracing_subscriber::fmt documentation for how to select
    // which trace messages get printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let mut alto = build_machine(&cli)?;
    event!(
        Level::INFO,
        "running {} for {} cycles",
        alto.system_type(),
        cli.steps
    );

    match alto.run(cli.steps) {
        Ok(()) => {
            event!(
                Level::INFO,
                "finished in task {} at simulated time {}ns",
                alto.current_task(),
                alto.simulated_time_nsec()
            );
            Ok(0)
        }
        Err(alarm) => {
            report_alarm(&alarm);
            Ok(1)
        }
    }
}

fn main() {
    match run_simulator() {
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Ok(code) => {
            std::process::exit(code);
        }
    }
}
