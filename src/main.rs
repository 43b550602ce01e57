use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sml::{ExecutionLimits, Machine, Register, SmlError, Translator};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an SML program", long_about = None)]
struct Args {
    /// Path to the SML source file
    program: PathBuf,

    /// Initial register value, e.g. `--set EAX=5` (repeatable)
    #[arg(long = "set", value_name = "REG=VALUE", value_parser = parse_assignment)]
    set: Vec<(Register, i32)>,

    /// Maximum number of executed steps (overrides the limits file)
    #[arg(long)]
    max_steps: Option<u64>,

    /// JSON file with execution limits
    #[arg(long, value_name = "FILE")]
    limits: Option<PathBuf>,

    /// Print the final machine state as JSON
    #[arg(long)]
    json: bool,

    /// Print run metrics in Prometheus text format
    #[arg(long)]
    metrics: bool,

    /// Print the translated program and labels before running
    #[arg(long)]
    dump: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_assignment(s: &str) -> Result<(Register, i32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected REG=VALUE, got '{}'", s))?;
    let register = name.trim().parse::<Register>().map_err(|e| e.to_string())?;
    let value = value
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid value '{}': {}", value, e))?;
    Ok((register, value))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> sml::Result<()> {
    let mut limits = match &args.limits {
        Some(path) => ExecutionLimits::from_json_file(path)?,
        None => ExecutionLimits::default(),
    };
    if let Some(max_steps) = args.max_steps {
        limits.max_steps = max_steps;
    }

    let metrics = if args.metrics {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| SmlError::ConfigError(format!("metrics recorder: {}", e)))?;
        Some(handle)
    } else {
        None
    };

    let program = Translator::with_limits(limits.clone()).translate_file(&args.program)?;
    info!(
        path = %args.program.display(),
        instructions = program.len(),
        "loaded program"
    );

    if args.dump {
        print!("{}", program);
        println!("labels: {}", program.labels());
    }

    let mut machine = Machine::new(program).with_limits(limits);
    if !args.json {
        machine = machine.with_echo(Box::new(io::stdout()));
    }
    for &(register, value) in &args.set {
        machine.registers_mut().set(register, value);
    }

    let result = machine.execute();
    if result.is_ok() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
        } else {
            println!("{}", machine.registers());
        }
    }
    if let Some(handle) = &metrics {
        print!("{}", handle.render());
    }
    result
}
