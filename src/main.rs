//! UEL - Unification in EL
//!
//! Command-line interface: reads a goal document and prints its unifiers.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use tracing::{debug, warn};

use uel::config::LogLevel;
use uel::sat::SatEncoder;
use uel::{Goal, ProcessorKind, SatBackendKind, UelConfig, UelError, Unifier, UnifierEnumerator};

#[derive(Parser)]
#[command(name = "uel")]
#[command(author = "UEL Rust Authors")]
#[command(version = env!("UEL_VERSION"))]
#[command(about = "Unification in the description logic EL", long_about = None)]
struct Cli {
    /// Goal document (JSON); reads stdin when omitted
    #[arg(value_name = "GOAL")]
    input: Option<PathBuf>,

    /// Unification processor (overrides the configuration)
    #[arg(short, long, value_enum)]
    processor: Option<ProcessorArg>,

    /// Only compute minimal unifiers
    #[arg(short, long)]
    minimize: bool,

    /// Use an external SAT solver command instead of the built-in one
    #[arg(long, value_name = "COMMAND")]
    sat_solver: Option<String>,

    /// Stop after this many unifiers (0 for all)
    #[arg(long, default_value = "0")]
    max: usize,

    /// Only print the number of unifiers
    #[arg(long)]
    count: bool,

    /// Print the SAT encoding of the goal in DIMACS format and exit
    #[arg(long)]
    dimacs: bool,

    /// Print solver statistics after enumeration
    #[arg(long)]
    info: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Configuration file (defaults to the usual search path)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ProcessorArg {
    /// SAT encoding
    Sat,
    /// Goal-oriented rules
    Rule,
    /// Answer set programming (clingo)
    Asp,
}

impl From<ProcessorArg> for ProcessorKind {
    fn from(arg: ProcessorArg) -> Self {
        match arg {
            ProcessorArg::Sat => ProcessorKind::Sat,
            ProcessorArg::Rule => ProcessorKind::Rule,
            ProcessorArg::Asp => ProcessorKind::Asp,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `X := A ⊓ ∃r.B` lines
    Text,
    /// One JSON object per unifier
    Json,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        let status = err
            .downcast_ref::<UelError>()
            .map_or(1, |e| e.code.exit_status());
        std::process::exit(status);
    }
}

fn load_config(cli: &Cli) -> Result<UelConfig> {
    let mut config = match &cli.config {
        Some(path) => UelConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => UelConfig::load().context("Failed to load configuration")?,
    };
    if let Some(processor) = cli.processor {
        config.solver.processor = processor.into();
    }
    if cli.minimize {
        config.solver.minimize = true;
    }
    if let Some(command) = &cli.sat_solver {
        config.sat.backend = SatBackendKind::External;
        config.sat.command = command.clone();
    }
    if cli.verbose {
        config.general.log_level = LogLevel::Verbose;
    }
    if cli.quiet {
        config.general.log_level = LogLevel::Quiet;
    }
    Ok(config)
}

fn init_logging(level: LogLevel) {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level.tracing_level())
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber is already installed");
    }
}

fn read_goal(cli: &Cli) -> Result<Goal> {
    let (text, source) = match &cli.input {
        Some(path) => (
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read goal: {}", path.display()))?,
            path.display().to_string(),
        ),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read goal from stdin")?;
            (text, "<stdin>".to_string())
        }
    };
    let goal = Goal::from_json(&text).map_err(|e| e.with_context("file", source))?;
    Ok(goal)
}

fn render_json(goal: &Goal, unifier: &Unifier) -> Result<String> {
    let store = goal.store();
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for definition in unifier.projection(store.user_variables()).definitions() {
        let atoms = definition.definiens.iter().map(|&a| store.render(a)).collect();
        map.insert(store.render(definition.defined), atoms);
    }
    Ok(serde_json::to_string(&map)?)
}

fn run(cli: Cli) -> Result<()> {
    if cli.print_config {
        print!("{}", UelConfig::default_config_content());
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging(config.general.log_level);
    let goal = read_goal(&cli)?;
    debug!(goal = goal.id(), axioms = goal.axiom_count(), atoms = goal.store().len(), "goal loaded");

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("Failed to create: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    if cli.dimacs {
        let formula = SatEncoder::new(&goal, config.solver.minimize).encode()?;
        let text = if formula.is_weighted() {
            formula.to_wcnf()
        } else {
            formula.to_dimacs()
        };
        out.write_all(text.as_bytes())?;
        return Ok(());
    }

    if config.solver.processor != ProcessorKind::Sat && config.sat.backend == SatBackendKind::External {
        warn!("the SAT backend setting only applies to the sat processor");
    }

    let mut enumerator = UnifierEnumerator::new(&goal, config);
    let limit = (cli.max > 0).then_some(cli.max);
    let mut found = 0usize;
    while limit.map_or(true, |l| found < l) && enumerator.compute_next_unifier()? {
        found += 1;
        if cli.count {
            continue;
        }
        let unifier = enumerator.unifier()?;
        match cli.format {
            OutputFormat::Text => {
                writeln!(out, "Unifier {}:", found)?;
                writeln!(out, "{}", unifier.render(goal.store(), Some(goal.store().user_variables())))?;
                writeln!(out)?;
            }
            OutputFormat::Json => writeln!(out, "{}", render_json(&goal, unifier)?)?,
        }
    }

    if cli.count {
        writeln!(out, "{}", found)?;
    } else if found == 0 && cli.format == OutputFormat::Text {
        writeln!(out, "No unifiers.")?;
    }

    if cli.info {
        let stats = enumerator.stats();
        eprintln!("uel {} ({}, {})", env!("UEL_VERSION"), env!("UEL_TARGET"), env!("UEL_PROFILE"));
        eprintln!("{}", stats);
        if enumerator.duplicates() > 0 {
            eprintln!("duplicates skipped: {}", enumerator.duplicates());
        }
    }
    out.flush()?;
    Ok(())
}
