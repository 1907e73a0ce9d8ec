use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::info;

use bakery_tabling::model::{BakeryModel, DrawRule, EntryRule};
use bakery_tabling::search::{Checker, CheckerConfig, Outcome};
use bakery_tabling::table::Subsumption;
use bakery_tabling::trace::{LogSink, Silent, WriterSink};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of processes.
    #[arg(value_name = "INT", default_value = "2")]
    n: usize,

    /// Print every visited state.
    #[arg(long)]
    trace: bool,

    /// Log every visited state at info level instead of printing it.
    #[arg(long, conflicts_with = "trace")]
    trace_log: bool,

    /// Do not expand states deeper than this.
    #[arg(long, value_name = "INT")]
    max_depth: Option<usize>,

    /// Give up after this many seconds.
    #[arg(long, value_name = "SECS")]
    time_limit: Option<f64>,

    /// Give up after visiting this many states.
    #[arg(long, value_name = "INT")]
    max_states: Option<usize>,

    /// How a new ticket relates to the tickets already drawn.
    #[arg(long, value_enum, default_value_t = Draw::Strict)]
    draw: Draw,

    /// What a process requires of the other tickets to enter.
    #[arg(long, value_enum, default_value_t = Entry::Strict)]
    entry: Entry,

    /// Subsumption check used by the table.
    #[arg(long, value_enum, default_value_t = Check::PerRegion)]
    subsumption: Check,

    /// Keep searching after the first violation.
    #[arg(long)]
    all_violations: bool,

    #[arg(long, value_enum, default_value_t = Level::Warn)]
    log_level: Level,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Draw {
    Strict,
    Weak,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Entry {
    Strict,
    NonStrict,
    Unguarded,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Check {
    PerRegion,
    Union,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Level {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Level> for simplelog::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Off => simplelog::LevelFilter::Off,
            Level::Error => simplelog::LevelFilter::Error,
            Level::Warn => simplelog::LevelFilter::Warn,
            Level::Info => simplelog::LevelFilter::Info,
            Level::Debug => simplelog::LevelFilter::Debug,
            Level::Trace => simplelog::LevelFilter::Trace,
        }
    }
}

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        args.log_level.into(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;
    info!("args = {:?}", args);

    let mut config = CheckerConfig::default()
        .with_processes(args.n)
        .with_stop_at_first_violation(!args.all_violations)
        .with_subsumption(match args.subsumption {
            Check::PerRegion => Subsumption::PerRegion,
            Check::Union => Subsumption::Union,
        });
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    if let Some(secs) = args.time_limit {
        config = config.with_time_limit(Duration::try_from_secs_f64(secs)?);
    }
    if let Some(states) = args.max_states {
        config = config.with_max_states(states);
    }

    let model = BakeryModel::default()
        .with_draw(match args.draw {
            Draw::Strict => DrawRule::Strict,
            Draw::Weak => DrawRule::Weak,
        })
        .with_entry(match args.entry {
            Entry::Strict => EntryRule::Strict,
            Entry::NonStrict => EntryRule::NonStrict,
            Entry::Unguarded => EntryRule::Unguarded,
        });

    let checker = Checker::new(config, model)?;
    let report = if args.trace {
        let mut sink = WriterSink::new(BufWriter::new(std::io::stdout().lock()));
        let report = checker.run(&mut sink);
        sink.into_inner().flush()?;
        report
    } else if args.trace_log {
        checker.run(&mut LogSink)
    } else {
        checker.run(&mut Silent)
    };

    println!("{}", report.outcome);
    if let Outcome::Violation(witness) = &report.outcome {
        println!("{}", witness);
    }
    for (i, witness) in report.further_violations.iter().enumerate() {
        println!("violation #{}: {}", i + 2, witness);
    }
    println!("stats: {}", report.stats);

    Ok(match report.outcome {
        Outcome::NoViolation => ExitCode::SUCCESS,
        Outcome::Violation(_) => ExitCode::from(1),
        Outcome::Inconclusive(_) => ExitCode::from(2),
    })
}
