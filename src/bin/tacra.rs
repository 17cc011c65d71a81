//! The register allocator driver.
//!
//! Reads a textual three-address code module, allocates every function and
//! prints where each variable ended up.

use std::{fs, io, process::ExitCode};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tacra::{
    backend::reg_alloc::{
        live_interval_analysis,
        AllocatorConfig,
        ControlFlowGraph,
        GraphColoringAllocation,
        InterferenceGraph,
        RegAllocError,
    },
    ir::{
        text::{parse_module, ParseError},
        Function,
        Module,
    },
};
use thiserror::Error;

const DUMPS: [&str; 4] = ["blocks", "liveness", "intervals", "interference"];

#[derive(Debug, Error)]
enum DriverError {
    #[error("cannot read `{path}`: {source}")]
    Io { path: String, source: io::Error },

    #[error("{path}:{source}")]
    Parse { path: String, source: ParseError },

    #[error("while allocating `{function}`: {source}")]
    Alloc {
        function: String,
        source: RegAllocError,
    },
}

fn cli() -> Command {
    Command::new("tacra")
        .about("Graph coloring register allocation for three-address code")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("The three-address code module to allocate")
                .required(true),
        )
        .arg(
            Arg::new("int-regs")
                .long("int-regs")
                .value_name("N")
                .help("Use only the first N general purpose registers")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("float-regs")
                .long("float-regs")
                .value_name("N")
                .help("Use only the first N floating point registers")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .value_name("WHAT")
                .help("Print an intermediate result, may be repeated")
                .value_parser(DUMPS)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .help("Log more, may be repeated")
                .action(ArgAction::Count),
        )
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG, when set, wins over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn config_from(matches: &ArgMatches) -> AllocatorConfig {
    let mut config = AllocatorConfig::default();
    if let Some(n) = matches.get_one::<usize>("int-regs") {
        config.int_regs.truncate(*n);
    }
    if let Some(n) = matches.get_one::<usize>("float-regs") {
        config.float_regs.truncate(*n);
    }
    config
}

fn dump(cfg: &mut ControlFlowGraph, func: &Function, module: &Module, what: &str) {
    cfg.analyze_liveness();
    let symbols = &module.symbols;
    match what {
        "blocks" => print!("{}", cfg.display(symbols)),
        "liveness" => print!(
            "{}",
            live_interval_analysis::pretty_display(cfg, func, symbols)
        ),
        "intervals" => print!("{}", live_interval_analysis::display(cfg, symbols)),
        "interference" => {
            let graph = InterferenceGraph::build(cfg);
            print!(
                "{}",
                graph.to_mermaid(|var| cfg.vars().var(var).name(symbols).to_string())
            );
        }
        _ => log::warn!("unknown dump `{}`", what),
    }
}

fn run(matches: &ArgMatches) -> Result<(), DriverError> {
    let path = matches
        .get_one::<String>("input")
        .cloned()
        .unwrap_or_default();
    let src = fs::read_to_string(&path).map_err(|source| DriverError::Io {
        path: path.clone(),
        source,
    })?;
    let module = parse_module(&src).map_err(|source| DriverError::Parse {
        path: path.clone(),
        source,
    })?;

    let dumps: Vec<&String> = matches
        .get_many::<String>("dump")
        .map(|values| values.collect())
        .unwrap_or_default();

    let mut allocator = GraphColoringAllocation::new(config_from(matches));
    for func in &module.funcs {
        let alloc_err = |source| DriverError::Alloc {
            function: func.name.clone(),
            source,
        };

        let mut cfg = ControlFlowGraph::build(func, &module.symbols).map_err(alloc_err)?;
        println!("function {}", func.name);
        for what in &dumps {
            println!("-- {} --", what);
            dump(&mut cfg, func, &module, what);
        }

        let result = allocator
            .allocate_registers(&mut cfg, &module.symbols)
            .map_err(alloc_err)?;
        print!("{}", result.display(&module.symbols));
        println!();
    }

    log::info!(
        "allocated {} functions, {} variables spilled in total",
        module.funcs.len(),
        allocator.total_spills
    );

    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_logger(matches.get_count("verbose"));

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
