mod bench;
mod config;
mod coordinator;
mod errors;
mod logging;
mod shared_queue;
mod trace;
mod types;
mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use crate::config::{DelayRange, RunConfig};
use crate::coordinator::Coordinator;
use crate::errors::RunError;
use crate::trace::StdoutSink;

fn workload_args(command: clap::Command) -> clap::Command {
    command
        .arg(
            clap::Arg::new("producers")
                .long("producers")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            clap::Arg::new("consumers")
                .long("consumers")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(usize))
                .default_value("5"),
        )
        .arg(
            clap::Arg::new("items")
                .long("items")
                .help("items generated by each producer")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            clap::Arg::new("delay_min")
                .long("delay-min")
                .help("lower bound of the per-item delay, in seconds")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .default_value("0.1"),
        )
        .arg(
            clap::Arg::new("delay_max")
                .long("delay-max")
                .help("upper bound of the per-item delay, in seconds")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(f64))
                .default_value("0.3"),
        )
}

fn command() -> clap::Command {
    clap::Command::new("drain_pool")
        .about("Producer/consumer pool over a shared work queue with drain tracking")
        .arg(
            clap::Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(workload_args(
            clap::Command::new("run").about("run the workload and print the trace (default)"),
        ))
        .subcommand(
            workload_args(
                clap::Command::new("bench").about("run the workload once and print CSV timings"),
            )
            .arg(
                clap::Arg::new("validate")
                    .long("validate")
                    .help("capture the trace and check item conservation")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
}

fn run_config(args: &clap::ArgMatches) -> Result<RunConfig, RunError> {
    let count = |name: &str| args.get_one::<usize>(name).copied().unwrap_or_default();
    let seconds = |name: &str| args.get_one::<f64>(name).copied().unwrap_or_default();
    let config = RunConfig {
        producers: count("producers"),
        consumers: count("consumers"),
        items_per_producer: count("items"),
        delay: DelayRange::new(seconds("delay_min"), seconds("delay_max"))?,
    };
    config.validate()?;
    Ok(config)
}

fn exit_with_error(err: &RunError) -> ExitCode {
    eprintln!("error: {err}");
    match err {
        RunError::Config(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let matches = command().get_matches();
    logging::init(matches.get_flag("verbose"));

    let outcome = match matches.subcommand() {
        Some(("bench", arguments)) => run_config(arguments).and_then(|config| {
            let validate = arguments.get_flag("validate");
            bench::run_benchmark(config, validate)
        }),
        Some(("run", arguments)) => run_config(arguments).and_then(|config| {
            Coordinator::new(config, Arc::new(StdoutSink))
                .run()
                .map(|_| true)
        }),
        _ => Coordinator::new(RunConfig::default(), Arc::new(StdoutSink))
            .run()
            .map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => exit_with_error(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunConfig, RunError> {
        let matches = command()
            .try_get_matches_from(args)
            .expect("arguments parse");
        let (_, sub) = matches.subcommand().expect("subcommand given");
        run_config(sub)
    }

    #[test]
    fn run_defaults_match_config_defaults() {
        let config = parse(&["drain_pool", "run"]).expect("valid defaults");
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn bench_accepts_overrides() {
        let config = parse(&[
            "drain_pool",
            "bench",
            "--producers",
            "2",
            "--consumers",
            "1",
            "--items",
            "7",
            "--delay-min",
            "0",
            "--delay-max",
            "0",
            "--validate",
        ])
        .expect("valid overrides");
        assert_eq!(config.producers, 2);
        assert_eq!(config.consumers, 1);
        assert_eq!(config.items_per_producer, 7);
        assert_eq!(config.delay, DelayRange::none());
    }

    #[test]
    fn zero_producers_is_a_config_error() {
        let err = parse(&["drain_pool", "run", "--producers", "0"]).expect_err("rejected");
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn inverted_delay_is_a_config_error() {
        let err = parse(&["drain_pool", "run", "--delay-min", "0.5", "--delay-max", "0.1"])
            .expect_err("rejected");
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn command_definition_is_consistent() {
        command().debug_assert();
    }
}
