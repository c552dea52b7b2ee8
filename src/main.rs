//! Evotune CLI - Tune benchmark parameters from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use evotune::{
    CommandEvaluator, EvolutionEngine, TunerConfig, TunerError,
    schema::{CommandSpec, ConfigError},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [--output result.json]", args[0]);
        eprintln!();
        eprintln!("Evolve benchmark parameters with a genetic algorithm.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to tuning configuration file");
        eprintln!("  --output     Write the final result as JSON");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let output_path = match args.get(2).map(String::as_str) {
        Some("--output") => match args.get(3) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                eprintln!("--output requires a path");
                std::process::exit(1);
            }
        },
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            std::process::exit(1);
        }
        None => None,
    };

    let config = TunerConfig::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let Some(command) = config.command.clone() else {
        eprintln!("Error loading config: {}", TunerError::from(ConfigError::MissingCommand));
        std::process::exit(1);
    };

    println!("Evotune");
    println!("=======");
    println!("Command: {} {}", command.program, command.args.join(" "));
    println!("Genes: {}", config.genes.len());
    println!(
        "Population: {} ({} elite), generations: {}",
        config.population, config.elite, config.generations
    );
    println!();

    let evaluator = CommandEvaluator::new(command).with_kill_after(config.evaluation_timeout());
    let mut engine = EvolutionEngine::new(config, Arc::new(evaluator)).unwrap_or_else(|e| {
        eprintln!("Error creating engine: {}", e);
        std::process::exit(1);
    });

    let result = engine
        .run_with_callback(|report| {
            println!("{}", report);
        })
        .unwrap_or_else(|e| {
            eprintln!("Tuning aborted: {}", e);
            std::process::exit(1);
        });

    println!(
        "Finished {} generations: {} evaluations ({} failed) in {:.1}s",
        result.stats.generations,
        result.stats.total_evaluations,
        result.stats.failed_evaluations,
        result.stats.elapsed_seconds
    );
    if let Some(best) = &result.best {
        println!("Best: {}", best.parameters);
    }

    if let Some(path) = output_path {
        let written = serde_json::to_string_pretty(&result)
            .map_err(TunerError::from)
            .and_then(|json| fs::write(&path, json).map_err(TunerError::from));
        if let Err(e) = written {
            eprintln!("Error writing {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("Result written to {}", path.display());
    }
}

fn print_example_config() {
    let config = TunerConfig {
        command: Some(CommandSpec {
            program: "./bench.sh".to_string(),
            args: Vec::new(),
        }),
        random_seed: Some(42),
        ..TunerConfig::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        }
    }
}
