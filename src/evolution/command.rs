//! Evaluator that measures by running an external benchmark command.
//!
//! The command receives the fixed arguments from its [`CommandSpec`], then
//! one rendered argument per gene. Run settings are exported as
//! `EVOTUNE_*` environment variables. The last non-empty line the command
//! prints to stdout must read `<score> [unit]`.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::schema::{CommandSpec, Measurement, ParameterVector, RunConfig, Verbosity};

use super::evaluator::{EvalError, Evaluator};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs one process per measurement.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    spec: CommandSpec,
    kill_after: Option<Duration>,
}

impl CommandEvaluator {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            kill_after: None,
        }
    }

    /// Kill the child process once it has run for `limit`.
    pub fn with_kill_after(mut self, limit: Option<Duration>) -> Self {
        self.kill_after = limit;
        self
    }

    fn execute(&self, gene_args: &[String], run: &RunConfig) -> Result<Measurement, EvalError> {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .args(gene_args)
            .envs(run.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(match run.verbosity {
                Verbosity::Silent => Stdio::null(),
                Verbosity::Normal | Verbosity::Extra => Stdio::inherit(),
            });

        debug!("Running {} {}", self.spec.program, gene_args.join(" "));
        let mut child = command.spawn()?;

        // Drain stdout on its own thread so a chatty child never blocks on a full pipe.
        let stdout = child.stdout.take();
        let reader = thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut output = Vec::new();
            if let Some(mut out) = stdout {
                out.read_to_end(&mut output)?;
            }
            Ok(output)
        });

        let status = self.wait(&mut child)?;
        let bytes = reader
            .join()
            .map_err(|_| EvalError::Panicked)?
            .map_err(EvalError::Output)?;
        // Benchmarks may print warnings in a legacy encoding before the score.
        let output = String::from_utf8_lossy(&bytes);
        trace!("{} printed: {}", self.spec.program, output.trim_end());

        if !status.success() {
            return Err(EvalError::Failed(format!(
                "{} exited with {}",
                self.spec.program, status
            )));
        }
        parse_measurement(&output)
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, EvalError> {
        let Some(limit) = self.kill_after else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                debug!("Killing {} after {:?}", self.spec.program, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Err(EvalError::TimedOut(limit));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, params: &ParameterVector, run: &RunConfig) -> Result<Measurement, EvalError> {
        self.execute(&params.to_args(), run)
    }

    fn baseline(&self, run: &RunConfig) -> Result<Measurement, EvalError> {
        self.execute(&[], run)
    }

    fn name(&self) -> &str {
        &self.spec.program
    }
}

/// Parse `<score> [unit]` from the last non-empty line of `output`.
pub fn parse_measurement(output: &str) -> Result<Measurement, EvalError> {
    let line = output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .ok_or_else(|| EvalError::Parse("no output".to_string()))?;

    let (score, unit) = match line.split_once(char::is_whitespace) {
        Some((score, unit)) => (score, unit.trim()),
        None => (line, ""),
    };
    let score: f64 = score
        .parse()
        .map_err(|_| EvalError::Parse(format!("not a score: {line:?}")))?;

    Ok(Measurement::new(score, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measurement() {
        let m = parse_measurement("warming up\n\n 1234.5 ops/ms \n\n").unwrap();
        assert_eq!(m.score, 1234.5);
        assert_eq!(m.unit, "ops/ms");

        let bare = parse_measurement("17").unwrap();
        assert_eq!(bare.score, 17.0);
        assert_eq!(bare.unit, "");
    }

    #[test]
    fn test_parse_measurement_rejects_garbage() {
        assert!(matches!(parse_measurement(""), Err(EvalError::Parse(_))));
        assert!(matches!(parse_measurement("  \n "), Err(EvalError::Parse(_))));
        assert!(matches!(
            parse_measurement("score: fast"),
            Err(EvalError::Parse(_))
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::schema::{GeneSet, GeneSpec};
        use std::sync::Arc;

        fn shell(script: &str) -> CommandEvaluator {
            CommandEvaluator::new(CommandSpec {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "evotune".to_string()],
            })
        }

        #[test]
        fn test_baseline_reads_score() {
            let m = shell("echo 42.5 ops/ms")
                .baseline(&RunConfig::default())
                .unwrap();
            assert_eq!(m.score, 42.5);
            assert_eq!(m.unit, "ops/ms");
        }

        #[test]
        fn test_gene_args_passed() {
            let genes = Arc::new(
                GeneSet::new(vec![GeneSpec::int("Depth", 7, 0, 10)])
                    .with_arg_template("{value}"),
            );
            let m = shell("echo $1 units")
                .evaluate(&genes.defaults(), &RunConfig::default())
                .unwrap();
            assert_eq!(m.score, 7.0);
        }

        #[test]
        fn test_run_config_exported() {
            let run = RunConfig {
                forks: 3,
                ..RunConfig::default()
            };
            let m = shell("echo $EVOTUNE_FORKS").baseline(&run).unwrap();
            assert_eq!(m.score, 3.0);
        }

        #[test]
        fn test_non_utf8_output_keeps_score() {
            let m = shell(r"printf 'warn \377\n42.0 ops/ms\n'")
                .baseline(&RunConfig::default())
                .unwrap();
            assert_eq!(m.score, 42.0);
            assert_eq!(m.unit, "ops/ms");
        }

        #[test]
        fn test_non_zero_exit_fails() {
            let result = shell("echo 1.0; exit 3").baseline(&RunConfig::default());
            assert!(matches!(result, Err(EvalError::Failed(_))));
        }

        #[test]
        fn test_missing_program() {
            let evaluator = CommandEvaluator::new(CommandSpec {
                program: "/nonexistent/evotune-bench".to_string(),
                args: Vec::new(),
            });
            assert!(matches!(
                evaluator.baseline(&RunConfig::default()),
                Err(EvalError::Spawn(_))
            ));
        }

        #[test]
        fn test_overrunning_child_killed() {
            let start = Instant::now();
            let result = shell("sleep 5; echo 1")
                .with_kill_after(Some(Duration::from_millis(100)))
                .baseline(&RunConfig::default());
            assert!(matches!(result, Err(EvalError::TimedOut(_))));
            assert!(start.elapsed() < Duration::from_secs(4));
        }
    }
}
