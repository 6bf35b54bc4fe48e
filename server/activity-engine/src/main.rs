//! Binary entrypoint: read one ReportInput JSON object from stdin, write one
//! ReportOutput (or ErrorOutput) JSON object to stdout.
//!
//! Logs go to stderr; set RUST_LOG to raise verbosity.

use activity_engine::types::ErrorOutput;
use activity_engine::{Config, Engine, EngineError, ReportInput};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .init();

  let code = match run_binary() {
    Ok(()) => 0,
    Err(e) => {
      let err = match &e {
        EngineError::Validation { field, reason } => {
          ErrorOutput::new(reason.clone()).with_field(field.clone())
        }
        _ => ErrorOutput::new(e.to_string()),
      };
      let mut out = io::stdout().lock();
      let _ = serde_json::to_writer(&mut out, &err);
      let _ = writeln!(out);
      1
    }
  };
  std::process::exit(code);
}

fn run_binary() -> Result<(), EngineError> {
  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let input: ReportInput = serde_json::from_str(&raw)?;

  let engine = Engine::new(input.config.clone().unwrap_or_else(Config::default))?;
  let output = engine.run(&input, chrono::Utc::now())?;

  let mut out = io::BufWriter::new(io::stdout().lock());
  serde_json::to_writer(&mut out, &output)?;
  writeln!(out)?;
  out.flush()?;
  Ok(())
}
