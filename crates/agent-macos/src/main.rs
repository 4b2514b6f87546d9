//! agent-macos - audit trail and code signature diagnostics
//!
//! - agent-macos audit     - decode an OpenBSM trail (file or /dev/auditpipe)
//! - agent-macos codesign  - classify executables by signing authority

use agent_macos::bsm::{
    aue_code, render, BsmReader, DecodeError, DecoderConfig, EnvCapture, EventFilter, Outcome,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edr_core::AuditEvent;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// macOS audit and code signing diagnostics
#[derive(Parser)]
#[command(name = "agent-macos")]
#[command(about = "Decode OpenBSM audit trails and verify code signatures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode audit records and print one line per event
    Audit {
        /// Trail file or audit pipe to read
        #[arg(short, long, env = "EDR_AUDIT_INPUT", default_value = "/dev/auditpipe")]
        input: PathBuf,
        /// Exec environment capture
        #[arg(long, value_enum, default_value_t = EnvCapture::None)]
        env: EnvCapture,
        /// Only decode these event types (code or AUE name), repeatable
        #[arg(short = 't', long = "type", value_parser = parse_event_type)]
        types: Vec<u16>,
        /// Emit JSON lines instead of text
        #[arg(long)]
        json: bool,
        /// Stop after this many decoded events
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Decoder settings (JSON)
        #[arg(long, env = "EDR_DECODER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Verify code signatures
    Codesign {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Emit JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_event_type(s: &str) -> Result<u16, String> {
    aue_code(s).ok_or_else(|| format!("unknown audit event type '{}'", s))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Audit {
            input,
            env,
            types,
            json,
            limit,
            config,
        } => run_audit(&input, env, EventFilter::only(types), json, limit, config.as_deref()),
        Commands::Codesign { paths, json } => run_codesign(&paths, json),
    }
}

fn load_decoder_config(path: Option<&Path>) -> Result<DecoderConfig> {
    let Some(path) = path else {
        return Ok(DecoderConfig::probe());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read decoder config {}", path.display()))?;
    let mut config: DecoderConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid decoder config {}", path.display()))?;
    if config.null_device.is_none() {
        config.null_device = DecoderConfig::probe().null_device;
    }
    Ok(config)
}

fn run_audit(
    input: &Path,
    env: EnvCapture,
    filter: EventFilter,
    json: bool,
    limit: Option<usize>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_decoder_config(config)?;
    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    info!(input = %input.display(), ?env, "reading audit trail");

    let mut reader = BsmReader::new(BufReader::new(file), config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut event = AuditEvent::new();
    let (mut decoded, mut skipped) = (0usize, 0usize);

    while limit.map_or(true, |n| decoded < n) {
        match reader.read_event(&mut event, &filter, env) {
            Ok(Outcome::Decoded) => {
                decoded += 1;
                if json {
                    serde_json::to_writer(&mut out, &event)?;
                    writeln!(out)?;
                } else {
                    render(&mut out, &event)?;
                }
            }
            Ok(Outcome::Skipped) => skipped += 1,
            Err(DecodeError::EndOfStream) => break,
            // the whole record was consumed, the stream is still aligned
            Err(DecodeError::OutOfMemory) => {
                warn!(event_type = event.event_type, "record dropped after allocation failure");
                skipped += 1;
            }
            Err(e) => return Err(e).context("audit trail decoding failed"),
        }
    }
    event.reset();
    out.flush()?;

    info!(decoded, skipped, "audit trail done");
    Ok(())
}

#[cfg(target_os = "macos")]
fn run_codesign(paths: &[PathBuf], json: bool) -> Result<()> {
    use agent_macos::codesign::macos::SecurityFramework;
    use agent_macos::CodesignVerifier;
    use edr_core::CodesignResult;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Line<'a> {
        path: &'a Path,
        #[serde(flatten)]
        result: &'a CodesignResult,
    }

    let verifier = CodesignVerifier::new(SecurityFramework)
        .context("failed to initialize code signing requirements")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for path in paths {
        match verifier.verify(path) {
            Ok(result) if json => {
                serde_json::to_writer(&mut out, &Line { path, result: &result })?;
                writeln!(out)?;
            }
            Ok(result) => write!(out, "{}:\n{}", path.display(), result)?,
            Err(e) => warn!(path = %path.display(), error = %e, "verification failed"),
        }
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_codesign(_paths: &[PathBuf], _json: bool) -> Result<()> {
    anyhow::bail!("code signature verification requires macOS")
}
