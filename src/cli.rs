use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::commands::generate::{self, GenerateOptions};
use crate::commands::reconcile::{self, ReconcileOptions};
use crate::commands::status;
use crate::logging::{self, LogLevel};

#[derive(Parser)]
#[command(name = "chunk-reconcile")]
#[command(about = "Reconcile a chunked document set with its file registry and references")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (off, error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Shortcut for --log-level=debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a chunk plan to the working directory
    Reconcile(ReconcileArgs),
    /// Summarise the file registry of a working directory
    Status(StatusArgs),
    /// Print generated chunk filenames and element ids
    Generate(GenerateArgs),
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Chunk plan (JSON) produced by the chunk policy
    #[arg(long)]
    pub plan: PathBuf,

    /// Working directory (defaults to CHUNK_TEMP_DIR or the current directory)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Output transformation type, e.g. `xhtml` or `eclipsehelp`
    #[arg(long)]
    pub transtype: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(long, default_value = "Chunk")]
    pub prefix: String,

    #[arg(long = "ext", default_value = ".dita")]
    pub extension: String,

    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// `random` or `counter`; defaults to the configured scheme
    #[arg(long)]
    pub scheme: Option<String>,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "failed" };
    println!("{} {status}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level,
        (None, true) => LogLevel::Debug,
        (None, false) => LogLevel::default(),
    };
    logging::init(level);

    let report = match cli.command {
        Command::Reconcile(args) => reconcile::run(&ReconcileOptions {
            plan: args.plan,
            temp_dir: args.temp_dir,
            transtype: args.transtype,
        })?,
        Command::Status(args) => status::run(args.temp_dir.as_deref())?,
        Command::Generate(args) => generate::run(&GenerateOptions {
            prefix: args.prefix,
            extension: args.extension,
            count: args.count,
            scheme: args.scheme,
        })?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
