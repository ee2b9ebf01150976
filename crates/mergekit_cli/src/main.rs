use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgAction, Parser};
use mergekit_merge::{
    SpecMergeOptions, derive_default_output_name, merge_sources, run_merge,
};
use tracing_subscriber::EnvFilter;

/// Merge the "현황" / "신규자" / "중지자" sheets of several workbooks into one.
#[derive(Debug, Parser)]
#[command(name = "mergekit", version)]
struct Args {
    /// Workbook files or directories (direct `*.xlsx`/`*.xls` children), in merge order.
    #[arg(required = true, value_name = "INPUTS")]
    inputs: Vec<PathBuf>,

    /// Output workbook. Defaults to `병합결과_{YYYY-MM}.xlsx` in the working directory.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Target sheet name (repeatable). Replaces the default target set.
    #[arg(long = "sheet", value_name = "NAME")]
    sheets: Vec<String>,

    /// Column written as text (repeatable). Replaces the default identifier columns.
    #[arg(long = "text-col", value_name = "NAME")]
    cols_text: Vec<String>,

    /// Skip the retroactive-months column.
    #[arg(long)]
    no_retro: bool,

    /// Date snapshot for the retroactive-months column. Defaults to today.
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Maximum reader threads (default: serial).
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Merge and print the per-sheet summary without writing.
    #[arg(long)]
    dry_run: bool,

    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD ({err})"))
}

impl Args {
    fn derive_merge_options(&self) -> SpecMergeOptions {
        let mut options = SpecMergeOptions {
            num_workers_max: self.workers,
            ..SpecMergeOptions::default()
        };
        if !self.sheets.is_empty() {
            options.sheet_names = self.sheets.clone();
        }
        if !self.cols_text.is_empty() {
            options.write_options.cols_text = self.cols_text.clone();
        }
        if self.no_retro {
            options.policy_retro = None;
        }
        options
    }
}

fn init_tracing(verbose: u8) {
    let c_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(c_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let options = args.derive_merge_options();
    tracing::debug!(%today, ?options, "merge options");

    if args.dry_run {
        let (result, report) =
            merge_sources(&args.inputs, &options, today).context("merge failed")?;
        for sheet in &result.sheets {
            println!(
                "{}\trows={}\tcols={}\tsources={}",
                sheet.sheet_name,
                sheet.table.height(),
                sheet.table.width(),
                sheet.sources.len()
            );
        }
        println!("{}", report.format("[DRY-RUN]"));
        return Ok(());
    }

    let path_out = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(derive_default_output_name(today)));
    let report = run_merge(&args.inputs, &path_out, &options, today)
        .with_context(|| format!("merge into {} failed", path_out.display()))?;
    println!("{report}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(args)
}
