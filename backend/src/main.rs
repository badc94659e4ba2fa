//! Datalens CLI - Chart recommendations and BI reports from tabular samples
//!
//! # Main Commands
//!
//! ```bash
//! datalens serve                        # Start HTTP server (port 3000)
//! datalens analyze sales.csv            # Analyze a CSV (or input-contract JSON)
//! datalens batch a.csv b.csv c.json     # Analyze several datasets independently
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! datalens parse sales.csv              # CSV to {headers, sampleData} JSON
//! datalens profile sales.csv            # Column types and data quality
//! datalens check output.json            # Output contract compliance
//! datalens format output.json --robust  # Repair an output object
//! ```

use clap::{Parser, Subcommand};
use datalens::{
    analyze_columns, analyze_detailed, assess_quality, check_compliance, format_output,
    parse_csv_file_auto, validate_input, AnalysisOptions, FormatMode, DEFAULT_SAMPLE_ROWS,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "datalens")]
#[command(about = "Recommend charts and write a BI report for a tabular sample", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output the {headers, sampleData} JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Sample rows to keep
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        rows: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full analysis: charts + markdown report
    Analyze {
        /// Input CSV file, or JSON following the input contract
        input: PathBuf,

        /// Sample rows to keep from a CSV
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        rows: usize,

        /// Output file for the JSON output (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the markdown report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show inferred column types and data quality
    Profile {
        /// Input CSV or JSON file
        input: PathBuf,

        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        rows: usize,
    },

    /// Check an output JSON file against the output contract
    Check {
        /// Output JSON file
        input: PathBuf,
    },

    /// Format an output JSON file (strict by default)
    Format {
        /// Output JSON file
        input: PathBuf,

        /// Repair instead of rejecting
        #[arg(long)]
        robust: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze several datasets; one failure never stops the others
    Batch {
        /// Input CSV or JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write `<name>.analysis.json` files here
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        rows: usize,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, rows, output } => cmd_parse(&input, rows, output.as_deref()),

        Commands::Analyze {
            input,
            rows,
            output,
            report,
        } => cmd_analyze(&input, rows, output.as_deref(), report.as_deref()),

        Commands::Profile { input, rows } => cmd_profile(&input, rows),

        Commands::Check { input } => cmd_check(&input),

        Commands::Format {
            input,
            robust,
            output,
        } => cmd_format(&input, robust, output.as_deref()),

        Commands::Batch {
            inputs,
            output_dir,
            rows,
        } => cmd_batch(&inputs, output_dir.as_deref(), rows),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Read an input-contract payload from JSON, or build one from a CSV.
fn load_input(path: &Path, rows: usize) -> Result<Value, Box<dyn std::error::Error>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let content = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&content)?);
    }

    let parsed = parse_csv_file_auto(path, rows)?;
    eprintln!(
        "   Encoding: {}, delimiter: '{}', {} of {} rows sampled",
        parsed.encoding,
        format_delimiter(parsed.delimiter),
        parsed.input.row_count(),
        parsed.total_rows
    );
    Ok(serde_json::to_value(&parsed.input)?)
}

fn cmd_parse(input: &Path, rows: usize, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let parsed = parse_csv_file_auto(input, rows)?;
    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(parsed.delimiter));
    eprintln!("   Columns: {}", parsed.input.headers.join(", "));
    eprintln!(
        "✅ Parsed {} rows ({} sampled)",
        parsed.total_rows,
        parsed.input.row_count()
    );

    let json = serde_json::to_string_pretty(&parsed.input)?;
    write_output(&json, output)
}

fn cmd_analyze(input: &Path, rows: usize, output: Option<&Path>, report: Option<&Path>) -> CliResult {
    eprintln!("📊 Analyzing: {}", input.display());

    let raw = load_input(input, rows)?;
    let options = AnalysisOptions::from_env();
    let detailed = analyze_detailed(&raw, &options).map_err(|e| {
        for suggestion in e.suggestions() {
            eprintln!("   💡 {}", suggestion);
        }
        format!("[{}] {}", e.code(), e)
    })?;

    eprintln!("   Domain: {}", detailed.insights.industry_domain);
    eprintln!("   Charts: {}", detailed.output.charts_to_generate.len());
    for chart in &detailed.output.charts_to_generate {
        eprintln!("     - [{}] {}", chart.chart_type, chart.title);
    }
    for warning in &detailed.warnings {
        eprintln!("   ⚠️  {}", warning);
    }

    if let Some(report_path) = report {
        fs::write(report_path, &detailed.output.full_analysis_report_markdown)?;
        eprintln!("   💾 Report saved to: {}", report_path.display());
    }

    let json = serde_json::to_string_pretty(&detailed.output)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done in {} ms", detailed.elapsed_ms);
    Ok(())
}

fn cmd_profile(input: &Path, rows: usize) -> CliResult {
    eprintln!("🔎 Profiling: {}", input.display());

    let raw = load_input(input, rows)?;
    let options = AnalysisOptions::from_env();
    let data = validate_input(&raw).map_err(|e| format!("[{}] {}", e.code(), e))?;
    let quality = assess_quality(&data);
    let columns = analyze_columns(&data, &options.thresholds);

    for column in &columns {
        eprintln!(
            "   {:<24} {:<12} {:>4} unique{}",
            column.name,
            column.inferred_type,
            column.unique_value_count,
            if column.has_missing { ", has missing" } else { "" }
        );
    }
    eprintln!(
        "\n   Completeness: {:.0}%  Consistency: {:.0}%",
        quality.completeness * 100.0,
        quality.consistency * 100.0
    );
    for issue in &quality.issues {
        eprintln!("   ⚠️  {}", issue);
    }

    let json = serde_json::to_string_pretty(&json!({ "columns": columns, "quality": quality }))?;
    println!("{}", json);
    Ok(())
}

fn cmd_check(input: &Path) -> CliResult {
    eprintln!("✔️  Checking: {}", input.display());

    let content = fs::read_to_string(input)?;
    let output: Value = serde_json::from_str(&content)?;
    let report = check_compliance(&output);

    for error in &report.errors {
        eprintln!("   ❌ {}", error);
    }
    for warning in &report.warnings {
        eprintln!("   ⚠️  {}", warning);
    }
    eprintln!(
        "\n📊 Results: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.compliant {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_format(input: &Path, robust: bool, output: Option<&Path>) -> CliResult {
    let mode = if robust { FormatMode::Robust } else { FormatMode::Strict };
    eprintln!("🧹 Formatting ({:?}): {}", mode, input.display());

    let content = fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&content)?;
    let formatted = format_output(&value, mode).map_err(|e| format!("[{}] {}", e.code(), e))?;

    for warning in &formatted.warnings {
        eprintln!("   ⚠️  {}", warning);
    }

    let json = serde_json::to_string_pretty(&formatted.output)?;
    write_output(&json, output)
}

fn cmd_batch(inputs: &[PathBuf], output_dir: Option<&Path>, rows: usize) -> CliResult {
    eprintln!("📦 Batch: {} datasets", inputs.len());

    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
    }

    let options = AnalysisOptions::from_env();
    let mut failed = 0;

    for (i, input) in inputs.iter().enumerate() {
        eprintln!("\n[{}/{}] {}", i + 1, inputs.len(), input.display());

        let outcome = load_input(input, rows)
            .and_then(|raw| analyze_detailed(&raw, &options).map_err(|e| format!("[{}] {}", e.code(), e).into()));

        match outcome {
            Ok(detailed) => {
                eprintln!(
                    "   ✅ {} charts, domain {}",
                    detailed.output.charts_to_generate.len(),
                    detailed.insights.industry_domain
                );
                if let Some(dir) = output_dir {
                    let stem = input
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| format!("dataset-{}", i + 1));
                    let path = dir.join(format!("{}.analysis.json", stem));
                    fs::write(&path, serde_json::to_string_pretty(&detailed.output)?)?;
                    eprintln!("   💾 Saved to: {}", path.display());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("   ❌ {}", e);
            }
        }
    }

    eprintln!(
        "\n📊 Results: {} succeeded, {} failed",
        inputs.len() - failed,
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_serve(port: u16) -> CliResult {
    datalens::server::start_server(port).await?;
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
