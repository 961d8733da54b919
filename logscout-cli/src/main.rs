use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use logscout::{
    analysis::{summarize_file, DirectoryAnalysisEngine, Strategy},
    config::{AnalyzerConfig, CliOverrides, EncodingMode},
    logging::init_tracing,
    persist::{BatchPersistor, JsonTableStore, StorageSink},
    reader::{ConcurrentReader, NamedSource},
    record::{generate_records, FileFailure, Record, TaggedRecord},
    report::{render_analysis, FileReportSink, ReportSink, ANALYSIS_REPORT, MERGED_REPORT},
    AnalysisMetrics,
};
use std::{num::NonZeroUsize, path::PathBuf, sync::Arc, time::Duration};
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Configuration file (YAML), read after the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short = 'j', long, global = true)]
    threads: Option<NonZeroUsize>,

    /// Keyword to count (case-insensitive)
    #[arg(short = 'k', long, global = true)]
    keyword: Option<String>,

    /// Treat the keyword as a regular expression
    #[arg(long, global = true)]
    regex: bool,

    /// Records flushed per batch inside one transaction
    #[arg(long, global = true)]
    batch_size: Option<NonZeroUsize>,

    /// Lines at or below which recursive splitting stops
    #[arg(long, global = true)]
    threshold: Option<NonZeroUsize>,

    /// Bounded wait for the partitioned strategy (e.g. 30s, 2m)
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long, global = true)]
    encoding: Option<EncodingMode>,

    /// Directory holding the JSON tables
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Folder receiving one file per generated record
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true)]
    log_level: Option<String>,
}

impl GlobalArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            keyword: self.keyword.clone(),
            keyword_is_regex: self.regex,
            thread_count: self.threads,
            batch_size: self.batch_size,
            recursive_threshold: self.threshold,
            partition_timeout: self.timeout,
            encoding_mode: self.encoding,
            data_dir: self.data_dir.clone(),
            output_folder: self.output.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every file of a directory and store one record per file
    Analyze {
        /// Directory to analyze (not recursive)
        dir: PathBuf,

        /// Where to write the analysis report
        #[arg(long, default_value = ANALYSIS_REPORT)]
        report: PathBuf,

        /// Print the results without storing them
        #[arg(long)]
        no_save: bool,
    },

    /// Count words and keywords of one large file
    Summarize {
        /// File to summarize
        file: PathBuf,

        /// Decomposition strategy (partitioned|recursive|auto)
        #[arg(short, long, default_value = "auto")]
        strategy: Strategy,

        /// Store the summary as a record in the analysis table
        #[arg(long)]
        save: bool,
    },

    /// Show the analysis and batch tables merged, and write them to a report
    Show {
        /// Where to write the merged report
        #[arg(long, default_value = MERGED_REPORT)]
        report: PathBuf,
    },

    /// Generate synthetic records into the batch table and the output folder
    Generate {
        /// Number of records to generate
        #[arg(short = 'n', long, default_value_t = 100)]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AnalyzerConfig::load_from(cli.global.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(cli.global.overrides());
    config.validate()?;
    init_tracing(&config.log_level);

    let metrics = AnalysisMetrics::new();
    let store: Arc<dyn StorageSink> = Arc::new(JsonTableStore::new(&config.data_dir));

    let outcome = match cli.command {
        Commands::Analyze {
            dir,
            report,
            no_save,
        } => analyze(&config, &store, &metrics, dir, report, no_save),
        Commands::Summarize {
            file,
            strategy,
            save,
        } => summarize(&config, &store, &metrics, file, strategy, save),
        Commands::Show { report } => show(&config, &store, report),
        Commands::Generate { count } => generate(&config, &store, &metrics, count),
    };

    metrics.log_stats();
    outcome
}

fn analyze(
    config: &AnalyzerConfig,
    store: &Arc<dyn StorageSink>,
    metrics: &AnalysisMetrics,
    dir: PathBuf,
    report: PathBuf,
    no_save: bool,
) -> Result<()> {
    let engine = DirectoryAnalysisEngine::from_config(config)?.with_metrics(metrics.clone());
    let analysis = engine.analyze(&dir)?;

    print_records(&analysis.records);
    print_failures(&analysis.failures);

    if !no_save {
        let persistor = BatchPersistor::from_config(Arc::clone(store), config)
            .with_metrics(metrics.clone());
        let summary = persistor.persist(&analysis.records, &config.analysis_table)?;
        println!(
            "\nStored {} records in {} ({} batches)",
            summary.records.to_string().green(),
            summary.target.blue(),
            summary.batches
        );
    }

    FileReportSink::new(&report)
        .publish(&render_analysis(&analysis.records))
        .with_context(|| format!("Failed to write report {}", report.display()))?;
    println!("Report written to {}", report.display().to_string().blue());
    Ok(())
}

fn summarize(
    config: &AnalyzerConfig,
    store: &Arc<dyn StorageSink>,
    metrics: &AnalysisMetrics,
    file: PathBuf,
    strategy: Strategy,
    save: bool,
) -> Result<()> {
    let record = summarize_file(config, &file, strategy, metrics)?;

    println!(
        "{}: {} words, {} keyword matches",
        record.name().blue(),
        record.word_count().to_string().green(),
        record.keyword_count().to_string().green()
    );

    if save {
        BatchPersistor::from_config(Arc::clone(store), config)
            .with_metrics(metrics.clone())
            .persist(std::slice::from_ref(&record), &config.analysis_table)?;
        println!("Stored in {}", config.analysis_table.blue());
    }
    Ok(())
}

fn show(config: &AnalyzerConfig, store: &Arc<dyn StorageSink>, report: PathBuf) -> Result<()> {
    let reader = ConcurrentReader::new(Arc::clone(store));
    let (view, handle) = reader.merge_and_publish(
        &NamedSource::analysis(config),
        &NamedSource::batch(config),
        Arc::new(FileReportSink::new(&report)),
    )?;

    print_merged(&view.rows);

    // The view is already out; a failed report only warns
    match handle.wait() {
        Ok(()) => println!("\nReport written to {}", report.display().to_string().blue()),
        Err(e) => warn!("Merged report not written: {}", e),
    }
    Ok(())
}

fn generate(
    config: &AnalyzerConfig,
    store: &Arc<dyn StorageSink>,
    metrics: &AnalysisMetrics,
    count: usize,
) -> Result<()> {
    let records = generate_records(count);
    let persistor =
        BatchPersistor::from_config(Arc::clone(store), config).with_metrics(metrics.clone());

    let outcome =
        persistor.persist_everywhere(&records, &config.batch_table, &config.output_folder)?;
    println!(
        "Stored {} records in {} and wrote {} files to {}",
        outcome.table.records.to_string().green(),
        outcome.table.target.blue(),
        outcome.files.len().to_string().green(),
        config.output_folder.display().to_string().blue()
    );
    Ok(())
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records");
        return;
    }

    println!(
        "{}",
        format!(
            "{:<20} {:<12} {:<15} {:<23}",
            "Filename", "Word Count", "Keyword Count", "Processed At"
        )
        .bold()
    );
    for record in records {
        println!(
            "{} {:<12} {} {}",
            format!("{:<20}", record.name()).blue(),
            record.word_count(),
            format!("{:<15}", record.keyword_count()).green(),
            record.processed_at().format(logscout::report::TIMESTAMP_FORMAT)
        );
    }
}

fn print_failures(failures: &[FileFailure]) {
    for failure in failures {
        println!(
            "{} {}: {}",
            "skipped".yellow(),
            failure.path.display(),
            failure.reason
        );
    }
}

fn print_merged(rows: &[TaggedRecord]) {
    if rows.is_empty() {
        println!("No records");
        return;
    }

    println!(
        "{}",
        format!(
            "{:<5} {:<20} {:<12} {:<15} {:<23} {:<12}",
            "ID", "Filename", "Word Count", "Keyword Count", "Processed At", "Source"
        )
        .bold()
    );
    for row in rows {
        println!(
            "{:<5} {} {:<12} {} {} {}",
            row.id,
            format!("{:<20}", row.record.name()).blue(),
            row.record.word_count(),
            format!("{:<15}", row.record.keyword_count()).green(),
            row.record.processed_at().format(logscout::report::TIMESTAMP_FORMAT),
            row.source.as_str().cyan()
        );
    }
}
