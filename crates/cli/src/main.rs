use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use facebatch_core::annotation::infrastructure::stacked_box_annotator::StackedBoxAnnotator;
use facebatch_core::detection::domain::face_engine::FaceEngine;
use facebatch_core::detection::infrastructure::engine_catalog::default_registry;
use facebatch_core::detection::infrastructure::model_resolver::ModelResolver;
use facebatch_core::pipeline::annotate_use_case::AnnotateUseCase;
use facebatch_core::pipeline::detect_batch_use_case::DetectBatchUseCase;
use facebatch_core::pipeline::detect_image_use_case::{format_result_line, DetectImageUseCase};
use facebatch_core::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
use facebatch_core::pipeline::list_images_use_case::{FileFilter, ListImagesUseCase};
use facebatch_core::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, StdoutPipelineLogger,
};
use facebatch_core::shared::constants::{
    DEFAULT_LIST_EXTENSIONS, DEFAULT_MAX_IN_FLIGHT, DEFAULT_OUTPUT_PATH, TABLE_EXTENSIONS,
};
use facebatch_core::shared::settings::Settings;
use facebatch_core::table::infrastructure::delimited_table_reader::DelimitedTableReader;
use facebatch_core::table::infrastructure::tsv_table_writer::TsvTableWriter;

/// Batch face detection across local and cloud engines.
#[derive(Parser)]
#[command(name = "facebatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find image files under a directory and save them as a path list.
    List(ListArgs),
    /// Detect faces in one image, or in every image of a CSV/TSV list.
    Detect(DetectArgs),
    /// Draw detected faces from a detect output file onto image copies.
    Annotate(AnnotateArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Image directory.
    #[arg(short, long)]
    input: PathBuf,

    /// Output list file.
    #[arg(short, long, default_value = "./list.tsv")]
    output: PathBuf,

    /// Include every file except dotfiles.
    #[arg(short, long)]
    all: bool,

    /// Comma-separated file extensions.
    #[arg(
        short = 't',
        long = "type",
        value_delimiter = ',',
        default_values_t = DEFAULT_LIST_EXTENSIONS.iter().map(|e| e.to_string()).collect::<Vec<_>>()
    )]
    types: Vec<String>,

    /// Prefix joined in front of every listed path.
    #[arg(short = 'd', long)]
    prefix: Option<PathBuf>,
}

#[derive(Args)]
struct DetectArgs {
    /// Image file, or a .csv/.tsv list with a `path` column.
    #[arg(short, long)]
    input: PathBuf,

    /// Output TSV file (list input only).
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Use every known engine.
    #[arg(short, long)]
    all: bool,

    /// Comma-separated engine names, e.g. `yolo,azure`. Added before any
    /// engines enabled through FDA_ENGINE_* variables.
    #[arg(short, long)]
    engine: Option<String>,

    /// Maximum number of images under detection at once.
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Suppress batch progress and the closing summary.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct AnnotateArgs {
    /// Output TSV of the detect command.
    #[arg(short, long)]
    input: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::List(args) => run_list(args),
        Command::Detect(args) => run_detect(args),
        Command::Annotate(args) => run_annotate(args),
    }
}

fn run_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if args.all {
        FileFilter::AllVisible
    } else {
        FileFilter::extensions(&args.types)
    };
    let mut use_case = ListImagesUseCase::new(Box::new(TsvTableWriter::new()), filter, args.prefix);
    let count = use_case.execute(&args.input, &args.output)?;
    log::info!("Wrote {count} paths to {}", args.output.display());
    Ok(())
}

fn run_detect(args: DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.input.exists() {
        return Err(format!("Input file not found: {}", args.input.display()).into());
    }
    if args.max_in_flight == 0 {
        return Err("--max-in-flight must be at least 1".into());
    }

    let engines = build_engines(&args)?;

    if is_table(&args.input) {
        run_batch(&args, engines)
    } else {
        run_single(&args.input, engines)
    }
}

/// Composition boundary: the provider list is built once here and the
/// registry initializes exactly the selected engines.
fn build_engines(args: &DetectArgs) -> Result<Vec<Box<dyn FaceEngine>>, Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env();
    if let Some(names) = &args.engine {
        settings.select_names(names)?;
    }
    if args.all {
        settings.select_all();
    }

    let registry = default_registry(ModelResolver::new()?);
    Ok(registry.select_from_settings(&settings)?)
}

fn run_batch(
    args: &DetectArgs,
    engines: Vec<Box<dyn FaceEngine>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logger: Box<dyn PipelineLogger> = if args.quiet {
        Box::new(NullPipelineLogger)
    } else {
        Box::new(StdoutPipelineLogger::default())
    };
    let mut use_case = DetectBatchUseCase::new(
        Box::new(DelimitedTableReader::new()),
        Box::new(TsvTableWriter::new()),
        Box::new(ThreadedBatchExecutor::with_max_in_flight(args.max_in_flight)),
        engines,
        logger,
    );
    let report = use_case.execute(&args.input, &args.output)?;
    if report.failed_cells > 0 {
        log::warn!(
            "{} detection call(s) failed; their cells are empty",
            report.failed_cells
        );
    }
    log::info!("Output written to {}", args.output.display());
    Ok(())
}

fn run_single(
    input: &Path,
    engines: Vec<Box<dyn FaceEngine>>,
) -> Result<(), Box<dyn std::error::Error>> {
    DetectImageUseCase::new(engines).execute(input, |result| {
        println!("{}", format_result_line(result)?);
        Ok(())
    })?;
    Ok(())
}

fn run_annotate(args: AnnotateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = AnnotateUseCase::new(
        Box::new(DelimitedTableReader::new()),
        Box::new(StackedBoxAnnotator::new()),
    );
    let report = use_case.execute(&args.input)?;
    if report.annotated == 0 && report.failed > 0 {
        return Err(format!("No images could be annotated ({} failed)", report.failed).into());
    }
    Ok(())
}

fn is_table(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
