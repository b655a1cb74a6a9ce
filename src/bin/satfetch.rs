use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use satfetch::app::App;
use satfetch::catalog::{CatalogClient, SearchResults};
use satfetch::config::{ConfigLoader, ResolvedConfig};
use satfetch::domain::{Collection, OutputFormat, Polygon, Product, TimeRange};
use satfetch::error::SatfetchError;
use satfetch::eumetsat::EumetsatHttpClient;
use satfetch::job::{Customization, JobHandle, JobService};
use satfetch::output::{JsonOutput, OutputMode, PlainOutput};

#[derive(Parser)]
#[command(name = "satfetch")]
#[command(about = "Batch retrieval and integrity checks for EUMETSAT satellite products")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config (defaults to ./satfetch.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Overrides the collection named in the config
    #[arg(long, global = true, value_enum)]
    collection: Option<Collection>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Product id listings")]
    Ids(IdsArgs),
    #[command(about = "Product files")]
    Files(FilesArgs),
}

#[derive(Args)]
struct IdsArgs {
    #[command(subcommand)]
    command: IdsCommand,
}

#[derive(Subcommand)]
enum IdsCommand {
    #[command(about = "List product ids over the configured period into a file")]
    Fetch,
}

#[derive(Args)]
struct FilesArgs {
    #[command(subcommand)]
    command: FilesCommand,
}

#[derive(Subcommand)]
enum FilesCommand {
    #[command(about = "Customise and download products over the configured period")]
    Fetch {
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    #[command(about = "Report missing and corrupted files in a local archive")]
    Verify,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SatfetchError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SatfetchError) -> u8 {
    match error {
        SatfetchError::MissingConfig
        | SatfetchError::ConfigRead(_)
        | SatfetchError::ConfigParse(_)
        | SatfetchError::Configuration(_)
        | SatfetchError::InvalidRange { .. }
        | SatfetchError::InvalidInterval(_)
        | SatfetchError::InvalidProductId(_)
        | SatfetchError::DateTimeParse(_)
        | SatfetchError::MissingCredentials(_) => 2,
        SatfetchError::EumetsatHttp(_)
        | SatfetchError::EumetsatStatus { .. }
        | SatfetchError::InvalidResponse(_)
        | SatfetchError::RemoteJob { .. }
        | SatfetchError::UnmappedJobStatus(_) => 3,
        SatfetchError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Plain
    };
    let mut resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(collection) = cli.collection {
        resolved.collection = collection;
        if let Some(files) = resolved.files.as_mut() {
            files.params.product_type = collection.product_type().to_string();
        }
    }

    match cli.command {
        Commands::Ids(args) => match args.command {
            IdsCommand::Fetch => run_ids_fetch(&resolved, mode),
        },
        Commands::Files(args) => match args.command {
            FilesCommand::Fetch { format } => {
                if let (Some(format), Some(files)) = (format, resolved.files.as_mut()) {
                    files.params.format = format;
                }
                run_files_fetch(&resolved, mode)
            }
            FilesCommand::Verify => run_files_verify(&resolved, mode),
        },
    }
}

fn remote_app(
    resolved: &ResolvedConfig,
) -> miette::Result<App<Arc<EumetsatHttpClient>, Arc<EumetsatHttpClient>>> {
    let client = Arc::new(EumetsatHttpClient::new(resolved.collection)?);
    Ok(App::new(Arc::clone(&client), client))
}

fn run_ids_fetch(resolved: &ResolvedConfig, mode: OutputMode) -> miette::Result<()> {
    let request = resolved
        .ids
        .as_ref()
        .ok_or_else(|| missing_section("ids"))?;
    let app = remote_app(resolved)?;
    let result = app.fetch_ids(request)?;
    match mode {
        OutputMode::Json => JsonOutput::print_ids(&result).into_diagnostic(),
        OutputMode::Plain => {
            PlainOutput::print_ids(&result);
            Ok(())
        }
    }
}

fn run_files_fetch(resolved: &ResolvedConfig, mode: OutputMode) -> miette::Result<()> {
    let request = resolved
        .files
        .as_ref()
        .ok_or_else(|| missing_section("files"))?;
    let app = remote_app(resolved)?;
    let result = app.fetch_files(request)?;
    match mode {
        OutputMode::Json => JsonOutput::print_files(&result).into_diagnostic(),
        OutputMode::Plain => {
            PlainOutput::print_files(&result);
            Ok(())
        }
    }
}

fn run_files_verify(resolved: &ResolvedConfig, mode: OutputMode) -> miette::Result<()> {
    let request = resolved
        .verify
        .as_ref()
        .ok_or_else(|| missing_section("verify"))?;
    let app = App::new(NopCatalog, NopJobs);
    let result = app.verify(request)?;
    match mode {
        OutputMode::Json => JsonOutput::print_verify(&result).into_diagnostic(),
        OutputMode::Plain => {
            PlainOutput::print_verify(&result);
            Ok(())
        }
    }
}

fn missing_section(name: &str) -> SatfetchError {
    SatfetchError::Configuration(format!("config has no `{name}` section"))
}

struct NopCatalog;
struct NopJobs;

impl CatalogClient for NopCatalog {
    fn search(
        &self,
        _range: &TimeRange,
        _geo: Option<&Polygon>,
    ) -> Result<SearchResults, SatfetchError> {
        Err(SatfetchError::EumetsatHttp(
            "catalog client not configured".to_string(),
        ))
    }
}

impl JobService for NopJobs {
    fn submit(
        &self,
        _product: &Product,
        _customization: &Customization,
    ) -> Result<JobHandle, SatfetchError> {
        Err(not_configured())
    }

    fn status(&self, _job: &JobHandle) -> Result<String, SatfetchError> {
        Err(not_configured())
    }

    fn outputs(&self, _job: &JobHandle) -> Result<Vec<String>, SatfetchError> {
        Err(not_configured())
    }

    fn stream_output(
        &self,
        _job: &JobHandle,
        _output: &str,
    ) -> Result<Box<dyn Read + Send>, SatfetchError> {
        Err(not_configured())
    }
}

fn not_configured() -> SatfetchError {
    SatfetchError::EumetsatHttp("job service not configured".to_string())
}
