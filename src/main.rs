use std::path::PathBuf;

use clap::Parser;
use tinvest_sheets::config::{CliSettings, ExportConfig};
use tinvest_sheets::import::{self, ImportOptions};
use tinvest_sheets::io::auth::{DEFAULT_TOKEN_CACHE, InstalledAppFlow, TokenProvider};
use tinvest_sheets::io::sheets::GoogleSheets;
use tinvest_sheets::publish::{PublishOptions, Publisher};
use tinvest_sheets::store::{self, DEFAULT_DATABASE, settings};
use tinvest_sheets::{ExportError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ExportError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let invocation = cli.settings();

    if cli.store_args {
        let mut conn = store::open(&cli.database)?;
        let written = settings::store_settings(&mut conn, invocation.entries())?;
        tracing::info!(written, "settings stored");
    }

    let persisted = {
        let conn = store::open(&cli.database)?;
        settings::read_settings(&conn)?
    };
    let config = ExportConfig::resolve(&invocation, &persisted)?;

    if !cli.file_name.exists() {
        return Err(ExportError::MissingInput(cli.file_name));
    }

    let imported = import::import_report(
        &cli.file_name,
        &cli.database,
        ImportOptions { fresh: cli.fresh },
    )?;
    println!("{}\nExcel to SQLite export\n{}", "=".repeat(30), "=".repeat(30));
    println!("{imported}\n");

    let token = InstalledAppFlow::new(&config.credentials, &cli.token_cache)?.access_token()?;
    let api = GoogleSheets::new(token)?;
    let published = Publisher::new(
        &api,
        &config,
        PublishOptions {
            format_currency: cli.format_currency,
        },
    )
    .publish(&cli.database)?;

    println!(
        "sheets created: {}, sheets updated: {}, rows appended: {}",
        published.sheets_created, published.sheets_updated, published.rows_appended
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Export transactions from a Tinkoff Investments Excel report to Google Sheets.",
    long_about = "Export transactions from a Tinkoff Investments Excel report to Google Sheets. \
                  Provide the spreadsheet id and the credentials file, either on the command \
                  line or once with --store-args-to-db."
)]
struct Cli {
    /// Path to the Tinkoff Investments broker report (.xlsx).
    #[arg(value_name = "FILE_NAME")]
    file_name: PathBuf,

    /// Path to the OAuth client credentials.json for the Google API.
    #[arg(short, long)]
    credentials: Option<PathBuf>,

    /// Id of the Google spreadsheet receiving the transactions.
    #[arg(short = 'i', long)]
    spreadsheet_id: Option<String>,

    /// Id of the RUB template sheet inside the target spreadsheet.
    #[arg(long)]
    rub_sheet_id: Option<String>,

    /// Id of the USD template sheet inside the target spreadsheet.
    #[arg(long)]
    usd_sheet_id: Option<String>,

    /// Persist the supplied arguments for later runs.
    #[arg(long = "store-args-to-db")]
    store_args: bool,

    /// SQLite database holding transactions and settings.
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// File caching the Google access token.
    #[arg(long, default_value = DEFAULT_TOKEN_CACHE)]
    token_cache: PathBuf,

    /// Delete previously imported transactions before importing.
    #[arg(long)]
    fresh: bool,

    /// Apply currency number formats to the appended price and sum columns.
    #[arg(long)]
    format_currency: bool,
}

impl Cli {
    fn settings(&self) -> CliSettings {
        CliSettings {
            file_name: Some(self.file_name.clone()),
            spreadsheet_id: self.spreadsheet_id.clone(),
            credentials: self.credentials.clone(),
            rub_sheet_id: self.rub_sheet_id.clone(),
            usd_sheet_id: self.usd_sheet_id.clone(),
            store_args: self.store_args,
        }
    }
}
