//! DigestKit CLI - run one step of the scrape-and-digest pipeline

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use digestkit::{
    archive, jobs, sites, BatchDriver, BatchReport, BrowserSession, ChromeSession,
    ContentExtractor, Credentials, Pacing, PipelineError, Provider, Settings, StagedConverter,
};
use std::path::{Path, PathBuf};

/// DigestKit - scrape investment content and digest it with an LLM
#[derive(Parser, Debug)]
#[command(name = "digestkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Text-generation backend: openai or claude
    #[arg(long, global = true, default_value = "openai")]
    provider: Provider,

    /// Run Chrome without a window
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in to Suno and capture unread reports as HTML
    Reports {
        /// Output directory [default: <private>/suno/relatorios]
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Log in to Suno and capture every wallet page as HTML
    Wallets {
        /// Output directory [default: <private>/suno/carteiras/html]
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Log in to Meus Dividendos and capture the portfolio table
    MeusDividendos {
        /// Output directory [default: <private>/meus-dividendos]
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize today's reports into classified Markdown
    Summarize {
        /// Report HTML directory [default: <private>/suno/relatorios]
        #[arg(long)]
        input: Option<PathBuf>,
        /// Summary directory [default: <public>/suno/resumos]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert today's wallet HTML into Markdown with CSV blocks
    WalletsMd {
        /// Wallet HTML directory [default: <private>/suno/carteiras/html]
        #[arg(long)]
        input: Option<PathBuf>,
        /// Markdown directory [default: <private>/suno/carteiras/md]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Normalize today's wallet Markdown into CSV
    WalletsCsv {
        /// Markdown directory [default: <private>/suno/carteiras/md]
        #[arg(long)]
        input: Option<PathBuf>,
        /// CSV directory [default: <private>/suno/carteiras/csv]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert today's Meus Dividendos table into CSV
    DividendosCsv {
        /// Table HTML file [default: <private>/meus-dividendos/carteira-meus-dividendos-<today>.htm]
        #[arg(long)]
        input: Option<PathBuf>,
        /// CSV directory [default: <private>/meus-dividendos]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Zip a folder, optionally only files created on one day
    Archive {
        /// Folder to archive
        folder: PathBuf,
        /// Archive file to write
        output: PathBuf,
        /// Only include files created on this day (YYYY-MM-DD)
        #[arg(long, conflicts_with = "today")]
        date: Option<NaiveDate>,
        /// Only include files created today
        #[arg(long)]
        today: bool,
    },
}

/// Default directory layout under the download roots
struct Layout {
    public: PathBuf,
    private: PathBuf,
}

impl Layout {
    fn new(settings: &Settings) -> Self {
        Self {
            public: settings.downloads_public.clone(),
            private: settings.downloads_private.clone(),
        }
    }

    fn reports(&self) -> PathBuf {
        self.private.join("suno").join("relatorios")
    }

    fn summaries(&self) -> PathBuf {
        self.public.join("suno").join("resumos")
    }

    fn wallets(&self, stage: &str) -> PathBuf {
        self.private.join("suno").join("carteiras").join(stage)
    }

    fn meus_dividendos(&self) -> PathBuf {
        self.private.join("meus-dividendos")
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "digestkit=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match run(cli, settings).await {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<String, PipelineError> {
    let layout = Layout::new(&settings);
    let driver = BatchDriver::new();
    let headless = cli.headless || settings.headless;

    match cli.command {
        Commands::Reports { out } => {
            let credentials = require(&settings.suno, "SUNO_EMAIL and SUNO_PASSWORD")?;
            let out = out.unwrap_or_else(|| layout.reports());
            scrape(headless, Scrape::Reports(credentials), &out, driver.today()).await
        }
        Commands::Wallets { out } => {
            let credentials = require(&settings.suno, "SUNO_EMAIL and SUNO_PASSWORD")?;
            let out = out.unwrap_or_else(|| layout.wallets("html"));
            scrape(headless, Scrape::Wallets(credentials), &out, driver.today()).await
        }
        Commands::MeusDividendos { out } => {
            let credentials = require(
                &settings.meus_dividendos,
                "MEUS_DIVIDENDOS_EMAIL and MEUS_DIVIDENDOS_PASSWORD",
            )?;
            let out = out.unwrap_or_else(|| layout.meus_dividendos());
            scrape(headless, Scrape::MeusDividendos(credentials), &out, driver.today()).await
        }
        Commands::Summarize { input, output } => {
            let converter = converter(cli.provider, &settings)?;
            let input = input.unwrap_or_else(|| layout.reports());
            let output = output.unwrap_or_else(|| layout.summaries());
            summarize(jobs::process_reports(&driver, &converter, &input, &output).await)
        }
        Commands::WalletsMd { input, output } => {
            let converter = converter(cli.provider, &settings)?;
            let input = input.unwrap_or_else(|| layout.wallets("html"));
            let output = output.unwrap_or_else(|| layout.wallets("md"));
            summarize(jobs::wallets_html_to_markdown(&driver, &converter, &input, &output).await)
        }
        Commands::WalletsCsv { input, output } => {
            let converter = converter(cli.provider, &settings)?;
            let input = input.unwrap_or_else(|| layout.wallets("md"));
            let output = output.unwrap_or_else(|| layout.wallets("csv"));
            summarize(jobs::wallets_markdown_to_csv(&driver, &converter, &input, &output).await)
        }
        Commands::DividendosCsv { input, output } => {
            let converter = converter(cli.provider, &settings)?;
            let input = input.unwrap_or_else(|| {
                layout
                    .meus_dividendos()
                    .join(jobs::meus_dividendos_file_name(driver.today(), "htm"))
            });
            let output = output.unwrap_or_else(|| layout.meus_dividendos());
            summarize(jobs::meus_dividendos_to_csv(&driver, &converter, &input, &output).await)
        }
        Commands::Archive {
            folder,
            output,
            date,
            today,
        } => {
            let filter = if today { Some(driver.today()) } else { date };
            let count = archive::zip_folder(&folder, &output, filter)?;
            Ok(format!("archived={} output={}", count, output.display()))
        }
    }
}

fn summarize(result: Result<BatchReport, PipelineError>) -> Result<String, PipelineError> {
    result.map(|report| report.to_string())
}

fn converter(provider: Provider, settings: &Settings) -> Result<StagedConverter, PipelineError> {
    let converter = StagedConverter::new(provider.backend(settings)?);
    tracing::info!(backend = converter.backend_name(), "Using backend");
    Ok(converter)
}

fn require<'a>(
    credentials: &'a Option<Credentials>,
    variables: &str,
) -> Result<&'a Credentials, PipelineError> {
    credentials
        .as_ref()
        .ok_or_else(|| PipelineError::Config(format!("{} must be set", variables)))
}

/// Browser routine to run
enum Scrape<'a> {
    Reports(&'a Credentials),
    Wallets(&'a Credentials),
    MeusDividendos(&'a Credentials),
}

/// Launch Chrome, run one routine on its main window, then shut it down
async fn scrape(
    headless: bool,
    routine: Scrape<'_>,
    out: &Path,
    today: NaiveDate,
) -> Result<String, PipelineError> {
    let session = ChromeSession::launch(headless).await?;
    let result = run_routine(&session, routine, out, today).await;
    session.shutdown().await;
    result
}

async fn run_routine(
    session: &ChromeSession,
    routine: Scrape<'_>,
    out: &Path,
    today: NaiveDate,
) -> Result<String, PipelineError> {
    let extractor = ContentExtractor::new(session, Pacing::default());
    let window = session.main_window();

    match routine {
        Scrape::Reports(credentials) => {
            sites::suno::login(&extractor, &window, credentials).await?;
            let report = sites::suno::download_reports(&extractor, &window, out).await?;
            Ok(report.to_string())
        }
        Scrape::Wallets(credentials) => {
            sites::suno::login(&extractor, &window, credentials).await?;
            let report = sites::suno::download_wallets(&extractor, &window, out, today).await?;
            Ok(report.to_string())
        }
        Scrape::MeusDividendos(credentials) => {
            let path =
                sites::meus_dividendos::download_wallet(&extractor, &window, credentials, out, today)
                    .await?;
            Ok(format!("saved={}", path.display()))
        }
    }
}
