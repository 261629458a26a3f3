use anyhow::{Context, Result};
use browser_caseflow::actions::builtin_registry;
use browser_caseflow::browser::{BasePage, ChromeDriver};
use browser_caseflow::core::{SecretCipher, Settings, WebDriver};
use browser_caseflow::engine::{Case, CaseEngine, SubstitutionMode};
use browser_caseflow::pages::SearchHomePage;
use browser_caseflow::report::RunReport;
use browser_caseflow::retry::RerunPolicy;
use browser_caseflow::runner::{load_cases, resolve_case_paths, select, SuiteRunner};
use browser_caseflow::testing::RecordingDriver;
use browser_caseflow::utils::{check_env_health, logging, ScreenshotManager};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(about = "Run declarative browser UI test cases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run case files against an environment
    Run(RunArgs),
    /// List the cases in case files
    List {
        /// Case files; bare names are looked up in <data-dir>/<env>/
        #[arg(required = true)]
        cases: Vec<PathBuf>,
        #[arg(short, long)]
        env: Option<String>,
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// List the actions case steps can use
    Actions,
    /// Generate a key for ENC(...) secrets
    Keygen,
    /// Encrypt a secret with the key in ENCRYPT_KEY
    Encrypt { plaintext: String },
}

#[derive(Args)]
struct RunArgs {
    /// Case files (a single case or a `cases:` list); bare names are
    /// looked up in the environment's data directory
    #[arg(required = true)]
    cases: Vec<PathBuf>,

    /// dev, test or prod; falls back to TEST_ENV, then test
    #[arg(short, long)]
    env: Option<String>,

    /// Only run cases carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    #[arg(long)]
    skip_health_check: bool,

    /// Times a failed case is run again; overrides `rerun.reruns`
    #[arg(long)]
    reruns: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Substitute dataset values into the serialized case text
    #[arg(long)]
    textual_substitution: bool,

    /// Walk the cases against an in-memory driver, without a browser
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let passed = run(args).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::List {
            cases,
            env,
            tag,
            data_dir,
        } => {
            logging::init_console("info");
            let env = Settings::resolve_env(env.as_deref())?;
            let cases = load_cases(&resolve_case_paths(&data_dir, env, &cases)?)?;
            for case in select(&cases, tag.as_deref()) {
                println!(
                    "{:<20} {:<8} [{}] {}",
                    case.case_id,
                    case.priority.to_string(),
                    case.tags.join(", "),
                    case.case_name
                );
            }
        }
        Commands::Actions => {
            logging::init_console("warn");
            let mut registry = builtin_registry::<SearchHomePage<RecordingDriver>>();
            SearchHomePage::register_actions(&mut registry);
            for spec in registry.specs() {
                let params: Vec<&str> = spec.params.iter().map(|p| p.name).collect();
                println!(
                    "{:<30} locator: {:<9} params: [{}]  {}",
                    spec.name,
                    format!("{:?}", spec.locator).to_lowercase(),
                    params.join(", "),
                    spec.description
                );
            }
        }
        Commands::Keygen => {
            logging::init_console("warn");
            println!("{}", SecretCipher::generate_key());
        }
        Commands::Encrypt { plaintext } => {
            logging::init_console("warn");
            let cipher = SecretCipher::from_env().context("ENCRYPT_KEY is unset or invalid")?;
            println!("{}", cipher.encrypt(&plaintext));
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<bool> {
    let env = Settings::resolve_env(args.env.as_deref())?;
    let settings = Arc::new(
        Settings::load(&args.config_dir, env)
            .with_context(|| format!("loading configuration from {}", args.config_dir.display()))?,
    );
    logging::init(&settings)?;
    info!("Starting caseflow run in [{}] environment", env);

    if args.skip_health_check || args.dry_run {
        info!("Environment health check skipped");
    } else {
        check_env_health(&settings).await?;
    }

    let screenshots = Arc::new(ScreenshotManager::from_settings(&settings));
    screenshots.clear_dir()?;

    let paths = resolve_case_paths(&settings.data.dir, env, &args.cases)?;
    let cases = load_cases(&paths)?;
    let selected = select(&cases, args.tag.as_deref());
    let mode = if args.textual_substitution {
        SubstitutionMode::Textual
    } else {
        SubstitutionMode::TreeWalk
    };

    let mut rerun = settings.rerun.clone();
    if let Some(reruns) = args.reruns {
        rerun.reruns = reruns;
    }

    let report = if args.dry_run {
        let driver = Arc::new(RecordingDriver::new());
        run_suite(driver, &settings, screenshots, &selected, mode, rerun).await
    } else {
        let mut browser = settings.browser.clone();
        if args.headed {
            browser.headless = false;
        }
        let driver = Arc::new(ChromeDriver::launch(&browser)?);
        run_suite(driver, &settings, screenshots, &selected, mode, rerun).await
    };

    let path = report.write(&settings.report.dir)?;
    let summary = report.summary();
    println!(
        "{} passed, {} failed, {} total. Report: {}",
        summary.passed,
        summary.failed,
        summary.total,
        path.display()
    );
    Ok(report.all_passed())
}

async fn run_suite<D: WebDriver + 'static>(
    driver: Arc<D>,
    settings: &Settings,
    screenshots: Arc<ScreenshotManager>,
    cases: &[&Case],
    mode: SubstitutionMode,
    rerun: RerunPolicy,
) -> RunReport {
    let base = BasePage::from_settings(driver, settings, screenshots.clone());
    let page = SearchHomePage::new(base, settings.server.base_url.clone());

    let mut registry = builtin_registry::<SearchHomePage<D>>();
    SearchHomePage::register_actions(&mut registry);
    let engine = CaseEngine::new(Arc::new(registry)).with_substitution_mode(mode);

    SuiteRunner::new(engine, screenshots, settings.env)
        .with_rerun(rerun)
        .run(&page, cases)
        .await
}
