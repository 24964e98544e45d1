use anyhow::{bail, Context};
use clap::Parser;
use eoka_navigator::{
    ChatClient, ChatDecisionService, ChatDescriptionParser, EokaLauncher, LoggingConfig, Navigator,
    NavigatorConfig, PagePool, SessionReport, SessionRequest,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-navigator")]
#[command(about = "Goal-driven browser navigation")]
#[command(version)]
struct Cli {
    /// Start URL
    #[arg(required_unless_present_any = ["jobs", "check"])]
    url: Option<String>,

    /// What to accomplish, in plain language
    #[arg(required_unless_present_any = ["jobs", "check"])]
    goal: Option<String>,

    /// YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum turns per session (overrides config)
    #[arg(long)]
    max_turns: Option<usize>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Write the JSON report to a file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// YAML list of {url, goal, max_turns} sessions to run concurrently
    #[arg(long, value_name = "FILE")]
    jobs: Option<PathBuf>,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let mut config = match &cli.config {
        Some(path) => NavigatorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NavigatorConfig::default(),
    };
    config.apply_env()?;
    if cli.headless {
        config.browser.headless = true;
    }
    if let Some(turns) = cli.max_turns {
        if turns == 0 {
            bail!("--max-turns must be at least 1");
        }
        config.session.max_turns = turns;
    }

    init_logging(&cli, &config.logging)?;

    if cli.check {
        println!("Config valid");
        println!("  Model: {} ({})", config.llm.model, config.llm.endpoint);
        println!("  API key: {}", if config.llm.api_key.is_some() { "set" } else { "missing" });
        println!("  Max turns: {}", config.session.max_turns);
        println!("  Concurrent pages: {}", config.browser.max_concurrent_pages);
        println!();
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let requests = match (&cli.jobs, &cli.url, &cli.goal) {
        (Some(path), _, _) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let jobs: Vec<SessionRequest> = serde_yaml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            if jobs.is_empty() {
                bail!("{} lists no sessions", path.display());
            }
            jobs
        }
        (None, Some(url), Some(goal)) => vec![SessionRequest::new(url, goal)],
        _ => bail!("URL and GOAL are required unless --jobs is given"),
    };

    let client = ChatClient::new(&config.llm)?;
    let navigator = Navigator::new(&config, ChatDecisionService::new(client.clone(), &config.llm))
        .with_parser(ChatDescriptionParser::new(client));

    let launcher = EokaLauncher::launch(&config.browser).await?;
    let pool = Arc::new(PagePool::new(launcher, config.browser.max_concurrent_pages));
    let reports = Arc::new(navigator).run_all(pool.clone(), requests).await;

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.into_factory().shutdown().await?,
        Err(_) => warn!("page pool still in use; leaving browser to exit with the process"),
    }

    for report in &reports {
        print_report(report);
    }

    if let Some(path) = &cli.output {
        let json = match reports.as_slice() {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        };
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    if reports.iter().any(|r| r.has_fault() || !r.made_progress()) {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => logging.level.parse().unwrap_or(Level::INFO),
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!();
    if !report.has_fault() && report.made_progress() {
        println!("✓ {}", report.goal);
    } else {
        println!("✗ {}", report.goal);
    }
    println!("  Start: {}", report.start_url);
    println!("  Final: {}", report.final_url);
    println!("  Turns: {}/{}", report.total_actions, report.turns_allowed);
    if report.navigation_path.len() > 1 {
        println!("  Path: {}", report.navigation_path.join(" -> "));
    }
    println!("  Strategies learned: {}", report.strategies_learned);
    if !report.errors.is_empty() {
        println!("  Errors: {}", report.errors.len());
        for e in &report.errors {
            println!("    - [turn {}] {}", e.turn, e.message);
        }
    }
    if let Some(title) = report
        .extracted_content
        .get("title")
        .or_else(|| report.extracted_content.get("final_title"))
        .and_then(|v| v.as_str())
    {
        println!("  Page: {}", title);
    }
    for line in report.conversation_summary.lines() {
        println!("  {}", line);
    }
}
