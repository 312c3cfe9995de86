use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "liker-runner")]
#[command(about = "Collect the people who reacted to a post")]
#[command(version)]
struct Cli {
    /// Config file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Enrich every collected profile (overrides config)
    #[arg(long)]
    enrich: bool,

    /// Write the JSON result here (overrides config, supports {timestamp})
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Print the JSON result envelope instead of a summary
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> liker_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    // Logs go to stderr so --json output stays parseable
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = liker_runner::Params::from_args(&cli.params)?;
    let mut config = liker_runner::Config::load_with_params(&cli.config, &params)?;

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Target: {}", config.target.url);
        println!(
            "  Collector: cap {} passes, stop after {} stale",
            config.scan.collector.max_scroll_attempts, config.scan.collector.max_consecutive_no_new
        );
        if config.enrich.enabled {
            println!(
                "  Enrichment: {} at a time",
                config.enrich.config.concurrency
            );
        }
        if !config.params.is_empty() {
            println!("  Parameters: {}", config.params.len());
            for (name, def) in &config.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        if let Some(ref path) = config.output.path {
            println!("  Output: {}", path);
        }
        if let Some(ref on_failure) = config.on_failure {
            if let Some(ref retry) = on_failure.retry {
                println!("  Retry attempts: {}", retry.attempts);
            }
        }
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }
    if cli.enrich {
        config.enrich.enabled = true;
    }
    if cli.output.is_some() {
        config.output.path = cli.output.clone();
    }

    if !cli.json {
        println!("Running: {}", config.name);
    }

    let mut runner = liker_runner::Runner::new(&config.browser).await?;
    let report = runner.scan(&config).await?;
    runner.close().await?;

    if cli.json {
        println!("{}", report.response().to_json(config.output.pretty)?);
    } else {
        println!();
        if report.success {
            println!("✓ Success");
            println!("  Profiles: {}", report.profile_count());
            println!("  Passes: {}", report.passes);
            if let Some(stop) = report.stop {
                println!("  Stopped: {:?}", stop);
            }
            if let Some(ref summary) = report.enrichment {
                println!(
                    "  Enriched: {} ok, {} failed",
                    summary.successful, summary.failed
                );
            }
        } else {
            println!("✗ Failed");
            if let Some(ref error) = report.error {
                println!("  Error: {}", error);
            }
        }
        println!("  Duration: {}ms", report.duration_ms);
        if report.retries > 0 {
            println!("  Retries: {}", report.retries);
        }
        if let Some(ref path) = report.output_path {
            println!("  Output: {}", path);
        }
    }

    if !report.success {
        std::process::exit(1);
    }

    Ok(())
}
