//! tarzi CLI - web search, page fetching and HTML conversion.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tarzi::{
    config::user_config_path, result::render_results, Config, ConfigLoader, ConfigOverrides,
    Converter, Format, ProviderKind, SearchEngine, SearchResult, WebFetcher,
};

/// tarzi - search the web, fetch pages and convert them to text
#[derive(Parser)]
#[command(name = "tarzi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.tarzi.toml and ./tarzi.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search with the configured engine
    Search(SearchArgs),

    /// Fetch a page and convert it
    Fetch(FetchArgs),

    /// Convert HTML from a file or stdin
    Convert(ConvertArgs),

    /// Search, then fetch every result page
    SearchFetch(SearchFetchArgs),

    /// List search engines and the modes they support
    Engines,

    /// Print the resolved configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct SearchOptions {
    /// Search engine (duckduckgo, brave, google, google_serper, bing, baidu,
    /// exa, travily, sogou_weixin)
    #[arg(short, long)]
    engine: Option<String>,

    /// Search mode: webquery or apiquery
    #[arg(short, long)]
    mode: Option<String>,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,

    /// Provider fallback in apiquery mode: smart or none
    #[arg(long)]
    autoswitch: Option<String>,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    #[command(flatten)]
    options: SearchOptions,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: ResultFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct FetchArgs {
    /// Page URL
    url: String,

    /// Fetch mode: plain_request, browser_headless or browser_head
    #[arg(short, long)]
    mode: Option<String>,

    /// Output format: html, markdown, json or yaml
    #[arg(short, long)]
    format: Option<String>,

    /// Proxy URL for this request (e.g. socks5://127.0.0.1:1080)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct ConvertArgs {
    /// HTML file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Output format: html, markdown, json or yaml
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct SearchFetchArgs {
    /// Search query
    query: String,

    #[command(flatten)]
    options: SearchOptions,

    /// Fetch mode for result pages
    #[arg(long)]
    fetch_mode: Option<String>,

    /// Content format: html, markdown, json or yaml
    #[arg(short, long)]
    format: Option<String>,

    /// Write output as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct ConfigArgs {
    /// Write the resolved configuration to this file
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResultFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = overrides_for(&cli);
    let config = load_config(cli.config.as_ref(), &overrides)?;

    init_logging(cli.verbose, &config.general.log_level)?;
    debug!("Resolved configuration:\n{}", config.redacted().to_toml_string()?);

    match cli.command {
        Commands::Search(args) => run_search(&config, args).await,
        Commands::Fetch(args) => run_fetch(&config, args).await,
        Commands::Convert(args) => run_convert(&config, args),
        Commands::SearchFetch(args) => run_search_fetch(&config, args).await,
        Commands::Engines => list_engines(),
        Commands::Config(args) => show_config(&config, args),
    }
}

/// `RUST_LOG` wins, then `-v`, then `general.log_level`.
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn overrides_for(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides {
        timeout: cli.timeout,
        ..Default::default()
    };

    let search = match &cli.command {
        Commands::Search(args) => Some(&args.options),
        Commands::SearchFetch(args) => Some(&args.options),
        _ => None,
    };
    if let Some(options) = search {
        overrides.search_engine = options.engine.clone();
        overrides.search_mode = options.mode.clone();
        overrides.search_limit = options.limit;
        overrides.autoswitch = options.autoswitch.clone();
    }

    match &cli.command {
        Commands::Fetch(args) => {
            overrides.fetcher_mode = args.mode.clone();
            overrides.fetcher_format = args.format.clone();
        }
        Commands::Convert(args) => overrides.fetcher_format = args.format.clone(),
        Commands::SearchFetch(args) => {
            overrides.fetcher_mode = args.fetch_mode.clone();
            overrides.fetcher_format = args.format.clone();
        }
        _ => {}
    }
    overrides
}

fn load_config(path: Option<&PathBuf>, overrides: &ConfigOverrides) -> Result<Config> {
    let Some(path) = path else {
        return Ok(ConfigLoader::standard(overrides)?);
    };
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    let config = ConfigLoader::new()
        .with_overrides(overrides)
        .with_env()
        .with_file(path)
        .load()?;
    Ok(config)
}

fn write_output(output: Option<&PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let mode = config.search.search_mode()?;
    let engine = SearchEngine::from_config(config);
    let results = engine.search(&args.query, mode, config.search.limit).await;
    engine.cleanup().await;
    let results = results?;

    let text = match args.format {
        ResultFormat::Text => format_results(&args.query, &results),
        ResultFormat::Json => render_results(&results, Format::Json)?,
        ResultFormat::Yaml => render_results(&results, Format::Yaml)?,
    };
    write_output(args.output.as_ref(), &text)
}

fn format_results(query: &str, results: &[SearchResult]) -> String {
    let mut out = format!("Search results for \"{}\" ({} results):\n", query, results.len());
    for result in results {
        out.push_str(&format!("\n{}. {}\n   URL: {}\n", result.rank, result.title, result.url));
        if !result.snippet.is_empty() {
            let snippet: String = result.snippet.chars().take(150).collect();
            let ellipsis = if snippet.len() < result.snippet.len() { "..." } else { "" };
            out.push_str(&format!("   {}{}\n", snippet, ellipsis));
        }
    }
    out
}

async fn run_fetch(config: &Config, args: FetchArgs) -> Result<()> {
    let mode = config.fetcher.fetch_mode()?;
    let format = config.fetcher.output_format()?;
    let fetcher = WebFetcher::from_config(config);

    let content = match &args.proxy {
        Some(proxy) => fetcher.fetch_with_proxy(&args.url, proxy, mode, format).await,
        None => fetcher.fetch(&args.url, mode, format).await,
    };
    fetcher.cleanup().await;
    write_output(args.output.as_ref(), &content?)
}

fn run_convert(config: &Config, args: ConvertArgs) -> Result<()> {
    let html = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let format = config.fetcher.output_format()?;
    let converted = Converter::from_config(config).convert(&html, format)?;
    write_output(args.output.as_ref(), &converted)
}

async fn run_search_fetch(config: &Config, args: SearchFetchArgs) -> Result<()> {
    let mode = config.search.search_mode()?;
    let fetch_mode = config.fetcher.fetch_mode()?;
    let format = config.fetcher.output_format()?;

    let engine = SearchEngine::from_config(config);
    let pages = engine
        .search_and_fetch(&args.query, mode, config.search.limit, fetch_mode, format)
        .await;
    engine.cleanup().await;
    let pages = pages?;

    let text = if args.json {
        let items: Vec<_> = pages
            .iter()
            .map(|(result, content)| {
                serde_json::json!({
                    "rank": result.rank,
                    "title": result.title,
                    "url": result.url,
                    "snippet": result.snippet,
                    "content": content,
                })
            })
            .collect();
        serde_json::to_string_pretty(&items)?
    } else {
        pages
            .iter()
            .map(|(result, content)| {
                format!("## {}. {}\n{}\n\n{}\n", result.rank, result.title, result.url, content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    write_output(args.output.as_ref(), &text)
}

fn list_engines() -> Result<()> {
    println!("Available search engines:\n");
    println!("  {:<14} {:<10} {:<10} {}", "NAME", "WEBQUERY", "APIQUERY", "API KEY");
    for kind in ProviderKind::ALL {
        let yes_no = |b: bool| if b { "yes" } else { "-" };
        println!(
            "  {:<14} {:<10} {:<10} {}",
            kind.as_str(),
            yes_no(kind.supports_web()),
            yes_no(kind.supports_api()),
            if kind.supports_api() {
                yes_no(kind.api_requires_key())
            } else {
                ""
            }
        );
    }
    println!();
    println!("Usage: tarzi search \"query\" -e brave -m apiquery");
    Ok(())
}

fn show_config(config: &Config, args: ConfigArgs) -> Result<()> {
    match args.save {
        Some(path) => {
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            if let Some(path) = user_config_path() {
                println!("# user config: {}", path.display());
            }
            print!("{}", config.redacted().to_toml_string()?);
        }
    }
    Ok(())
}
