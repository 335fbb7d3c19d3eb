use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ine_rs::viz::{ChartKind, PlotOptions};
use ine_rs::{Client, ClientConfig, DataResponse, DimensionFilter, Indicator, Language};
use ine_rs::{catalogue, stats, storage, viz};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "ine",
    version,
    about = "Search, fetch, analyze & export Statistics Portugal (INE) indicators"
)]
struct Cli {
    /// Response language.
    #[arg(long, global = true, value_enum, ignore_case = true, default_value_t = Lang::En)]
    lang: Lang,
    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,
    /// Bypass the on-disk response cache.
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,
    /// Log verbosity (RUST_LOG overrides).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the indicator catalogue.
    Search(SearchArgs),
    /// Show catalogue details of one indicator.
    Info { code: String },
    /// List the dimensions (and their values) of an indicator.
    Dimensions { code: String },
    /// Download indicator data (and optionally plot and print stats).
    Download(DownloadArgs),
    /// List catalogue themes with indicator counts.
    Themes,
    /// List catalogue indicators.
    Indicators(IndicatorsArgs),
    /// Inspect or clear the response cache.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show cache location, entry counts and size.
    Info,
    /// Remove every cached response.
    Clear {
        /// Do not ask for confirmation.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Lang {
    En,
    Pt,
}

impl From<Lang> for Language {
    fn from(l: Lang) -> Self {
        match l {
            Lang::En => Language::En,
            Lang::Pt => Language::Pt,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Chart {
    Line,
    Bar,
    Area,
    Scatter,
}

impl From<Chart> for ChartKind {
    fn from(c: Chart) -> Self {
        match c {
            Chart::Line => ChartKind::Line,
            Chart::Bar => ChartKind::Bar,
            Chart::Area => ChartKind::Area,
            Chart::Scatter => ChartKind::Scatter,
        }
    }
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Text to look for in titles, descriptions and keywords.
    query: String,
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    subtheme: Option<String>,
    /// Maximum number of results to print.
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args, Debug)]
struct IndicatorsArgs {
    #[arg(long)]
    theme: Option<String>,
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Indicator code (e.g., 0004167).
    code: String,
    /// Output file (defaults to <code>.<format>).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format. If omitted, inferred from --output extension (csv otherwise).
    #[arg(short, long, value_enum)]
    format: Option<OutFormat>,
    /// Omit the metadata header from CSV output.
    #[arg(long, default_value_t = false)]
    no_metadata: bool,
    /// Dimension filter, repeatable (e.g., -d Dim1=S7A2023 -d Dim2=PT).
    #[arg(short = 'd', long = "dim")]
    dims: Vec<String>,
    /// Fetch in pages of this many records.
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Print summary statistics to stdout.
    #[arg(long, default_value_t = false)]
    stats: bool,
    /// Group statistics by this field.
    #[arg(long)]
    group_by: Option<String>,
    /// Create a chart at the given path (.svg or .png).
    #[arg(long)]
    plot: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Chart::Line)]
    chart: Chart,
    /// Field plotted along x.
    #[arg(long, default_value = "Period")]
    x: String,
    /// Numeric field plotted along y.
    #[arg(long, default_value = "value")]
    y: String,
    /// Field used for chart series.
    #[arg(long)]
    color: Option<String>,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 600)]
    height: u32,
}

fn init_logging(level: LogLevel) {
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .init();
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Up to 4 decimals, trailing zeros trimmed.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn print_indicators<'a>(indicators: impl IntoIterator<Item = &'a Indicator>, limit: usize) {
    for ind in indicators.into_iter().take(limit) {
        println!(
            "{:<9} {:<70} {}",
            ind.code,
            truncate(&ind.title, 70),
            ind.theme.as_deref().unwrap_or("")
        );
    }
}

fn build_client(cli: &Cli) -> Result<Client> {
    let mut config = ClientConfig::default()
        .with_language(cli.lang.into())
        .with_timeout(Duration::from_secs(cli.timeout));
    if cli.no_cache {
        config = config.without_cache();
    }
    Client::new(config).context("create INE client")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    let client = build_client(&cli)?;
    match cli.cmd {
        Command::Search(args) => cmd_search(&client, args),
        Command::Info { code } => cmd_info(&client, &code),
        Command::Dimensions { code } => cmd_dimensions(&client, &code),
        Command::Download(args) => cmd_download(&client, args),
        Command::Themes => cmd_themes(&client),
        Command::Indicators(args) => cmd_indicators(&client, args),
        Command::Cache { cmd } => cmd_cache(&client, cmd),
    }
}

fn cmd_search(client: &Client, args: SearchArgs) -> Result<()> {
    let all = client.get_catalogue()?;
    let found = catalogue::search(
        &all,
        &args.query,
        args.theme.as_deref(),
        args.subtheme.as_deref(),
    );
    if found.is_empty() {
        eprintln!("No indicators found for '{}'", args.query);
        return Ok(());
    }
    print_indicators(found.iter().copied(), args.limit);
    if found.len() > args.limit {
        eprintln!("Showing {} of {} results (use --limit)", args.limit, found.len());
    }
    Ok(())
}

fn cmd_info(client: &Client, code: &str) -> Result<()> {
    let ind = client.get_indicator(code)?;
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    println!("Code:         {}", ind.code);
    println!("Title:        {}", ind.title);
    println!("Theme:        {}", opt(&ind.theme));
    println!("Subtheme:     {}", opt(&ind.subtheme));
    println!("Periodicity:  {}", opt(&ind.periodicity));
    println!("Last period:  {}", opt(&ind.last_period));
    println!(
        "Last update:  {}",
        ind.last_update
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("Geo level:    {}", opt(&ind.geo_last_level));
    println!("Source:       {}", opt(&ind.source));
    if let Some(desc) = &ind.description {
        println!("Description:  {desc}");
    }
    if !ind.keywords.is_empty() {
        println!("Keywords:     {}", ind.keywords.join(", "));
    }
    if let Some(url) = &ind.html_url {
        println!("Web:          {url}");
    }
    Ok(())
}

fn cmd_dimensions(client: &Client, code: &str) -> Result<()> {
    let dims = client.get_dimensions(code)?;
    if dims.is_empty() {
        eprintln!("Indicator {code} reports no dimensions");
    }
    for dim in dims {
        println!("{} ({}): {} values", dim.query_key(), dim.name, dim.values.len());
        for v in dim.values.iter().take(20) {
            println!("    {:<16} {}", v.code, v.label);
        }
        if dim.values.len() > 20 {
            println!("    ... {} more", dim.values.len() - 20);
        }
    }
    Ok(())
}

fn fetch_all(client: &Client, code: &str, filter: Option<&DimensionFilter>, chunk: usize) -> Result<DataResponse> {
    let mut merged: Option<DataResponse> = None;
    for page in client.get_all_data(code, filter, chunk)? {
        let page = page?;
        match merged.as_mut() {
            Some(m) => m.data.extend(page.data),
            None => merged = Some(page),
        }
    }
    merged.ok_or_else(|| anyhow::anyhow!("no pages returned for {code}"))
}

fn plot_options(args: &DownloadArgs, title: &str) -> PlotOptions {
    let mut opts = PlotOptions::default()
        .with_kind(args.chart.into())
        .with_x(args.x.clone())
        .with_y(args.y.clone())
        .with_title(title)
        .with_size(args.width, args.height);
    if let Some(color) = &args.color {
        opts = opts.with_color(color.clone());
    }
    opts
}

fn cmd_download(client: &Client, args: DownloadArgs) -> Result<()> {
    let filter = DimensionFilter::parse_assignments(&args.dims)?;
    let filter = (!filter.is_empty()).then_some(filter);

    let resp = match args.chunk_size {
        Some(chunk) => fetch_all(client, &args.code, filter.as_ref(), chunk)?,
        None => client.get_data(&args.code, filter.as_ref())?,
    };

    let fmt = match (args.format, &args.output) {
        (Some(f), _) => f,
        (None, Some(path)) => match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("json") => OutFormat::Json,
            _ => OutFormat::Csv,
        },
        (None, None) => OutFormat::Csv,
    };
    let path = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(match fmt {
            OutFormat::Csv => format!("{}.csv", args.code),
            OutFormat::Json => format!("{}.json", args.code),
        })
    });
    match fmt {
        OutFormat::Csv => storage::save_csv(&resp, &path, !args.no_metadata)?,
        OutFormat::Json => storage::save_json(&resp, &path, true)?,
    }
    eprintln!("Saved {} rows to {}", resp.len(), path.display());

    if let Some(plot_path) = args.plot.as_ref() {
        let opts = plot_options(&args, &resp.title);
        viz::plot(&resp.data, &opts, plot_path)?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }

    if args.stats {
        for s in stats::grouped_summary(&resp.data, args.group_by.as_deref()) {
            println!(
                "{}  count={} missing={}  min={} max={} mean={} median={}",
                s.group.as_deref().unwrap_or(&resp.indicator_code),
                s.count,
                s.missing,
                fmt_opt(s.min),
                fmt_opt(s.max),
                fmt_opt(s.mean),
                fmt_opt(s.median)
            );
        }
    }
    Ok(())
}

fn cmd_themes(client: &Client) -> Result<()> {
    for t in client.list_themes()? {
        println!("{:<50} {:>5}", t.theme, t.indicators);
    }
    Ok(())
}

fn cmd_indicators(client: &Client, args: IndicatorsArgs) -> Result<()> {
    let all = client.get_catalogue()?;
    let shown = catalogue::search(&all, "", args.theme.as_deref(), None);
    print_indicators(shown.iter().copied(), args.limit);
    eprintln!("{} indicators", shown.len());
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn cmd_cache(client: &Client, cmd: CacheCommand) -> Result<()> {
    let Some(cache) = client.cache() else {
        bail!("cache is disabled (--no-cache)");
    };
    match cmd {
        CacheCommand::Info => {
            let s = cache.stats();
            println!("Directory:         {}", s.dir.display());
            println!("Metadata entries:  {}", s.metadata_entries);
            println!("Data entries:      {}", s.data_entries);
            println!("Total entries:     {}", s.total_entries);
            println!("Size:              {:.2} MB", s.size_bytes as f64 / (1024.0 * 1024.0));
            println!("Metadata TTL:      {} days", s.metadata_ttl.as_secs() / 86_400);
            println!("Data TTL:          {} days", s.data_ttl.as_secs() / 86_400);
        }
        CacheCommand::Clear { yes } => {
            if !yes && !confirm("Clear all cached data?")? {
                eprintln!("Aborted");
                return Ok(());
            }
            cache.clear()?;
            eprintln!("Cache cleared");
        }
    }
    Ok(())
}
