use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use swipebook::{
    AssetStore, Book, BookHost, BookOptions, CacheConfig, Document, Fetch, InMemoryAssetStore,
    JsonAssetStore, JsonViewStateStore, NullMedia, ResourceCache, Size,
};

#[derive(Parser, Debug)]
#[command(name = "swipebook", version)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a document: pages, templates and resource closures.
    Inspect(InspectArgs),
    /// Open a document headless and play every page on a virtual clock.
    Play(PlayArgs),
    /// Inspect or maintain a resource cache directory.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Viewport as WIDTHxHEIGHT.
    #[arg(long, default_value = "320x568", value_parser = parse_viewport)]
    viewport: Size,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Input document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    cache: CacheArgs,

    /// Viewport as WIDTHxHEIGHT.
    #[arg(long, default_value = "320x568", value_parser = parse_viewport)]
    viewport: Size,

    /// Seconds of playback per page.
    #[arg(long, default_value_t = 1.0)]
    seconds: f64,

    /// Fail pages whose resources did not all load.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Persist the reading position in this JSON file.
    #[arg(long)]
    view_state: Option<PathBuf>,

    /// Seconds to wait for prefetches of each page.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Print entry count and total size.
    Stats(CacheArgs),
    /// Evict least recently used entries.
    Reduce(ReduceArgs),
    /// Delete every cached file and all metadata.
    Flush(CacheArgs),
}

#[derive(Parser, Debug)]
struct CacheArgs {
    /// Cache root directory.
    #[arg(long, default_value = "swipebook-cache")]
    cache: PathBuf,

    /// Cache configuration JSON; overrides `--cache`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Metadata store.
    #[arg(long, value_enum, default_value_t = StoreChoice::Json)]
    store: StoreChoice,
}

#[derive(Parser, Debug)]
struct ReduceArgs {
    #[command(flatten)]
    cache: CacheArgs,

    /// Entries to keep; defaults to the configured limit.
    #[arg(long)]
    limit: Option<usize>,

    /// Extra entries read per batch; defaults to the configured value.
    #[arg(long)]
    extra: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreChoice {
    Json,
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Play(args) => cmd_play(args),
        Command::Cache(CacheCommand::Stats(args)) => cmd_cache_stats(args),
        Command::Cache(CacheCommand::Reduce(args)) => cmd_cache_reduce(args),
        Command::Cache(CacheCommand::Flush(args)) => cmd_cache_flush(args),
    }
}

fn parse_viewport(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let num = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n > 0.0)
            .ok_or_else(|| format!("invalid viewport dimension '{v}'"))
    };
    Ok(Size::new(num(w)?, num(h)?))
}

fn read_document_json(path: &Path) -> anyhow::Result<(serde_json::Value, url::Url)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open document '{}'", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "parse document JSON")?;
    let abs = std::fs::canonicalize(path)
        .with_context(|| format!("resolve document path '{}'", path.display()))?;
    let base = url::Url::from_file_path(&abs)
        .map_err(|()| anyhow::anyhow!("document path '{}' is not absolute", abs.display()))?;
    Ok((json, base))
}

fn open_cache(args: &CacheArgs) -> anyhow::Result<ResourceCache> {
    let config = match &args.config {
        Some(path) => CacheConfig::from_json_file(path)?,
        None => CacheConfig::with_root(&args.cache),
    };
    std::fs::create_dir_all(&config.root)
        .with_context(|| format!("create cache root '{}'", config.root.display()))?;
    let store: Arc<dyn AssetStore> = match args.store {
        StoreChoice::Json => Arc::new(JsonAssetStore::open(config.root.join("assets.json"))?),
        StoreChoice::Memory => Arc::new(InMemoryAssetStore::new()),
        #[cfg(feature = "sqlite")]
        StoreChoice::Sqlite => Arc::new(swipebook::SqliteAssetStore::open(
            &config.root.join("assets.sqlite"),
        )?),
    };
    Ok(ResourceCache::new(&config, store, make_fetcher()?)?)
}

#[cfg(feature = "http")]
fn make_fetcher() -> anyhow::Result<Arc<dyn Fetch>> {
    Ok(Arc::new(swipebook::HttpFetcher::new()?))
}

#[cfg(not(feature = "http"))]
fn make_fetcher() -> anyhow::Result<Arc<dyn Fetch>> {
    tracing::warn!("built without the `http` feature; remote resources will fail to load");
    Ok(Arc::new(swipebook::OfflineFetcher))
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let (json, base) = read_document_json(&args.in_path)?;
    let mut doc = Document::parse(&json, Some(base))?;
    doc.resolve(args.viewport);

    let pages: Vec<serde_json::Value> = doc
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let resources = swipebook::assets::closure::page_resources(&doc, &page.props);
            serde_json::json!({
                "index": i,
                "template": page.template,
                "elements": page.props.get("elements").and_then(|e| e.as_array()).map_or(0, Vec::len),
                "resources": resources,
            })
        })
        .collect();
    let summary = serde_json::json!({
        "title": doc.title(None),
        "dimension": [doc.dimension.width, doc.dimension.height],
        "scale": doc.scale,
        "paging": format!("{:?}", doc.paging),
        "orientation": format!("{:?}", doc.orientation),
        "languages": doc.languages.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        "pages": pages,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let (json, base) = read_document_json(&args.in_path)?;
    let cache = open_cache(&args.cache)?;
    let host = BookHost {
        cache,
        media: Box::new(NullMedia),
        options: BookOptions {
            require_all_resources: args.strict,
            ..BookOptions::default()
        },
        viewport: args.viewport,
        view_state: args
            .view_state
            .map(|p| Box::new(JsonViewStateStore::new(p)) as Box<dyn swipebook::ViewStateStore>),
    };
    let mut book = Book::open(&json, Some(base), host)?;
    let timeout = Duration::from_secs(args.timeout);

    let start = book.current().unwrap_or(0);
    for index in start..book.page_count() {
        book.go_to(index)?;
        if !book.run_until_idle(timeout)? {
            eprintln!("page {index}: prefetch still running after {}s", args.timeout);
        }
        book.advance(args.seconds)?;
        for note in book.drain_notifications() {
            println!("{:>8.3}s  {note:?}", book.now());
        }
    }
    Ok(())
}

fn cmd_cache_stats(args: CacheArgs) -> anyhow::Result<()> {
    let cache = open_cache(&args)?;
    println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);
    Ok(())
}

fn cmd_cache_reduce(args: ReduceArgs) -> anyhow::Result<()> {
    let config = match &args.cache.config {
        Some(path) => CacheConfig::from_json_file(path)?,
        None => CacheConfig::default(),
    };
    let limit = args.limit.unwrap_or(config.reduce_limit);
    let extra = args.extra.unwrap_or(config.reduce_extra);
    let cache = open_cache(&args.cache)?;

    let report = std::rc::Rc::new(std::cell::RefCell::new(None));
    let out = report.clone();
    cache.reduce(limit, extra, move |r| *out.borrow_mut() = Some(r));
    cache.run_until_idle(Duration::from_secs(60));
    let report = report
        .borrow_mut()
        .take()
        .context("cache reduce did not finish")??;
    eprintln!(
        "examined {} entries, removed {}, {} remaining",
        report.examined, report.removed, report.remaining
    );
    Ok(())
}

fn cmd_cache_flush(args: CacheArgs) -> anyhow::Result<()> {
    let cache = open_cache(&args)?;
    let removed = cache.flush()?;
    eprintln!("removed {removed} cached files");
    Ok(())
}
