use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use lister_engine::{
    DefinitionRef, DefinitionRegistry, FetchPolicy, HttpTransport, Lister, ListerConfig, OpenOptions, SearchMode,
    inference::infer_option_value_key_with,
};
use lister_types::{DefinitionPatch, FetchQuery, FieldSpec, Mapping, OptionValue};
use lister_util::{expand_tilde, http::extract_collection_items};
use serde_json::{Map, Value, json};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "lister", version, about = "Headless driver for the Lister picker engine")]
struct Cli {
    /// Configuration file (defaults to LISTER_CONFIG_PATH or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch options for a definition and print them as JSON
    Fetch {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, short)]
        query: Option<String>,
        /// Column targeted by the search
        #[arg(long)]
        target: Option<String>,
        /// Bypass the response cache
        #[arg(long)]
        refresh: bool,
        /// Print the raw rows alongside the options
        #[arg(long)]
        raw: bool,
    },
    /// Infer the option value key for rows stored in a JSON file
    Infer {
        rows: PathBuf,
        #[arg(long)]
        fallback: Option<String>,
        #[arg(long)]
        sample_size: Option<usize>,
    },
    /// Drive a picker session: select values, apply, print the outcome
    Pick {
        #[command(flatten)]
        source: SourceArgs,
        /// Option values to toggle, in order
        #[arg(long = "select", short = 's', required = true)]
        select: Vec<String>,
        #[arg(long)]
        multiple: bool,
        #[arg(long, short)]
        query: Option<String>,
        /// Filter fetched options in memory instead of searching remotely
        #[arg(long)]
        local: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Registered definition id, or an endpoint path for an inline definition
    definition: String,
    /// Definitions file (YAML or JSON)
    #[arg(long)]
    definitions: Option<PathBuf>,
    /// Request filter as key=value; the value is parsed as JSON when possible
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,
    /// Value key for inline definitions (inferred when omitted)
    #[arg(long)]
    value_key: Option<String>,
    #[arg(long)]
    label_key: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let mut config = ListerConfig::load_from_path(path)?;
            config.apply_env_overrides();
            config
        }
        None => ListerConfig::load()?,
    };

    match cli.command {
        Command::Fetch {
            source,
            query,
            target,
            refresh,
            raw,
        } => run_fetch(config, source, query, target, refresh, raw).await,
        Command::Infer {
            rows,
            fallback,
            sample_size,
        } => run_infer(&config, rows, fallback, sample_size),
        Command::Pick {
            source,
            select,
            multiple,
            query,
            local,
        } => run_pick(config, source, select, multiple, query, local).await,
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_fetch(config: ListerConfig, source: SourceArgs, query: Option<String>, target: Option<String>, refresh: bool, raw: bool) -> Result<()> {
    let (lister, reference, filters) = build_lister(config, &source)?;
    let definition = lister
        .resolve(&reference)
        .ok_or_else(|| anyhow!("definition '{}' is not registered", source.definition))?;

    let search_target = target.or_else(|| definition.search.as_ref().and_then(|search| search.default_target()));
    let fetch_query = FetchQuery::new(query.unwrap_or_default()).with_target(search_target);
    let policy = if refresh { FetchPolicy::Refresh } else { FetchPolicy::CacheFirst };
    let result = lister
        .fetcher()
        .fetch_with_policy(&definition, &filters, &fetch_query, policy)
        .await
        .with_context(|| format!("fetch failed for '{}'", definition.id))?;

    let output = if raw {
        json!({"options": result.options, "raw": result.raw})
    } else {
        serde_json::to_value(&result.options)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_infer(config: &ListerConfig, rows_path: PathBuf, fallback: Option<String>, sample_size: Option<usize>) -> Result<()> {
    let content = fs::read_to_string(&rows_path).with_context(|| format!("Failed to read rows file: {}", rows_path.display()))?;
    let payload: Value = serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", rows_path.display()))?;
    let rows = extract_collection_items(&payload, None).context("rows file does not contain a row array")?;

    let fallback = fallback.unwrap_or_else(|| config.fallback_value_key.clone());
    let sample_size = sample_size.unwrap_or(config.inference_sample_size);
    let inferred = infer_option_value_key_with(&rows, &fallback, sample_size);
    println!("{}", serde_json::to_string_pretty(&json!({"key": inferred.key, "inferred": inferred.inferred}))?);
    Ok(())
}

async fn run_pick(
    config: ListerConfig,
    source: SourceArgs,
    select: Vec<String>,
    multiple: bool,
    query: Option<String>,
    local: bool,
) -> Result<()> {
    let (lister, reference, filters) = build_lister(config, &source)?;
    let mut options = if multiple { OpenOptions::multiple() } else { OpenOptions::single().confirm(true) };
    options = options.owner("cli");
    if local {
        options = options.search_mode(SearchMode::Local);
    }

    let handle = lister
        .open(reference, filters, options)
        .ok_or_else(|| anyhow!("definition '{}' is not registered", source.definition))?;
    let session_id = handle.session_id();
    let mut session = lister
        .wait_until_loaded(session_id)
        .await
        .context("session closed while loading")?;

    if let Some(query) = query {
        lister.set_query(session_id, query);
        session = lister
            .wait_until_loaded(session_id)
            .await
            .context("session closed while searching")?;
    }
    if let Some(error) = &session.last_error {
        lister.close(session_id);
        bail!("fetch failed: {error}");
    }

    for wanted in &select {
        let value = session
            .options
            .iter()
            .map(|option| option.value.clone())
            .find(|value| value.to_string() == *wanted)
            .unwrap_or_else(|| OptionValue::from(wanted.as_str()));
        if !lister.toggle(session_id, value) {
            debug!(value = %wanted, "selection ignored");
            eprintln!("warning: '{wanted}' is not a selectable option");
        }
    }
    lister.apply(session_id);

    let outcome = handle.await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn build_lister(config: ListerConfig, source: &SourceArgs) -> Result<(Lister, DefinitionRef, Map<String, Value>)> {
    let base_url = source.base_url.clone().or_else(|| config.base_url.clone());
    let transport = HttpTransport::from_env(base_url.as_deref())?;

    let definitions_path = source.definitions.clone().or_else(|| config.definitions_path.clone());
    let registry = match definitions_path {
        Some(path) => DefinitionRegistry::from_file(&expand_tilde(&path.to_string_lossy()))?,
        None => DefinitionRegistry::new(),
    };
    let reference = definition_reference(&registry, source);
    let filters = parse_filters(&source.filters)?;

    let lister = Lister::new(Arc::new(transport), config).with_registry(registry);
    Ok((lister, reference, filters))
}

/// Registered ids resolve by name (patched with any mapping overrides);
/// anything else is treated as an inline endpoint.
fn definition_reference(registry: &DefinitionRegistry, source: &SourceArgs) -> DefinitionRef {
    let mapping = Mapping {
        option_value: source.value_key.clone().map(FieldSpec::Key),
        option_label: source.label_key.clone().map(FieldSpec::Key),
        ..Mapping::default()
    };
    if registry.get(&source.definition).is_some() {
        if mapping.is_empty() {
            return DefinitionRef::named(source.definition.clone());
        }
        return DefinitionRef::Patched {
            id: source.definition.clone(),
            patch: DefinitionPatch::default().with_mapping(mapping),
        };
    }
    DefinitionRef::Inline(DefinitionPatch::endpoint(source.definition.clone()).with_mapping(mapping))
}

fn parse_filters(raw: &[String]) -> Result<Map<String, Value>> {
    let mut filters = Map::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid filter '{entry}': expected key=value"))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        filters.insert(key.trim().to_string(), value);
    }
    Ok(filters)
}
