use anyhow::{bail, Context, Result};
use jobmatch::cli::{Cli, Commands, ConfigAction, RetrievalOverrides};
use jobmatch::config::{Config, ConfigValidator};
use jobmatch::index::{provider_from_config, CorpusIndex, EmbeddingProvider, IndexSource};
use jobmatch::llm::OpenAiClient;
use jobmatch::matching::{LlmJudge, MatchPlan, MatchingRunner};
use jobmatch::model::{
    load_candidates, load_condition_lists, load_corpus, read_json, write_json, ConditionList,
};
use jobmatch::ranking::rank_all;
use jobmatch::retrieval::{
    retrieval_scope, DenseSource, FusionParams, HybridRetriever, RetrievalRunner, TierBands,
};
use jobmatch::storage::Database;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Index { corpus } => {
            cmd_index(cli.config, cli.profile, &corpus)?;
        }
        Commands::Retrieve {
            corpus,
            conditions,
            query_type,
            output,
            store,
            overrides,
        } => {
            cmd_retrieve(
                cli.config,
                cli.profile,
                RetrieveArgs {
                    corpus,
                    conditions,
                    query_type,
                    output,
                    store,
                },
                overrides,
            )?;
        }
        Commands::Match {
            corpus,
            candidates,
            retrieved,
            output,
            store,
        } => {
            cmd_match(cli.config, cli.profile, &corpus, &candidates, &retrieved, &output, store)?;
        }
        Commands::Rank {
            matching,
            aggregation,
            output,
        } => {
            cmd_rank(&matching, &aggregation, &output)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "jobmatch=debug" } else { "jobmatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn source_label(source: Option<IndexSource>) -> &'static str {
    match source {
        Some(IndexSource::Built) => "built",
        Some(IndexSource::Loaded) => "loaded from cache",
        None => "skipped (dense retrieval disabled)",
    }
}

/// The encoder, only when the dense modality is on
fn dense_provider(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    if !config.retrieval.dense_enabled {
        return Ok(None);
    }
    let provider = provider_from_config(&config.embedding).context("Failed to initialize the encoder")?;
    Ok(Some(provider))
}

fn store_path(config: &Config, store: Option<PathBuf>) -> Result<PathBuf> {
    match store {
        Some(path) => Ok(path),
        None => Ok(config.storage.results_db()?),
    }
}

fn print_store_stats(store: &Database) -> Result<()> {
    for (stage, units) in store.stats()? {
        println!("  Stored {} units: {}", stage, units);
    }
    Ok(())
}

fn cmd_index(config_path: Option<PathBuf>, profile: Option<String>, corpus_path: &Path) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let corpus = load_corpus(corpus_path)?;
    let provider = dense_provider(&config)?;
    let index_dir = config.storage.index_dir()?;

    let index = CorpusIndex::open(&index_dir, &corpus, provider.as_deref(), config.embedding.batch_size)?;

    println!("✓ Indexed {} jobs in {}", corpus.len(), index_dir.display());
    println!("  Sparse (BM25): {}", source_label(Some(index.sparse_source)));
    match (&provider, &index.dense) {
        (Some(provider), Some(dense)) => println!(
            "  Dense ({}, {}D): {}",
            provider.model_name(),
            dense.dimension(),
            source_label(index.dense_source)
        ),
        _ => println!("  Dense: {}", source_label(None)),
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, overrides: &RetrievalOverrides) -> Result<()> {
    if let Some(depth) = overrides.depth {
        config.retrieval.depth = depth;
    }
    if let Some(rrf_k) = overrides.rrf_k {
        config.retrieval.rrf_k = rrf_k;
    }
    if overrides.no_bm25 {
        config.retrieval.bm25_enabled = false;
    }
    if overrides.no_dense {
        config.retrieval.dense_enabled = false;
    }
    ConfigValidator::validate(config)?;
    Ok(())
}

struct RetrieveArgs {
    corpus: PathBuf,
    conditions: PathBuf,
    query_type: Option<String>,
    output: PathBuf,
    store: Option<PathBuf>,
}

fn cmd_retrieve(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    args: RetrieveArgs,
    overrides: RetrievalOverrides,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;
    apply_overrides(&mut config, &overrides)?;

    let params = FusionParams::from_config(&config.retrieval)?;
    let query_type = args
        .query_type
        .unwrap_or_else(|| config.retrieval.query_type.clone());

    let corpus = load_corpus(&args.corpus)?;
    let condition_lists = load_condition_lists(&args.conditions, &query_type)?;

    let provider = dense_provider(&config)?;
    let index = CorpusIndex::open(
        &config.storage.index_dir()?,
        &corpus,
        provider.as_deref(),
        config.embedding.batch_size,
    )?;

    let dense = match (&index.dense, &provider) {
        (Some(dense), Some(provider)) => Some(DenseSource::new(dense, provider.as_ref())),
        _ => None,
    };
    let retriever = HybridRetriever::for_index(&corpus, &index, dense.as_ref(), params.clone());

    let scope = retrieval_scope(
        &params,
        &query_type,
        config.retrieval.max_conditions,
        provider.as_deref().map(|p| p.model_name()),
        &corpus,
    );

    let mut candidates: Vec<(String, ConditionList)> = condition_lists
        .into_iter()
        .map(|(id, list)| (id, list.truncated(config.retrieval.max_conditions)))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let store = Database::new(&store_path(&config, args.store)?)?;
    let runner = RetrievalRunner::new(&retriever, &store, scope);
    let summary = runner.run(&candidates);

    let results = runner.export(candidates.iter().map(|(id, _)| id.as_str()))?;
    write_json(&args.output, &results)
        .with_context(|| format!("Failed to write retrieval output {}", args.output.display()))?;

    println!("✓ Retrieved jobs for {} candidates -> {}", results.len(), args.output.display());
    println!("  Computed: {}", summary.computed);
    println!("  Skipped (already stored): {}", summary.skipped);
    println!("  Failed (retry on next run): {}", summary.failed);
    print_store_stats(&store)?;

    Ok(())
}

/// Retrieval output as (candidate id, ranked job ids), in file order
fn ranked_lists(retrieved: Map<String, Value>) -> Vec<(String, Vec<String>)> {
    retrieved
        .into_iter()
        .filter_map(|(candidate_id, ids)| match ids {
            Value::Array(items) => Some((
                candidate_id,
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => {
                tracing::warn!("Retrieved entry for {} is not a list, skipping", candidate_id);
                None
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn cmd_match(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    corpus_path: &Path,
    candidates_path: &Path,
    retrieved_path: &Path,
    output: &Path,
    store: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    if !config.llm.enabled {
        bail!("The LLM judge is disabled (llm.enabled = false)");
    }

    let corpus = load_corpus(corpus_path)?;
    let candidates = load_candidates(candidates_path)?;
    let retrieved: Map<String, Value> = read_json(retrieved_path)?;

    let bands = TierBands::from_config(&config.tiers);
    let plan = MatchPlan::build(ranked_lists(retrieved), &candidates, &corpus, &bands);

    let store = Database::new(&store_path(&config, store)?)?;

    let client = OpenAiClient::from_config(&config.llm).context("Failed to set up the LLM client")?;
    let judge = LlmJudge::new(client);
    let runner = MatchingRunner::new(&judge, &store, &corpus);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let summary = rt.block_on(runner.run(&plan));

    let exported = runner.export(&plan)?;
    write_json(output, &exported)
        .with_context(|| format!("Failed to write matching output {}", output.display()))?;

    println!("✓ Matching results -> {}", output.display());
    println!("  Computed: {}", summary.computed);
    println!("  Skipped (already stored): {}", summary.skipped);
    println!("  Failed (retry on next run): {}", summary.failed);
    println!("  Malformed judge replies: {}", summary.malformed);
    print_store_stats(&store)?;

    Ok(())
}

fn cmd_rank(matching_path: &Path, aggregation_path: &Path, output: &Path) -> Result<()> {
    let matching: Map<String, Value> = read_json(matching_path)?;
    let aggregation: Map<String, Value> = read_json(aggregation_path)?;

    let (ranked, summary) = rank_all(&matching, &aggregation);
    write_json(output, &ranked)
        .with_context(|| format!("Failed to write ranking output {}", output.display()))?;

    println!("✓ Ranked {} candidates -> {}", summary.candidates, output.display());
    if summary.fallbacks > 0 {
        println!("  {} pairs had no usable aggregation score", summary.fallbacks);
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'jobmatch config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    let config = match profile {
        Some(profile) => Config::load_with_profile(&path, &profile)?,
        None => Config::load(&path)?,
    };
    Ok(config)
}
