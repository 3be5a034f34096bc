//! CLI command definitions and parsing
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "jobmatch",
    version,
    author = "neur0map",
    about = "Hybrid retrieval and criterion-level ranking of resumes against job postings",
    long_about = "jobmatch retrieves plausible job postings for each candidate with a fused BM25 + dense \
                  vector search, judges the candidate against every inclusion and exclusion criterion of \
                  the retrieved jobs, and ranks the judged jobs per candidate."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/jobmatch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// One-off overrides of the retrieval section
#[derive(Args, Debug, Default, Clone)]
pub struct RetrievalOverrides {
    /// Result depth per modality and of the fused list
    #[arg(long)]
    pub depth: Option<usize>,

    /// Fusion rank offset k
    #[arg(long)]
    pub rrf_k: Option<f64>,

    /// Disable the BM25 modality
    #[arg(long)]
    pub no_bm25: bool,

    /// Disable the dense modality
    #[arg(long)]
    pub no_dense: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build (or verify the cache of) the sparse and dense corpus indices
    Index {
        /// Job corpus, one JSON record per line
        #[arg(long, value_name = "JSONL")]
        corpus: PathBuf,
    },

    /// Retrieve and fuse a ranked job list for every candidate
    Retrieve {
        /// Job corpus, one JSON record per line
        #[arg(long, value_name = "JSONL")]
        corpus: PathBuf,

        /// Candidate id -> query type -> conditions
        #[arg(long, value_name = "JSON")]
        conditions: PathBuf,

        /// Entry of the condition file to use (defaults to retrieval.query_type)
        #[arg(short, long)]
        query_type: Option<String>,

        /// Output file: candidate id -> ranked job ids
        #[arg(short, long, value_name = "JSON")]
        output: PathBuf,

        /// Result store (defaults to <data_dir>/results.sqlite)
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,

        #[command(flatten)]
        overrides: RetrievalOverrides,
    },

    /// Judge candidates against the criteria of their retrieved jobs
    Match {
        /// Job corpus, one JSON record per line
        #[arg(long, value_name = "JSONL")]
        corpus: PathBuf,

        /// Candidates, one JSON record per line
        #[arg(long, value_name = "JSONL")]
        candidates: PathBuf,

        /// Retrieval output: candidate id -> ranked job ids
        #[arg(long, value_name = "JSON")]
        retrieved: PathBuf,

        /// Output file: candidate id -> tier -> job id -> verdicts
        #[arg(short, long, value_name = "JSON")]
        output: PathBuf,

        /// Result store (defaults to <data_dir>/results.sqlite)
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,
    },

    /// Combine matching and aggregation scores into a final ranking
    Rank {
        /// Matching output: candidate id -> tier -> job id -> verdicts
        #[arg(long, value_name = "JSON")]
        matching: PathBuf,

        /// Aggregation scores: candidate id -> job id -> {relevance_score_R, eligibility_score_E}
        #[arg(long, value_name = "JSON")]
        aggregation: PathBuf,

        /// Output file: candidate id -> [[job id, score], ...]
        #[arg(short, long, value_name = "JSON")]
        output: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
