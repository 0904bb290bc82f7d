use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub convflow: ConvflowConfig,
    pub kb: KbConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Benchmark the input conversations come from; decides how gold answers are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Benchmark {
    /// Answers given as `[{id, label}]`.
    #[default]
    Convmix,
    /// Answers given as one `;`-separated string of Wikidata URLs / literals.
    Convquestions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvflowConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub benchmark: Benchmark,
}

/// KB service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KbConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Upper bound on facts returned per entity neighborhood.
    #[serde(default = "default_neighborhood_max_facts")]
    pub neighborhood_max_facts: usize,
    /// Forwarded verbatim to the KB search endpoint.
    #[serde(default)]
    pub search_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Annotation switches
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default = "default_true")]
    pub transitive_relevances: bool,
    #[serde(default = "default_true")]
    pub extract_relevance_dataset: bool,
    #[serde(default)]
    pub relation_shared_active: bool,
    #[serde(default)]
    pub remove_stopwords: bool,
    #[serde(default)]
    pub stopwords_path: Option<PathBuf>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            transitive_relevances: true,
            extract_relevance_dataset: true,
            relation_shared_active: false,
            remove_stopwords: false,
            stopwords_path: None,
        }
    }
}

/// Dataset locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_benchmark_dir")]
    pub benchmark_dir: PathBuf,
    #[serde(default = "default_train_input")]
    pub train_input: PathBuf,
    #[serde(default = "default_dev_input")]
    pub dev_input: PathBuf,
    #[serde(default = "default_test_input")]
    pub test_input: PathBuf,
    #[serde(default = "default_annotated_dir")]
    pub annotated_dir: PathBuf,
    #[serde(default = "default_relevance_dir")]
    pub relevance_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            benchmark_dir: default_benchmark_dir(),
            train_input: default_train_input(),
            dev_input: default_dev_input(),
            test_input: default_test_input(),
            annotated_dir: default_annotated_dir(),
            relevance_dir: default_relevance_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> usize {
    3
}

fn default_neighborhood_max_facts() -> usize {
    1000
}

fn default_cache_capacity() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_benchmark_dir() -> PathBuf {
    PathBuf::from("_benchmarks/convmix")
}

fn default_train_input() -> PathBuf {
    PathBuf::from("train_set/train_set_ALL.json")
}

fn default_dev_input() -> PathBuf {
    PathBuf::from("dev_set/dev_set_ALL.json")
}

fn default_test_input() -> PathBuf {
    PathBuf::from("test_set/test_set_ALL.json")
}

fn default_annotated_dir() -> PathBuf {
    PathBuf::from("_intermediate_representations/convmix/annotated")
}

fn default_relevance_dir() -> PathBuf {
    PathBuf::from("_intermediate_representations/convmix/tr")
}

/// One dataset split to annotate: input file, annotated output, relevance output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub name: &'static str,
    pub input: PathBuf,
    pub output: PathBuf,
    pub relevance_output: PathBuf,
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CONVFLOW_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CONVFLOW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_path(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.kb.base_url.trim().is_empty() {
            anyhow::bail!("kb.base_url must not be empty");
        }

        url::Url::parse(&self.kb.base_url)
            .with_context(|| format!("kb.base_url is not a valid URL: {}", self.kb.base_url))?;

        if self.kb.neighborhood_max_facts == 0 {
            anyhow::bail!("kb.neighborhood_max_facts must be greater than 0");
        }

        if self.annotation.remove_stopwords {
            match &self.annotation.stopwords_path {
                Some(path) if path.is_file() => {}
                Some(path) => anyhow::bail!(
                    "annotation.stopwords_path does not exist: {}",
                    path.display()
                ),
                None => anyhow::bail!(
                    "annotation.remove_stopwords requires annotation.stopwords_path"
                ),
            }
        }

        Ok(())
    }

    /// Train/dev/test splits resolved against the configured directories
    pub fn splits(&self) -> Vec<Split> {
        let paths = &self.paths;
        [
            ("train", &paths.train_input),
            ("dev", &paths.dev_input),
            ("test", &paths.test_input),
        ]
        .into_iter()
        .map(|(name, input)| Split {
            name,
            input: paths.benchmark_dir.join(input),
            output: paths.annotated_dir.join(format!("annotated_{}.json", name)),
            relevance_output: paths.relevance_dir.join(format!("{}.json", name)),
        })
        .collect()
    }
}
