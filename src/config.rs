use anyhow::{Context, Result};
use evidence_harness_core::{ClassifierTable, DomainLabel, RoutingTable, SufficiencyPolicy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Adapter names the application knows how to build.
pub const KNOWN_ADAPTERS: &[&str] = &["arxiv", "pubmed", "semantic_scholar"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub sufficiency: SufficiencyPolicy,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(default = "default_local_limit")]
    pub limit: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            limit: default_local_limit(),
        }
    }
}

fn default_local_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Per-label overrides of the built-in routing table.
    #[serde(default)]
    pub table: BTreeMap<String, Vec<String>>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout_secs(),
            fetch_limit: default_fetch_limit(),
            max_results: default_max_results(),
            table: BTreeMap::new(),
        }
    }
}

fn default_adapter_timeout_secs() -> u64 {
    8
}
fn default_fetch_limit() -> usize {
    20
}
fn default_max_results() -> usize {
    30
}

impl RoutingConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// Extra terms per label, appended to the built-in term lists.
    #[serde(default)]
    pub extra_terms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub arxiv: ArxivConfig,
    #[serde(default)]
    pub pubmed: PubmedConfig,
    #[serde(default)]
    pub semantic_scholar: SemanticScholarConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArxivConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_arxiv_url")]
    pub base_url: String,
    /// Category prefix for labels without an entry in `categories`.
    #[serde(default)]
    pub category: Option<String>,
    /// Category prefix per domain label. An empty value searches all of
    /// arXiv for that label. Replaces the defaults when set.
    #[serde(default = "default_arxiv_categories")]
    pub categories: BTreeMap<String, String>,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_arxiv_url(),
            category: None,
            categories: default_arxiv_categories(),
        }
    }
}

impl ArxivConfig {
    /// `categories` keyed by parsed label.
    pub fn label_categories(&self) -> Result<BTreeMap<DomainLabel, String>> {
        self.categories
            .iter()
            .map(|(label, category)| {
                let label: DomainLabel = label
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!("adapters.arxiv.categories: {}", e))?;
                Ok((label, category.clone()))
            })
            .collect()
    }
}

fn default_arxiv_url() -> String {
    "https://export.arxiv.org/api/query".to_string()
}
fn default_arxiv_categories() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("technical".to_string(), "cs".to_string()),
        ("physical-science".to_string(), "physics".to_string()),
    ])
}

#[derive(Debug, Deserialize, Clone)]
pub struct PubmedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_pubmed_url")]
    pub base_url: String,
    #[serde(default = "default_pubmed_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_pubmed_url(),
            api_key_env: default_pubmed_key_env(),
            email: None,
        }
    }
}

fn default_pubmed_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}
fn default_pubmed_key_env() -> String {
    "PUBMED_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SemanticScholarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_s2_url")]
    pub base_url: String,
    #[serde(default = "default_s2_key_env")]
    pub api_key_env: String,
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_s2_url(),
            api_key_env: default_s2_key_env(),
        }
    }
}

fn default_s2_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}
fn default_s2_key_env() -> String {
    "S2_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: default_synthesis_provider(),
            model: None,
            base_url: default_openai_url(),
            api_key_env: default_openai_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_synthesis_provider() -> String {
    "extractive".to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Built-in routing table with `[routing.table]` overrides applied.
    pub fn routing_table(&self) -> Result<RoutingTable> {
        let mut overrides = BTreeMap::new();
        for (label, adapters) in &self.routing.table {
            let label: DomainLabel = label
                .parse()
                .map_err(|e: String| anyhow::anyhow!("routing.table: {}", e))?;
            for adapter in adapters {
                if !KNOWN_ADAPTERS.contains(&adapter.as_str()) {
                    anyhow::bail!(
                        "routing.table.{}: unknown adapter '{}'. Must be one of: {}",
                        label,
                        adapter,
                        KNOWN_ADAPTERS.join(", ")
                    );
                }
            }
            overrides.insert(label, adapters.clone());
        }
        RoutingTable::builtin()
            .with_overrides(overrides)
            .context("Invalid routing table")
    }

    /// Built-in classifier table with `[classifier.extra_terms]` appended.
    pub fn classifier_table(&self) -> Result<ClassifierTable> {
        let mut table = ClassifierTable::builtin();
        for (label, terms) in &self.classifier.extra_terms {
            let label: DomainLabel = label
                .parse()
                .map_err(|e: String| anyhow::anyhow!("classifier.extra_terms: {}", e))?;
            table = table.with_extra_terms(label, terms.iter().cloned());
        }
        Ok(table)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.local.limit < 1 {
        anyhow::bail!("local.limit must be >= 1");
    }

    let s = &config.sufficiency;
    if s.min_results < 1 {
        anyhow::bail!("sufficiency.min_results must be >= 1");
    }
    if s.recency_window < 1 || s.coverage_window < 1 {
        anyhow::bail!("sufficiency.recency_window and sufficiency.coverage_window must be >= 1");
    }
    if s.recency_years < 0 {
        anyhow::bail!("sufficiency.recency_years must be >= 0");
    }

    let r = &config.routing;
    if !(1..=120).contains(&r.adapter_timeout_secs) {
        anyhow::bail!("routing.adapter_timeout_secs must be in [1, 120]");
    }
    if r.fetch_limit < 1 {
        anyhow::bail!("routing.fetch_limit must be >= 1");
    }
    if r.max_results < 1 {
        anyhow::bail!("routing.max_results must be >= 1");
    }
    config.routing_table()?;
    config.classifier_table()?;
    config.adapters.arxiv.label_categories()?;

    match config.synthesis.provider.as_str() {
        "extractive" => {}
        "openai" => {
            if config.synthesis.model.is_none() {
                anyhow::bail!("synthesis.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown synthesis provider: '{}'. Must be extractive or openai.",
            other
        ),
    }

    Ok(())
}
