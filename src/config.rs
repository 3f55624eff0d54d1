//! Configuration: runtime settings plus the domain definition.
//!
//! The domain (entities, category enumeration) is plain configuration data
//! loaded once at startup and passed into component constructors. There is no
//! process-wide mutable domain state; switching domains means loading a
//! different file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default config file name, discovered in the working directory.
pub const CONFIG_FILE_NAME: &str = "feeacquire.toml";

/// Name prefix used for staging indexes during publish.
pub const STAGING_INDEX_INFIX: &str = "_new_";

/// One category in the closed classification enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Identifier sent to and expected back from the classification service.
    pub id: String,
    /// Human-readable description embedded in the classification prompt.
    pub description: String,
}

/// An entity whose published documents are tracked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Display name.
    pub name: String,
    /// Direct URLs of documents to retrieve for this entity.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// The domain definition: which entities exist and how documents classify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name (e.g. "banking").
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Category assigned to documents that have not been classified yet.
    /// The classification service never returns this value.
    #[serde(default = "default_category")]
    pub default_category: String,
    /// Closed set of classification categories, in prompt order.
    pub categories: Vec<CategorySpec>,
    /// Entities keyed by identifier (also the per-entity folder name).
    #[serde(default)]
    pub entities: HashMap<String, EntityConfig>,
}

fn default_category() -> String {
    "Uncategorized".to_string()
}

impl DomainConfig {
    /// Check that a category identifier is a member of the closed set.
    ///
    /// The default category counts as a member: records carry it before
    /// classification has run.
    pub fn is_known_category(&self, id: &str) -> bool {
        id == self.default_category || self.categories.iter().any(|c| c.id == id)
    }

    /// Validate the domain definition at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.categories.is_empty() {
            anyhow::bail!("domain '{}' defines no categories", self.name);
        }
        for (i, cat) in self.categories.iter().enumerate() {
            if cat.id.is_empty() {
                anyhow::bail!("domain '{}' has an empty category id", self.name);
            }
            if self.categories[..i].iter().any(|c| c.id == cat.id) {
                anyhow::bail!("duplicate category id '{}'", cat.id);
            }
            if cat.id == self.default_category {
                anyhow::bail!(
                    "category '{}' collides with the default category",
                    cat.id
                );
            }
        }
        Ok(())
    }
}

/// Search index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Base URL of the search index service.
    #[serde(default)]
    pub url: String,
    /// API key; falls back to MEILI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    /// Public name of the index.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Documents per batch during publish.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_index_name() -> String {
    "feedocs".to_string()
}
fn default_batch_size() -> usize {
    500
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            index_name: default_index_name(),
            batch_size: default_batch_size(),
        }
    }
}

/// Classification / embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// API endpoint base.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// API key; falls back to GEMINI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    /// Model used for classification.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Model used for page embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Maximum number of leading pages sent to the classifier.
    #[serde(default = "default_classify_pages_limit")]
    pub classify_pages_limit: usize,
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_embedding_model() -> String {
    "embedding-001".to_string()
}
fn default_classify_pages_limit() -> usize {
    12
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
            classify_pages_limit: default_classify_pages_limit(),
        }
    }
}

/// Retrieval and pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Worker tasks for the enrichment pipeline.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Attempts for transient transport failures (classification, embedding).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_workers() -> usize {
    4
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            workers: default_workers(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Full configuration: settings plus the domain definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding one folder per entity.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    pub domain: DomainConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    /// Load configuration from a TOML file, applying environment fallbacks
    /// and validating the domain.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env();
        config.domain.validate()?;
        Ok(config)
    }

    /// Fill empty credentials from the environment.
    fn apply_env(&mut self) {
        if self.index.url.is_empty() {
            if let Ok(url) = std::env::var("MEILI_URL") {
                self.index.url = url;
            }
        }
        if self.index.api_key.is_empty() {
            if let Ok(key) = std::env::var("MEILI_API_KEY") {
                self.index.api_key = key;
            }
        }
        if self.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                self.llm.api_key = key;
            }
        }
    }

    /// Write the configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, rendered)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Starter banking domain configuration used by `fees init`.
    pub fn starter_banking() -> Self {
        let categories = vec![
            (
                "CustomerGuide",
                "Οδηγίες για την διευκόλυνση των πελατών της τράπεζας κατά τη διενέργεια ραντεβού ή συναλλαγών",
            ),
            (
                "DeltioPliroforisisPeriTelon",
                "Έγγραφα με τίτλο \"Δελτίο Πληροφόρησης περί Τελών\"",
            ),
            (
                "Disclosure",
                "Έγγραφα ενημέρωσης πελάτη για υποχρεώσεις, κινδύνους και διαφάνεια όρων (αποποιήσεις ευθυνών, γνωστοποιήσεις), εκτός από Δελτία Πληροφόρησης περί Τελών",
            ),
            (
                "GeneralTermsContract",
                "Γενικοί όροι σύμβασης και συναλλαγών μεταξύ πελάτη και τράπεζας",
            ),
            (
                "InterestRates",
                "Έγγραφα που περιέχουν πληροφορίες για επιτόκια καταθέσεων, δανείων και άλλων τραπεζικών προϊόντων",
            ),
            (
                "PaymentFees",
                "Πίνακες τελών και προμηθειών για πληρωμές, μεταφορές και υπηρεσίες σε συγκεκριμένους παραλήπτες",
            ),
            (
                "PriceList",
                "Γενικός τιμοκατάλογος τραπεζικών προϊόντων και υπηρεσιών με βασικές χρεώσεις και επιτόκια",
            ),
            (
                "PriceListExclusive",
                "Ειδικός τιμοκατάλογος για premium προϊόντα/υπηρεσίες (π.χ. private banking, gold accounts)",
            ),
        ]
        .into_iter()
        .map(|(id, description)| CategorySpec {
            id: id.to_string(),
            description: description.to_string(),
        })
        .collect();

        let mut entities = HashMap::new();
        entities.insert(
            "alpha".to_string(),
            EntityConfig {
                name: "Alpha Bank".to_string(),
                urls: Vec::new(),
            },
        );
        entities.insert(
            "piraeus".to_string(),
            EntityConfig {
                name: "Τράπεζα Πειραιώς".to_string(),
                urls: Vec::new(),
            },
        );

        Config {
            data_dir: default_data_dir(),
            index: IndexSettings::default(),
            llm: LlmSettings::default(),
            retrieval: RetrievalSettings::default(),
            domain: DomainConfig {
                name: "banking".to_string(),
                description: "Greek bank fee and pricing documents".to_string(),
                default_category: default_category(),
                categories,
                entities,
            },
        }
    }
}
