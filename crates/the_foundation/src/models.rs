//! Core data models shared across CRYPTEX crates.
//!
//! All models follow the anarchist Cryptex naming convention where the type
//! is part of the AI-collaboration boundary (`TheInquiry`, `ThePackage`,
//! `TheReply`); the domain models below (`Vulnerability`, `Article`, ...) are
//! named plainly since they have no "traditional name" to gloss.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::SystemTime;
use uuid::Uuid;

/// The Inquiry - Request for AI processing
///
/// Traditional name: `Request` or `AIRequest`
///
/// Represents a request to the AI collective for analysis, assessment,
/// or other cognitive tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TheInquiry {
    /// Unique identifier for this inquiry
    pub id: String,

    /// Type of task to perform
    pub task: TaskType,

    /// Data package for processing
    pub package: ThePackage,

    /// Preferred AI provider (agitator)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_agitator: Option<AgitatorType>,

    /// When this inquiry was created (Unix timestamp)
    pub created_at_ts: u64,
}

impl TheInquiry {
    /// Create a new inquiry
    pub fn new(task: TaskType, data: serde_json::Value) -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        Self {
            id: Uuid::new_v4().to_string(),
            task,
            package: ThePackage {
                data,
                context: None,
            },
            preferred_agitator: None,
            created_at_ts: now,
        }
    }

    /// Create inquiry with specific agitator preference
    pub fn with_agitator(mut self, agitator: AgitatorType) -> Self {
        self.preferred_agitator = Some(agitator);
        self
    }

    /// Add context to the inquiry
    pub fn with_context(mut self, context: String) -> Self {
        self.package.context = Some(context);
        self
    }

    /// Generate a fingerprint for caching
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.task.hash(&mut hasher);
        self.package.data.to_string().hash(&mut hasher);
        format!("inquiry-{:x}", hasher.finish())
    }
}

/// The Reply - Response from AI processing
///
/// Traditional name: `Response` or `AIResponse`
///
/// Contains the result of an AI inquiry along with metadata about
/// the processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TheReply {
    /// ID of the inquiry this replies to
    pub inquiry_id: String,

    /// The actual content/result
    pub content: String,

    /// Confidence/certainty score (0.0 to 1.0)
    pub certainty: TheCertainty,

    /// Which agitator processed this
    pub agitator_used: AgitatorType,

    /// The specific model/mind used
    pub the_mind: String,

    /// Processing duration in milliseconds
    pub duration_ms: u64,

    /// Number of tokens used (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    /// When this reply was generated (Unix timestamp)
    pub replied_at_ts: u64,
}

/// The Package - Data payload for inquiries
///
/// Traditional name: `Payload` or `RequestData`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThePackage {
    /// The actual data being sent
    pub data: serde_json::Value,

    /// Optional context/instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// The Certainty - Confidence score
///
/// Traditional name: `Confidence` or `ConfidenceScore`
///
/// A value between 0.0 and 1.0 representing how certain the AI
/// is about its analysis.
pub type TheCertainty = f64;

/// Task Type - What kind of AI processing to perform
///
/// Traditional name: `TaskType` or `RequestType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Plain-language title/description generation for a vulnerability entry
    Summarization,

    /// Custom task type
    Custom,
}

/// Agitator Type - Which AI provider to use
///
/// Traditional name: `AIProvider` or `ModelProvider`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgitatorType {
    /// OpenAI (GPT models)
    OpenAI,

    /// Anthropic Claude
    Claude,

    /// Rule-based fallback, used when no provider is reachable
    Fallback,

    /// Automatic selection based on availability/health
    Auto,
}

impl std::fmt::Display for AgitatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgitatorType::OpenAI => write!(f, "OpenAI"),
            AgitatorType::Claude => write!(f, "Claude"),
            AgitatorType::Fallback => write!(f, "Fallback"),
            AgitatorType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Summarization => write!(f, "Summarization"),
            TaskType::Custom => write!(f, "Custom"),
        }
    }
}

/// Severity - coarse CVSS-derived bucket for a vulnerability.
///
/// Ordered low to high so that `Severity::Low < Severity::Critical` reads
/// naturally; derived from a CVSS base score when a source doesn't supply
/// one directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Derive a severity bucket from a CVSS base score in `[0.0, 10.0]`.
    pub fn from_cvss_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score > 0.0 {
            Severity::Low
        } else {
            Severity::Unknown
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Unknown => write!(f, "UNKNOWN"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::CryptexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Severity::Unknown),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(crate::CryptexError::validation(format!(
                "unrecognized severity: {other}"
            ))),
        }
    }
}

/// Classification of a vulnerability reference URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Advisory,
    Patch,
    Vendor,
    Exploit,
    Blog,
    Nvd,
    Other,
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceType::Advisory => "advisory",
            ReferenceType::Patch => "patch",
            ReferenceType::Vendor => "vendor",
            ReferenceType::Exploit => "exploit",
            ReferenceType::Blog => "blog",
            ReferenceType::Nvd => "nvd",
            ReferenceType::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A single reference URL attached to a vulnerability, deduplicated by URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub ref_type: ReferenceType,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Provenance tag identifying which upstream source contributed data.
///
/// Kept as a plain string newtype rather than a closed enum: new feeds
/// (additional CERT advisories, etc.) should not require a workspace-wide
/// enum change, only a new `SourceTag` value and an entry in
/// [`crate::SOURCE_PRIORITY`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceTag(pub String);

impl SourceTag {
    pub fn nvd() -> Self {
        SourceTag("nvd".to_string())
    }
    pub fn cisa_kev() -> Self {
        SourceTag("cisa_kev".to_string())
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceTag {
    fn from(s: &str) -> Self {
        SourceTag(s.to_string())
    }
}

/// A side-band payload contributed by a single source, kept alongside the
/// merged canonical fields rather than overwriting them (e.g. a localized
/// description); see the Merger's `source_tags` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTagPayload {
    pub source: SourceTag,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Canonical `Vulnerability` record, one per CVE identifier.
///
/// Mutated only by the Merger and the Enrichment Queue; never deleted by the
/// pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve_id: String,
    pub title: Option<String>,
    pub description: Option<String>,

    pub cvss_score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub severity: Severity,

    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,

    pub exploited_in_the_wild: bool,
    pub cisa_due_date: Option<NaiveDate>,

    pub cwe_ids: BTreeSet<String>,
    pub vendors: BTreeSet<String>,
    pub products: BTreeSet<String>,
    pub affected_products: BTreeSet<String>,
    pub references: Vec<Reference>,

    pub sources: BTreeSet<SourceTag>,
    pub source_tags: Vec<SourceTagPayload>,

    pub priority_score: f64,

    pub simple_title: Option<String>,
    pub simple_description: Option<String>,
    pub llm_processed: bool,
    pub llm_processed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vulnerability {
    /// Construct the first-seen row for a CVE, as the Merger does on insert.
    pub fn new_from_source(cve_id: String, source: SourceTag, now: DateTime<Utc>) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);

        Self {
            cve_id,
            title: None,
            description: None,
            cvss_score: None,
            cvss_vector: None,
            severity: Severity::Unknown,
            published_at: None,
            modified_at: None,
            exploited_in_the_wild: false,
            cisa_due_date: None,
            cwe_ids: BTreeSet::new(),
            vendors: BTreeSet::new(),
            products: BTreeSet::new(),
            affected_products: BTreeSet::new(),
            references: Vec::new(),
            sources,
            source_tags: Vec::new(),
            priority_score: 0.0,
            simple_title: None,
            simple_description: None,
            llm_processed: false,
            llm_processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a single [`IngestionRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionRunStatus {
    Running,
    Success,
    Failed,
}

/// Audit record for one scheduled job invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: Uuid,
    pub source: SourceTag,
    pub status: IngestionRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_fetched: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub records_failed: u64,
    pub error_message: Option<String>,
    pub run_config: serde_json::Value,
}

impl IngestionRun {
    pub fn start(source: SourceTag, run_config: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            status: IngestionRunStatus::Running,
            started_at: now,
            completed_at: None,
            records_fetched: 0,
            records_inserted: 0,
            records_updated: 0,
            records_failed: 0,
            error_message: None,
            run_config,
        }
    }

    pub fn finish(&mut self, status: IngestionRunStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = Some(now);
    }
}

/// A news article, keyed by URL; carries the same idempotence discipline as
/// [`Vulnerability`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub related_cves: BTreeSet<String>,
    pub llm_summary: Option<String>,
    pub llm_key_points: Option<Vec<String>>,
    pub llm_relevance: Option<f64>,
    pub llm_processed: bool,
}

/// A syndication feed the news pipeline tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSource {
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub active: bool,
    pub fetch_interval_seconds: u64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_fetch_status: Option<String>,
    pub last_fetch_error: Option<String>,
    pub total_articles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inquiry_creation() {
        let inquiry = TheInquiry::new(
            TaskType::Summarization,
            serde_json::json!({"cve": "CVE-2023-12345"}),
        );

        assert!(!inquiry.id.is_empty());
        assert_eq!(inquiry.task, TaskType::Summarization);
        assert!(inquiry.preferred_agitator.is_none());
    }

    #[test]
    fn test_inquiry_with_agitator() {
        let inquiry = TheInquiry::new(TaskType::Summarization, serde_json::json!({}))
            .with_agitator(AgitatorType::Claude);

        assert_eq!(inquiry.preferred_agitator, Some(AgitatorType::Claude));
    }

    #[test]
    fn test_inquiry_fingerprint() {
        let inquiry1 = TheInquiry::new(
            TaskType::Summarization,
            serde_json::json!({"test": "data"}),
        );

        let inquiry2 = TheInquiry::new(
            TaskType::Summarization,
            serde_json::json!({"test": "data"}),
        );

        // Same task and data should produce same fingerprint
        assert_eq!(inquiry1.fingerprint(), inquiry2.fingerprint());
    }

    #[test]
    fn test_serialization() {
        let inquiry = TheInquiry::new(
            TaskType::Custom,
            serde_json::json!({"targets": ["192.168.1.1"]}),
        );

        let json = serde_json::to_string(&inquiry).unwrap();
        let deserialized: TheInquiry = serde_json::from_str(&json).unwrap();

        assert_eq!(inquiry.id, deserialized.id);
        assert_eq!(inquiry.task, deserialized.task);
    }

    #[test]
    fn test_severity_from_cvss_score() {
        assert_eq!(Severity::from_cvss_score(9.8), Severity::Critical);
        assert_eq!(Severity::from_cvss_score(7.5), Severity::High);
        assert_eq!(Severity::from_cvss_score(4.0), Severity::Medium);
        assert_eq!(Severity::from_cvss_score(1.0), Severity::Low);
        assert_eq!(Severity::from_cvss_score(0.0), Severity::Unknown);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::High);
        assert!(Severity::Critical > Severity::Medium);
    }

    #[test]
    fn test_vulnerability_new_from_source_invariants() {
        let now = Utc::now();
        let v = Vulnerability::new_from_source("CVE-2024-0001".to_string(), SourceTag::nvd(), now);

        assert_eq!(v.created_at, v.updated_at);
        assert!(v.sources.contains(&SourceTag::nvd()));
        assert!(!v.exploited_in_the_wild);
        assert_eq!(v.severity, Severity::Unknown);
    }
}
