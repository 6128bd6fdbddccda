//! # The Agitator — Summarizer Collaborator (C6)
//!
//! The opaque "summarizer" collaborator the Enrichment Queue (`the_collective`)
//! dispatches to: given a vulnerability's raw fields, produce a plain-language
//! `simple_title`/`simple_description`.
//!
//! Two real providers (`OpenAIAgitator`, `ClaudeAgitator`) implement the
//! contract against their respective chat-completion APIs; [`fallback`]
//! supplies the rule-based shortener the queue falls back to when no
//! provider is reachable. All three share [`the_foundation::TheAgitator`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use the_agitator::{TheAgitator, OpenAIAgitator};
//! use the_foundation::ThePackage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agitator = OpenAIAgitator::the_awakening(
//!         std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4".to_string(),
//!     ).await?;
//!
//!     let package = ThePackage {
//!         data: serde_json::json!({
//!             "cve_id": "CVE-2023-12345",
//!             "description": "Critical SQL injection vulnerability"
//!         }),
//!         context: Some("Summarize this vulnerability for a non-expert.".to_string()),
//!     };
//!
//!     let reply = agitator.the_agitation(package).await?;
//!     println!("AI Response: {}", reply.content);
//!
//!     Ok(())
//! }
//! ```

pub use the_foundation::TheAgitator;

pub mod claude;
pub mod fallback;
pub mod openai;

pub use claude::ClaudeAgitator;
pub use fallback::{fallback_summarize, FallbackSummary};
pub use openai::OpenAIAgitator;

pub use the_foundation::{AgitatorType, CryptexResult, ThePackage, TheReply};
