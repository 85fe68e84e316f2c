use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One insured person attached to a cancellation case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsuredPerson {
    pub name: String,
    /// ISO date, `YYYY-MM-DD`. Empty string when unknown.
    #[serde(default)]
    pub birth_date: String,
    /// Only the primary insured person is required to carry one;
    /// dependents are often covered under the primary policy.
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub adult: bool,
}

/// Immutable input of one generation call: everything the letter
/// templates need to know about a cancellation case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseDocumentRequest {
    pub case_id: Uuid,
    pub insured: Vec<InsuredPerson>,
    /// Recipient insurer name.
    pub insurer: String,
    /// Termination date of the basic coverage (LAMal), ISO `YYYY-MM-DD`.
    #[serde(default)]
    pub lamal_end: String,
    /// Termination date of the supplementary coverage (LCA), ISO `YYYY-MM-DD`.
    #[serde(default)]
    pub lca_end: String,
    /// Postal address of the client, newline separated.
    pub client_address: String,
    /// Free-text letter variant selector, e.g. "lamal_lca", "lamal", "lca".
    #[serde(default)]
    pub variant: String,
}

/// Which coverages the letter terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterVariant {
    LamalAndLca,
    LamalOnly,
    LcaOnly,
}

impl LetterVariant {
    /// Interpret the free-text selector stored on the request.
    /// Unknown selectors fall back to terminating both coverages.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_lowercase().as_str() {
            "lamal" | "lamal_only" => Self::LamalOnly,
            "lca" | "lca_only" => Self::LcaOnly,
            _ => Self::LamalAndLca,
        }
    }

    pub fn includes_lamal(&self) -> bool {
        matches!(self, Self::LamalAndLca | Self::LamalOnly)
    }

    pub fn includes_lca(&self) -> bool {
        matches!(self, Self::LamalAndLca | Self::LcaOnly)
    }
}

/// An electronic signature captured on the client's device, transported
/// as a base64 data URI.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureAsset {
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
    /// Declared mime type, used when the data URI itself carries none.
    #[serde(default)]
    pub mime_hint: String,
    /// When the client signed, if recorded.
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
}
