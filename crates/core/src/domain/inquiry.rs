use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::catalog::{DatasetId, VendorId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InquiryId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuyerId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Submitted,
    Responded,
    Accepted,
    Rejected,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Responded => "responded",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "responded" => Some(Self::Responded),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Purchase,
    Exploratory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default = "default_question_status")]
    pub status: String,
}

fn default_question_status() -> String {
    "open".to_string()
}

/// Structured state contributed by the buyer side of an inquiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuyerDocument {
    /// One-line gist of the request; not the cumulative narrative.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Value>,
    pub intent: Intent,
}

impl BuyerDocument {
    /// Parses and validates an untyped buyer document as received from a tool call.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        let Some(object) = value.as_object() else {
            return Err(DomainError::Validation("buyer_json must be a JSON object".to_string()));
        };

        match object.get("intent") {
            None | Some(Value::Null) => {
                return Err(DomainError::Validation(
                    "buyer_json.intent is required (expected purchase|exploratory)".to_string(),
                ));
            }
            Some(Value::String(intent)) if !matches!(intent.as_str(), "purchase" | "exploratory") => {
                return Err(DomainError::Validation(format!(
                    "buyer_json.intent `{intent}` is not supported (expected purchase|exploratory)"
                )));
            }
            _ => {}
        }

        let document: Self = serde_json::from_value(value)
            .map_err(|error| DomainError::Validation(format!("invalid buyer_json: {error}")))?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for question in &self.questions {
            if question.id.trim().is_empty() {
                return Err(DomainError::Validation(
                    "buyer_json.questions[].id must not be empty".to_string(),
                ));
            }
            if !seen.insert(question.id.as_str()) {
                return Err(DomainError::Validation(format!(
                    "buyer_json.questions contains duplicate id `{}`",
                    question.id
                )));
            }
        }
        Ok(())
    }

    pub fn has_question(&self, id: &str) -> bool {
        self.questions.iter().any(|question| question.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub q_ref: Option<String>,
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// The vendor's single response slot on an inquiry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorDocument {
    #[serde(default)]
    pub internal_thought_process: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub required_human_input: BTreeSet<String>,
}

impl VendorDocument {
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        if !value.is_object() {
            return Err(DomainError::Validation("vendor_json must be a JSON object".to_string()));
        }
        let document: Self = serde_json::from_value(value)
            .map_err(|error| DomainError::Validation(format!("invalid vendor_json: {error}")))?;

        for answer in &document.answers {
            if let Some(confidence) = answer.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(DomainError::Validation(format!(
                        "vendor_json.answers[].confidence must be in 0.0..=1.0, got {confidence}"
                    )));
                }
            }
        }
        Ok(document)
    }

    /// Every non-null `q_ref` must name a question of `buyer`.
    pub fn validate_against(&self, buyer: &BuyerDocument) -> Result<(), DomainError> {
        for q_ref in self.answers.iter().filter_map(|answer| answer.q_ref.as_deref()) {
            if !buyer.has_question(q_ref) {
                return Err(DomainError::Validation(format!(
                    "vendor_json.answers[].q_ref `{q_ref}` does not match any buyer question"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: InquiryId,
    pub status: InquiryStatus,
    pub buyer: BuyerDocument,
    pub vendor: Option<VendorDocument>,
    pub cumulative_summary: String,
    pub dataset_id: DatasetId,
    pub vendor_id: VendorId,
    pub buyer_id: BuyerId,
    pub state_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
