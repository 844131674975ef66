use serde::{Deserialize, Serialize};

use crate::domain::inquiry::InquiryStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryEvent {
    VendorResponded,
    BuyerDocumentUpdated,
    Resubmitted,
    Accepted,
    Rejected,
}

impl InquiryEvent {
    /// Operation name reported back to callers when the event is refused.
    pub fn action(&self) -> &'static str {
        match self {
            Self::VendorResponded => "record_vendor_response",
            Self::BuyerDocumentUpdated => "update_buyer_document",
            Self::Resubmitted => "resubmit",
            Self::Accepted => "accept",
            Self::Rejected => "reject",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativePolicy {
    Required,
    Optional,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InquiryEffect {
    ReplaceBuyerDocument,
    ReplaceVendorDocument,
    AppendNarrative(NarrativePolicy),
    AppendRejectionReason,
    CloseNegotiation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: InquiryStatus,
    pub to: InquiryStatus,
    pub event: InquiryEvent,
    pub effects: Vec<InquiryEffect>,
}

impl TransitionOutcome {
    pub fn has_effect(&self, effect: InquiryEffect) -> bool {
        self.effects.contains(&effect)
    }

    pub fn narrative_policy(&self) -> Option<NarrativePolicy> {
        self.effects.iter().find_map(|effect| match effect {
            InquiryEffect::AppendNarrative(policy) => Some(*policy),
            _ => None,
        })
    }
}
