//! Inquiry negotiation service.
//!
//! Every mutation loads the current record, asks [`InquiryFlow`] whether the event is legal,
//! applies the transition effects to a copy and persists it with a single conditional write.
//! A stale writer observes `ConcurrentModification` and nothing it computed is stored.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::catalog::DatasetId;
use crate::domain::inquiry::{BuyerDocument, BuyerId, Inquiry, InquiryId, VendorDocument};
use crate::errors::ApplicationError;
use crate::flows::{InquiryEffect, InquiryEvent, InquiryFlow, NarrativePolicy, TransitionOutcome};
use crate::narrative::{append_narrative, narrative_delta, rejection_fragment, require_fragment};
use crate::store::InquiryStore;

#[derive(Clone, Debug, PartialEq)]
pub struct NewInquiry {
    pub dataset_id: DatasetId,
    pub buyer_id: BuyerId,
    pub buyer_json: Value,
    pub narrative: String,
}

/// Inputs an event may consume while its effects are applied.
#[derive(Debug, Default)]
struct EffectInputs {
    buyer: Option<BuyerDocument>,
    vendor: Option<VendorDocument>,
    narrative: Option<String>,
    rejection_reason: Option<String>,
}

pub struct InquiryManager<S> {
    store: S,
    flow: InquiryFlow,
    audit: Arc<dyn AuditSink>,
}

impl<S: InquiryStore> InquiryManager<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, flow: InquiryFlow, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create(
        &self,
        request: NewInquiry,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        let buyer = BuyerDocument::from_value(request.buyer_json)?;
        let narrative = require_fragment("narrative", &request.narrative)?;
        if request.buyer_id.0.trim().is_empty() {
            return Err(ApplicationError::validation("buyer_id must not be blank"));
        }

        let vendor_id = self
            .store
            .visible_dataset_vendor(&request.dataset_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("dataset", request.dataset_id.0.clone()))?;

        let now = Utc::now();
        let inquiry = Inquiry {
            id: InquiryId(Uuid::new_v4().to_string()),
            status: self.flow.initial_state(),
            buyer,
            vendor: None,
            cumulative_summary: append_narrative("", narrative),
            dataset_id: request.dataset_id,
            vendor_id,
            buyer_id: request.buyer_id,
            state_version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&inquiry).await?;

        let audit = audit.for_inquiry(&inquiry.id);
        self.audit.emit(
            AuditEvent::new(
                audit.inquiry_id.clone(),
                audit.correlation_id.clone(),
                "inquiry.created",
                AuditCategory::Persistence,
                audit.actor.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("dataset_id", inquiry.dataset_id.0.clone())
            .with_metadata("status", inquiry.status.as_str()),
        );
        info!(
            event_name = "inquiry.created",
            correlation_id = %audit.correlation_id,
            inquiry_id = %inquiry.id.0,
            dataset_id = %inquiry.dataset_id.0,
            "inquiry submitted"
        );
        Ok(inquiry)
    }

    pub async fn record_vendor_response(
        &self,
        id: &InquiryId,
        vendor_json: Value,
        narrative: Option<String>,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        let vendor = VendorDocument::from_value(vendor_json)?;
        let inputs = EffectInputs { vendor: Some(vendor), narrative, ..EffectInputs::default() };
        self.apply_event(id, InquiryEvent::VendorResponded, inputs, audit).await
    }

    /// Replaces the buyer document wholesale and appends the mandatory narrative fragment.
    pub async fn update_buyer_document(
        &self,
        id: &InquiryId,
        buyer_json: Value,
        narrative: String,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        let buyer = BuyerDocument::from_value(buyer_json)?;
        let inputs =
            EffectInputs { buyer: Some(buyer), narrative: Some(narrative), ..EffectInputs::default() };
        self.apply_event(id, InquiryEvent::BuyerDocumentUpdated, inputs, audit).await
    }

    pub async fn resubmit(
        &self,
        id: &InquiryId,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        self.apply_event(id, InquiryEvent::Resubmitted, EffectInputs::default(), audit).await
    }

    pub async fn accept(
        &self,
        id: &InquiryId,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        self.apply_event(id, InquiryEvent::Accepted, EffectInputs::default(), audit).await
    }

    pub async fn reject(
        &self,
        id: &InquiryId,
        reason: String,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        let inputs = EffectInputs { rejection_reason: Some(reason), ..EffectInputs::default() };
        self.apply_event(id, InquiryEvent::Rejected, inputs, audit).await
    }

    pub async fn get_full_state(&self, id: &InquiryId) -> Result<Inquiry, ApplicationError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("inquiry", id.0.clone()))
    }

    async fn apply_event(
        &self,
        id: &InquiryId,
        event: InquiryEvent,
        inputs: EffectInputs,
        audit: &AuditContext,
    ) -> Result<Inquiry, ApplicationError> {
        let audit = audit.for_inquiry(id);
        let current = self.get_full_state(id).await?;

        let outcome = match self.flow.apply_with_audit(
            current.status,
            event,
            self.audit.as_ref(),
            &audit,
        ) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "inquiry.transition_rejected",
                    correlation_id = %audit.correlation_id,
                    inquiry_id = %id.0,
                    status = %current.status,
                    action = event.action(),
                    "illegal inquiry transition"
                );
                return Err(error.into());
            }
        };

        let mut next = current.clone();
        apply_effects(&mut next, &outcome, inputs)?;
        next.status = outcome.to;
        next.state_version = current.state_version + 1;
        next.updated_at = Utc::now();

        let swapped =
            self.store.compare_and_swap(current.status, current.state_version, &next).await?;
        if !swapped {
            self.audit.emit(
                AuditEvent::new(
                    audit.inquiry_id.clone(),
                    audit.correlation_id.clone(),
                    "inquiry.concurrent_modification",
                    AuditCategory::Persistence,
                    audit.actor.clone(),
                    AuditOutcome::Rejected,
                )
                .with_metadata("expected_version", current.state_version.to_string())
                .with_metadata("event", event.action()),
            );
            warn!(
                event_name = "inquiry.concurrent_modification",
                correlation_id = %audit.correlation_id,
                inquiry_id = %id.0,
                expected_version = current.state_version,
                "conditional write lost the race"
            );
            return Err(ApplicationError::ConcurrentModification { inquiry_id: id.0.clone() });
        }

        info!(
            event_name = "inquiry.updated",
            correlation_id = %audit.correlation_id,
            inquiry_id = %id.0,
            from = %outcome.from,
            to = %outcome.to,
            state_version = next.state_version,
            "inquiry transition committed"
        );
        Ok(next)
    }
}

fn apply_effects(
    next: &mut Inquiry,
    outcome: &TransitionOutcome,
    mut inputs: EffectInputs,
) -> Result<(), ApplicationError> {
    for effect in &outcome.effects {
        match effect {
            InquiryEffect::ReplaceBuyerDocument => {
                next.buyer = inputs
                    .buyer
                    .take()
                    .ok_or_else(|| ApplicationError::validation("buyer_json is required"))?;
            }
            InquiryEffect::ReplaceVendorDocument => {
                let vendor = inputs
                    .vendor
                    .take()
                    .ok_or_else(|| ApplicationError::validation("vendor_json is required"))?;
                vendor.validate_against(&next.buyer)?;
                next.vendor = Some(vendor);
            }
            InquiryEffect::AppendNarrative(policy) => match (inputs.narrative.take(), policy) {
                (Some(text), NarrativePolicy::Optional) if text.trim().is_empty() => {}
                (Some(text), _) => {
                    let delta = narrative_delta(&next.cumulative_summary, &text)?;
                    next.cumulative_summary = append_narrative(&next.cumulative_summary, delta);
                }
                (None, NarrativePolicy::Required) => {
                    return Err(ApplicationError::validation("narrative is required"));
                }
                (None, NarrativePolicy::Optional) => {}
            },
            InquiryEffect::AppendRejectionReason => {
                let reason = inputs.rejection_reason.take().unwrap_or_default();
                let reason = require_fragment("reason", &reason)?;
                next.cumulative_summary =
                    append_narrative(&next.cumulative_summary, &rejection_fragment(reason));
            }
            InquiryEffect::CloseNegotiation => {}
        }
    }
    Ok(())
}
