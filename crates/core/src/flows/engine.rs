use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::inquiry::InquiryStatus;
use crate::flows::states::{InquiryEffect, InquiryEvent, NarrativePolicy, TransitionOutcome};

/// The negotiation lifecycle of an inquiry, expressed as an explicit transition table.
#[derive(Clone, Debug, Default)]
pub struct InquiryFlow;

impl InquiryFlow {
    /// Creation and submission are the same event, so there is no draft state.
    pub fn initial_state(&self) -> InquiryStatus {
        InquiryStatus::Submitted
    }

    pub fn apply(
        &self,
        current: InquiryStatus,
        event: InquiryEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_inquiry(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: InquiryStatus,
        event: InquiryEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.inquiry_id.clone(),
                        audit.correlation_id.clone(),
                        "inquiry.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", outcome.event.action()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.inquiry_id.clone(),
                        audit.correlation_id.clone(),
                        "inquiry.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Folds `events` over the table starting from the initial state.
    pub fn replay<'a, I>(&self, events: I) -> Result<InquiryStatus, FlowTransitionError>
    where
        I: IntoIterator<Item = &'a InquiryEvent>,
    {
        events
            .into_iter()
            .try_fold(self.initial_state(), |status, event| Ok(self.apply(status, *event)?.to))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("cannot {} an inquiry in status `{status}`", .event.action())]
    InvalidTransition { status: InquiryStatus, event: InquiryEvent },
}

fn transition_inquiry(
    current: InquiryStatus,
    event: InquiryEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use InquiryEffect::{
        AppendNarrative, AppendRejectionReason, CloseNegotiation, ReplaceBuyerDocument,
        ReplaceVendorDocument,
    };
    use InquiryEvent::{Accepted, BuyerDocumentUpdated, Rejected, Resubmitted, VendorResponded};
    use InquiryStatus::{Responded, Submitted};

    let (to, effects) = match (current, event) {
        (Submitted, VendorResponded) => {
            (Responded, vec![ReplaceVendorDocument, AppendNarrative(NarrativePolicy::Optional)])
        }
        (Responded, BuyerDocumentUpdated) => {
            (Responded, vec![ReplaceBuyerDocument, AppendNarrative(NarrativePolicy::Required)])
        }
        (Responded, Resubmitted) => (Submitted, Vec::new()),
        (Responded, Accepted) => (InquiryStatus::Accepted, vec![CloseNegotiation]),
        (Responded, Rejected) => {
            (InquiryStatus::Rejected, vec![AppendRejectionReason, CloseNegotiation])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition { status: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, effects })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::domain::inquiry::{InquiryId, InquiryStatus};
    use crate::flows::engine::{FlowTransitionError, InquiryFlow};
    use crate::flows::states::{InquiryEffect, InquiryEvent, NarrativePolicy};

    const ALL_STATUSES: [InquiryStatus; 4] = [
        InquiryStatus::Submitted,
        InquiryStatus::Responded,
        InquiryStatus::Accepted,
        InquiryStatus::Rejected,
    ];

    const ALL_EVENTS: [InquiryEvent; 5] = [
        InquiryEvent::VendorResponded,
        InquiryEvent::BuyerDocumentUpdated,
        InquiryEvent::Resubmitted,
        InquiryEvent::Accepted,
        InquiryEvent::Rejected,
    ];

    #[test]
    fn negotiation_round_trip_ends_accepted() {
        let flow = InquiryFlow;
        let events = [
            InquiryEvent::VendorResponded,
            InquiryEvent::BuyerDocumentUpdated,
            InquiryEvent::Resubmitted,
            InquiryEvent::VendorResponded,
            InquiryEvent::Accepted,
        ];

        assert_eq!(flow.replay(&events), Ok(InquiryStatus::Accepted));
    }

    #[test]
    fn buyer_edit_keeps_status_and_requires_narrative() {
        let outcome = InquiryFlow
            .apply(InquiryStatus::Responded, InquiryEvent::BuyerDocumentUpdated)
            .expect("responded -> responded");

        assert_eq!(outcome.to, InquiryStatus::Responded);
        assert!(outcome.has_effect(InquiryEffect::ReplaceBuyerDocument));
        assert_eq!(outcome.narrative_policy(), Some(NarrativePolicy::Required));
    }

    #[test]
    fn accept_after_resubmit_is_rejected() {
        let flow = InquiryFlow;
        let resubmitted = flow
            .apply(InquiryStatus::Responded, InquiryEvent::Resubmitted)
            .expect("responded -> submitted");
        assert_eq!(resubmitted.to, InquiryStatus::Submitted);

        let error = flow
            .apply(resubmitted.to, InquiryEvent::Accepted)
            .expect_err("cannot accept without a vendor response");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                status: InquiryStatus::Submitted,
                event: InquiryEvent::Accepted,
            }
        );
        assert_eq!(error.to_string(), "cannot accept an inquiry in status `submitted`");
    }

    #[test]
    fn terminal_states_refuse_every_event() {
        for status in [InquiryStatus::Accepted, InquiryStatus::Rejected] {
            for event in ALL_EVENTS {
                assert!(
                    InquiryFlow.apply(status, event).is_err(),
                    "{status:?} must refuse {event:?}"
                );
            }
        }
    }

    #[test]
    fn table_has_exactly_five_edges() {
        let legal = ALL_STATUSES
            .iter()
            .flat_map(|status| ALL_EVENTS.iter().map(move |event| (*status, *event)))
            .filter(|(status, event)| InquiryFlow.apply(*status, *event).is_ok())
            .count();

        assert_eq!(legal, 5);
    }

    #[test]
    fn replay_matches_step_by_step_fold() {
        let flow = InquiryFlow;
        let events = [
            InquiryEvent::VendorResponded,
            InquiryEvent::Resubmitted,
            InquiryEvent::VendorResponded,
            InquiryEvent::Rejected,
        ];

        let mut status = flow.initial_state();
        for event in &events {
            status = flow.apply(status, *event).expect("legal event").to;
        }

        assert_eq!(flow.replay(&events), Ok(status));
        assert_eq!(status, InquiryStatus::Rejected);
    }

    #[test]
    fn replay_stops_at_first_illegal_event() {
        let events = [InquiryEvent::VendorResponded, InquiryEvent::VendorResponded];
        let error = InquiryFlow.replay(&events).expect_err("double response");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition { status: InquiryStatus::Responded, .. }
        ));
    }

    #[test]
    fn audited_apply_records_both_outcomes() {
        let sink = InMemoryAuditSink::default();
        let audit =
            AuditContext::new(Some(InquiryId("inq-1".to_string())), "req-1", "buyer-agent");

        InquiryFlow
            .apply_with_audit(InquiryStatus::Submitted, InquiryEvent::VendorResponded, &sink, &audit)
            .expect("legal");
        InquiryFlow
            .apply_with_audit(InquiryStatus::Submitted, InquiryEvent::Accepted, &sink, &audit)
            .expect_err("illegal");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "inquiry.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("responded"));
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
    }
}
