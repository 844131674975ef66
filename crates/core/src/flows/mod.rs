pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, InquiryFlow};
pub use states::{InquiryEffect, InquiryEvent, NarrativePolicy, TransitionOutcome};
