pub mod audit;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod inquiry_manager;
pub mod narrative;
pub mod store;

pub use audit::{AuditContext, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use discovery::{CatalogSearch, CatalogStore, EmbeddingProvider};
pub use domain::catalog::{
    Dataset, DatasetColumn, DatasetFilter, DatasetId, DatasetReport, ScoredDataset, Vendor,
    VendorId,
};
pub use domain::inquiry::{
    BuyerDocument, BuyerId, Inquiry, InquiryId, InquiryStatus, Intent, VendorDocument,
};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use flows::{InquiryEvent, InquiryFlow};
pub use inquiry_manager::{InquiryManager, NewInquiry};
pub use narrative::{append_narrative, narrative_delta, rejection_fragment};
pub use store::{InMemoryInquiryStore, InquiryStore};
