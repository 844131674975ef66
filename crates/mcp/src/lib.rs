//! Puddle MCP (Model Context Protocol) server.
//!
//! Exposes marketplace discovery (vendor search, semantic and attribute dataset search, dataset
//! reports) and the buyer/vendor inquiry negotiation as MCP tools, plus the prompt templates that
//! steer the calling model.
//!
//! - `PuddleMcpServer`: tool and prompt handlers over the catalog and the inquiry manager
//! - `http`: streamable HTTP transport behind bearer authentication, plus `/health`
//! - `embedding`: query embedding providers

pub mod auth;
pub mod embedding;
pub mod http;
pub mod prompts;
pub mod report;
mod server;
mod tools;

pub use auth::{ApiKeyEntry, AuthManager, AuthResult};
pub use server::{
    BuyerDiscoveryArgs, CreateInquiryArgs, DatasetEvaluationArgs, DatasetIdArgs, FilterArgs,
    InquiryIdArgs, InquiryManagerArgs, PuddleMcpServer, RejectArgs, SearchArgs, UpdateBuyerArgs,
    VendorIdArgs, VendorResponseArgs,
};
pub use tools::*;

use puddle_core::errors::{ApplicationError, ErrorKind, InterfaceError};
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde::Serialize;

/// Body of an `is_error` tool result. The calling model reads `error_kind` and `retryable` to
/// decide whether to reload state, fix its input or try again later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFailure {
    pub error_kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub correlation_id: String,
}

impl ToolFailure {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self::from(error.into_interface(correlation_id))
    }

    pub fn into_call_result(self) -> Result<CallToolResult, ErrorData> {
        let body = serde_json::to_string(&self).map_err(internal_error)?;
        Ok(CallToolResult::error(vec![Content::text(body)]))
    }
}

impl From<InterfaceError> for ToolFailure {
    fn from(value: InterfaceError) -> Self {
        Self {
            error_kind: value.kind(),
            message: value.message().to_string(),
            retryable: value.is_retryable(),
            correlation_id: value.correlation_id().to_string(),
        }
    }
}

pub(crate) fn internal_error(error: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(error.to_string(), None)
}
