//! MCP tool and prompt handlers.

use std::sync::Arc;

use puddle_core::audit::{AuditContext, AuditSink};
use puddle_core::discovery::{
    clamp_limit, CatalogSearch, DEFAULT_FILTER_LIMIT, DEFAULT_SEARCH_LIMIT,
};
use puddle_core::domain::catalog::{DatasetFilter, DatasetId, VendorId};
use puddle_core::domain::inquiry::{BuyerId, Inquiry, InquiryId};
use puddle_core::errors::{ApplicationError, ErrorKind};
use puddle_core::inquiry_manager::{InquiryManager, NewInquiry};
use puddle_db::{DbPool, SqlCatalogRepository, SqlInquiryRepository};
use rmcp::handler::server::router::prompt::PromptRouter;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, GetPromptRequestParam, GetPromptResult, Implementation,
    ListPromptsResult, PaginatedRequestParam, PromptMessage, PromptMessageRole, ProtocolVersion,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{
    prompt, prompt_handler, prompt_router, schemars, tool, tool_handler, tool_router, ErrorData,
    RoleServer, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::SharedEmbedder;
use crate::{internal_error, prompts, report, ToolFailure};

type Catalog = CatalogSearch<SqlCatalogRepository, SharedEmbedder>;
type Inquiries = InquiryManager<SqlInquiryRepository>;

const BUYER_ACTOR: &str = "buyer_agent";
const VENDOR_ACTOR: &str = "vendor_agent";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchArgs {
    #[schemars(description = "Free-text query, e.g. \"Healthcare\" or \"card fraud labels\"")]
    pub query: String,
    #[schemars(description = "Maximum results (1-50, default 5)")]
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct VendorIdArgs {
    #[schemars(description = "Vendor identifier taken from search_vendors output")]
    pub vendor_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FilterArgs {
    #[schemars(description = "Case-insensitive domain substring, e.g. \"Finance\"")]
    #[serde(default)]
    pub domain: Option<String>,
    #[schemars(description = "Case-insensitive pricing model substring, e.g. \"subscription\"")]
    #[serde(default)]
    pub price_model: Option<String>,
    #[schemars(description = "Maximum results (1-50, default 10)")]
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DatasetIdArgs {
    #[schemars(description = "Dataset identifier taken from search output")]
    pub dataset_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateInquiryArgs {
    pub dataset_id: String,
    pub buyer_id: String,
    #[schemars(
        description = "Buyer document: {summary, questions:[{id,text}], constraints, intent}"
    )]
    pub buyer_json: Value,
    #[schemars(description = "One past-tense sentence describing the request")]
    pub narrative: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InquiryIdArgs {
    pub inquiry_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateBuyerArgs {
    pub inquiry_id: String,
    #[schemars(description = "Complete replacement buyer document")]
    pub buyer_json: Value,
    #[schemars(description = "The new past-tense sentence to append to the summary")]
    pub cumulative_summary: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RejectArgs {
    pub inquiry_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct VendorResponseArgs {
    pub inquiry_id: String,
    #[schemars(
        description = "Vendor document: {internal_thought_process, answers:[{q_ref,text,confidence}], required_human_input}"
    )]
    pub vendor_json: Value,
    #[serde(default)]
    pub narrative: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuyerDiscoveryArgs {
    pub user_query: String,
    #[serde(default)]
    pub current_context: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DatasetEvaluationArgs {
    pub dataset_title: String,
    #[serde(default)]
    pub user_use_case: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InquiryManagerArgs {
    #[serde(default)]
    pub inquiry_id: Option<String>,
    pub buyer_request: String,
}

#[derive(Clone)]
pub struct PuddleMcpServer {
    catalog: Arc<Catalog>,
    inquiries: Arc<Inquiries>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl PuddleMcpServer {
    pub fn new(db_pool: DbPool, embedder: SharedEmbedder, audit: Arc<dyn AuditSink>) -> Self {
        info!(event_name = "mcp.server.init", "initializing puddle MCP server");
        Self {
            catalog: Arc::new(CatalogSearch::new(
                SqlCatalogRepository::new(db_pool.clone()),
                embedder,
            )),
            inquiries: Arc::new(InquiryManager::new(SqlInquiryRepository::new(db_pool), audit)),
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect()
    }

    /// Serves a single client over stdin/stdout until it disconnects.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.transport.stdio", "serving MCP over stdio");
        let service = self.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;
        info!(event_name = "mcp.transport.closed", "MCP stdio session closed");
        Ok(())
    }

    /// Read-side failures: a missing record is an ordinary answer, anything else is a tool error.
    fn read_failure(
        error: ApplicationError,
        not_found_text: &str,
        correlation_id: &str,
    ) -> Result<CallToolResult, ErrorData> {
        if error.kind() == ErrorKind::NotFound {
            return Ok(text_result(not_found_text.to_string()));
        }
        ToolFailure::from_application(error, correlation_id).into_call_result()
    }

    fn inquiry_outcome(
        result: Result<Value, ApplicationError>,
        correlation_id: &str,
    ) -> Result<CallToolResult, ErrorData> {
        match result {
            Ok(body) => {
                let text = serde_json::to_string(&body).map_err(internal_error)?;
                Ok(text_result(text))
            }
            Err(error) => {
                debug!(
                    event_name = "mcp.tool.failed",
                    correlation_id,
                    error_kind = %error.kind(),
                    "inquiry tool failed"
                );
                ToolFailure::from_application(error, correlation_id).into_call_result()
            }
        }
    }
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

fn correlation_id() -> String {
    format!("mcp-{}", Uuid::new_v4())
}

/// Models sometimes send a document as a JSON-encoded string instead of an object.
fn document_arg(field: &str, value: Value) -> Result<Value, ApplicationError> {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).map_err(|error| {
            ApplicationError::validation(format!("{field} is not valid JSON: {error}"))
        }),
        other => Ok(other),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn ack(inquiry: &Inquiry) -> Value {
    json!({
        "inquiry_id": inquiry.id.0,
        "status": inquiry.status.as_str(),
        "state_version": inquiry.state_version,
    })
}

fn full_state(inquiry: &Inquiry) -> Result<Value, ApplicationError> {
    let encode = |error: serde_json::Error| ApplicationError::Persistence(error.to_string());
    Ok(json!({
        "inquiry_id": inquiry.id.0,
        "status": inquiry.status.as_str(),
        "buyer_json": serde_json::to_value(&inquiry.buyer).map_err(encode)?,
        "vendor_json": serde_json::to_value(&inquiry.vendor).map_err(encode)?,
        "cumulative_summary": inquiry.cumulative_summary,
        "state_version": inquiry.state_version,
        "updated_at": inquiry.updated_at.to_rfc3339(),
    }))
}

#[tool_router]
impl PuddleMcpServer {
    #[tool(
        name = "search_vendors",
        description = "Search data vendors (companies) by name or industry focus."
    )]
    pub async fn search_vendors(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        debug!(event_name = "mcp.tool.called", tool = "search_vendors", %correlation_id);
        let limit = clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT);
        match self.catalog.search_vendors(&args.query, limit).await {
            Ok(vendors) => Ok(text_result(report::vendor_list(&args.query, &vendors))),
            Err(error) => Self::read_failure(error, report::NO_VENDORS, &correlation_id),
        }
    }

    #[tool(
        name = "get_vendor_details",
        description = "Get the full profile of one vendor, including website and location."
    )]
    pub async fn get_vendor_details(
        &self,
        Parameters(args): Parameters<VendorIdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        debug!(event_name = "mcp.tool.called", tool = "get_vendor_details", %correlation_id);
        match self.catalog.vendor_details(&VendorId(args.vendor_id)).await {
            Ok(vendor) => Ok(text_result(report::vendor_profile(&vendor))),
            Err(error) => Self::read_failure(error, report::VENDOR_NOT_FOUND, &correlation_id),
        }
    }

    #[tool(
        name = "search_datasets_semantic",
        description = "Find datasets by meaning using vector similarity. Primary discovery tool."
    )]
    pub async fn search_datasets_semantic(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        debug!(event_name = "mcp.tool.called", tool = "search_datasets_semantic", %correlation_id);
        let limit = clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT);
        match self.catalog.search_datasets_semantic(&args.query, limit).await {
            Ok(ranked) => Ok(text_result(report::ranked_datasets(&args.query, &ranked))),
            Err(error) => Self::read_failure(error, report::NO_RELEVANT_DATASETS, &correlation_id),
        }
    }

    #[tool(
        name = "filter_datasets",
        description = "Filter datasets by domain and/or pricing model. Use for hard constraints."
    )]
    pub async fn filter_datasets(
        &self,
        Parameters(args): Parameters<FilterArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        debug!(event_name = "mcp.tool.called", tool = "filter_datasets", %correlation_id);
        let filter = DatasetFilter {
            domain: non_blank(args.domain),
            price_model: non_blank(args.price_model),
        };
        let limit = clamp_limit(args.limit, DEFAULT_FILTER_LIMIT);
        match self.catalog.filter_datasets(&filter, limit).await {
            Ok(datasets) => Ok(text_result(report::filtered_datasets(&datasets))),
            Err(error) => Self::read_failure(error, report::NO_FILTERED_DATASETS, &correlation_id),
        }
    }

    #[tool(
        name = "get_dataset_details_complete",
        description = "Get a complete dataset report: metadata, vendor contact and column schema."
    )]
    pub async fn get_dataset_details_complete(
        &self,
        Parameters(args): Parameters<DatasetIdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        debug!(
            event_name = "mcp.tool.called",
            tool = "get_dataset_details_complete",
            %correlation_id
        );
        match self.catalog.dataset_details(&DatasetId(args.dataset_id)).await {
            Ok(details) => Ok(text_result(report::dataset_report(&details))),
            Err(error) => Self::read_failure(error, report::DATASET_NOT_FOUND, &correlation_id),
        }
    }

    #[tool(
        name = "create_buyer_inquiry",
        description = "Open an inquiry with the vendor of a dataset. The inquiry starts submitted."
    )]
    pub async fn create_buyer_inquiry(
        &self,
        Parameters(args): Parameters<CreateInquiryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let audit = AuditContext::new(None, correlation_id.clone(), BUYER_ACTOR);
        let result: Result<Value, ApplicationError> = async {
            let request = NewInquiry {
                dataset_id: DatasetId(args.dataset_id),
                buyer_id: BuyerId(args.buyer_id),
                buyer_json: document_arg("buyer_json", args.buyer_json)?,
                narrative: args.narrative,
            };
            let inquiry = self.inquiries.create(request, &audit).await?;
            Ok(json!({ "inquiry_id": inquiry.id.0, "status": inquiry.status.as_str() }))
        }
        .await;
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "get_inquiry_full_state",
        description = "Read an inquiry: status, buyer and vendor documents and the cumulative summary."
    )]
    pub async fn get_inquiry_full_state(
        &self,
        Parameters(args): Parameters<InquiryIdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let result =
            self.inquiries.get_full_state(&id).await.and_then(|inquiry| full_state(&inquiry));
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "update_buyer_json",
        description = "Replace the buyer document of a responded inquiry and append one new summary sentence."
    )]
    pub async fn update_buyer_json(
        &self,
        Parameters(args): Parameters<UpdateBuyerArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let audit = AuditContext::new(Some(id.clone()), correlation_id.clone(), BUYER_ACTOR);
        let result: Result<Value, ApplicationError> = async {
            let buyer_json = document_arg("buyer_json", args.buyer_json)?;
            let inquiry = self
                .inquiries
                .update_buyer_document(&id, buyer_json, args.cumulative_summary, &audit)
                .await?;
            Ok(ack(&inquiry))
        }
        .await;
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "resubmit_inquiry_to_vendor",
        description = "Send an edited, responded inquiry back to the vendor."
    )]
    pub async fn resubmit_inquiry_to_vendor(
        &self,
        Parameters(args): Parameters<InquiryIdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let audit = AuditContext::new(Some(id.clone()), correlation_id.clone(), BUYER_ACTOR);
        let result = self.inquiries.resubmit(&id, &audit).await.map(|inquiry| ack(&inquiry));
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "accept_vendor_response",
        description = "Accept the vendor's response. Closes the inquiry."
    )]
    pub async fn accept_vendor_response(
        &self,
        Parameters(args): Parameters<InquiryIdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let audit = AuditContext::new(Some(id.clone()), correlation_id.clone(), BUYER_ACTOR);
        let result = self.inquiries.accept(&id, &audit).await.map(|inquiry| ack(&inquiry));
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "reject_vendor_response",
        description = "Reject the vendor's response with a short reason. Closes the inquiry."
    )]
    pub async fn reject_vendor_response(
        &self,
        Parameters(args): Parameters<RejectArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let audit = AuditContext::new(Some(id.clone()), correlation_id.clone(), BUYER_ACTOR);
        let result =
            self.inquiries.reject(&id, args.reason, &audit).await.map(|inquiry| ack(&inquiry));
        Self::inquiry_outcome(result, &correlation_id)
    }

    #[tool(
        name = "record_vendor_response",
        description = "Vendor side: answer a submitted inquiry. Moves it to responded."
    )]
    pub async fn record_vendor_response(
        &self,
        Parameters(args): Parameters<VendorResponseArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let correlation_id = correlation_id();
        let id = InquiryId(args.inquiry_id);
        let audit = AuditContext::new(Some(id.clone()), correlation_id.clone(), VENDOR_ACTOR);
        let result: Result<Value, ApplicationError> = async {
            let vendor_json = document_arg("vendor_json", args.vendor_json)?;
            let inquiry = self
                .inquiries
                .record_vendor_response(&id, vendor_json, non_blank(args.narrative), &audit)
                .await?;
            Ok(ack(&inquiry))
        }
        .await;
        Self::inquiry_outcome(result, &correlation_id)
    }
}

fn user_prompt(rendered: Result<String, tera::Error>) -> Result<Vec<PromptMessage>, ErrorData> {
    let text = rendered.map_err(internal_error)?;
    Ok(vec![PromptMessage::new_text(PromptMessageRole::User, text)])
}

#[prompt_router]
impl PuddleMcpServer {
    /// Persona and discovery steps for a buyer's free-text question.
    #[prompt(name = "buyer_discovery_assistant")]
    pub async fn buyer_discovery_assistant(
        &self,
        Parameters(args): Parameters<BuyerDiscoveryArgs>,
    ) -> Result<Vec<PromptMessage>, ErrorData> {
        user_prompt(prompts::buyer_discovery(&args.user_query, args.current_context.as_deref()))
    }

    /// Suitability report for one dataset against the buyer's use case.
    #[prompt(name = "dataset_evaluation_report")]
    pub async fn dataset_evaluation_report(
        &self,
        Parameters(args): Parameters<DatasetEvaluationArgs>,
    ) -> Result<Vec<PromptMessage>, ErrorData> {
        user_prompt(prompts::dataset_evaluation(&args.dataset_title, args.user_use_case.as_deref()))
    }

    /// Negotiation protocol for driving an inquiry through its statuses.
    #[prompt(name = "inquiry_manager")]
    pub async fn inquiry_manager(
        &self,
        Parameters(args): Parameters<InquiryManagerArgs>,
    ) -> Result<Vec<PromptMessage>, ErrorData> {
        user_prompt(prompts::inquiry_manager(args.inquiry_id.as_deref(), &args.buyer_request))
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for PuddleMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().enable_prompts().build(),
            server_info: Implementation {
                name: "puddle-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Puddle data marketplace. Discover vendors and datasets, then negotiate access \
                 through inquiries. Read inquiry state before changing it."
                    .to_string(),
            ),
        }
    }
}
