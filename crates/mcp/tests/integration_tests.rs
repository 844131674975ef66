//! End-to-end tool, prompt and transport checks against a seeded in-memory catalog.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use puddle_core::audit::InMemoryAuditSink;
use puddle_core::discovery::EmbeddingProvider;
use puddle_core::domain::catalog::DatasetId;
use puddle_core::errors::ApplicationError;
use puddle_db::{
    connect_with_settings, migrations, DbPool, MarketplaceSeedDataset, SqlCatalogRepository,
};
use puddle_mcp::{
    http, ApiKeyEntry, AuthManager, CreateInquiryArgs, DatasetIdArgs, FilterArgs, InquiryIdArgs,
    InquiryManagerArgs, PuddleMcpServer, RejectArgs, SearchArgs, UpdateBuyerArgs, VendorIdArgs,
    VendorResponseArgs, ALL_TOOL_NAMES,
};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ServerHandler;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

const FRAUD_SIGNALS: &str = "5d7e9b20-0000-4000-8000-000000000001";
const SPEND_INDEX: &str = "5d7e9b20-0000-4000-8000-000000000002";
const PORT_CALLS: &str = "5d7e9b20-0000-4000-8000-000000000003";
const FREIGHT_PRIVATE: &str = "5d7e9b20-0000-4000-8000-000000000004";
const NORTHWIND: &str = "8f1c2a10-0000-4000-8000-000000000001";

struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApplicationError> {
        Ok(self.0.clone())
    }
}

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    MarketplaceSeedDataset::load(&pool).await.expect("seed");

    let catalog = SqlCatalogRepository::new(pool.clone());
    for (id, vector) in
        [(FRAUD_SIGNALS, [1.0, 0.0]), (SPEND_INDEX, [0.0, 1.0]), (PORT_CALLS, [0.6, 0.8])]
    {
        catalog
            .store_dataset_embedding(&DatasetId(id.to_string()), &vector)
            .await
            .expect("store embedding");
    }
    pool
}

async fn test_server() -> (PuddleMcpServer, InMemoryAuditSink) {
    let audit = InMemoryAuditSink::default();
    let server = PuddleMcpServer::new(
        seeded_pool().await,
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        Arc::new(audit.clone()),
    );
    (server, audit)
}

fn text_of(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|content| content.raw.as_text().map(|text| text.text.clone()))
        .collect::<Vec<_>>()
        .join("")
}

fn json_of(result: &CallToolResult) -> Value {
    serde_json::from_str(&text_of(result)).expect("tool result should be JSON")
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error.unwrap_or(false)
}

fn buyer_document() -> Value {
    json!({
        "summary": "Card fraud labels for model training",
        "questions": [{ "id": "q1", "text": "How often is the data refreshed?" }],
        "constraints": { "budget_usd": 5000 },
        "intent": "purchase"
    })
}

async fn create_inquiry(server: &PuddleMcpServer) -> String {
    let created = server
        .create_buyer_inquiry(Parameters(CreateInquiryArgs {
            dataset_id: FRAUD_SIGNALS.to_string(),
            buyer_id: "buyer-7".to_string(),
            buyer_json: Value::String(buyer_document().to_string()),
            narrative: "The buyer requested fintech data.".to_string(),
        }))
        .await
        .expect("create call");
    assert!(!is_error(&created), "{}", text_of(&created));
    let body = json_of(&created);
    assert_eq!(body["status"], "submitted");
    body["inquiry_id"].as_str().expect("inquiry id").to_string()
}

async fn respond(server: &PuddleMcpServer, inquiry_id: &str) -> CallToolResult {
    server
        .record_vendor_response(Parameters(VendorResponseArgs {
            inquiry_id: inquiry_id.to_string(),
            vendor_json: json!({
                "internal_thought_process": "Standard licence applies.",
                "answers": [{ "q_ref": "q1", "text": "Daily at 06:00 UTC", "confidence": 0.9 }],
                "required_human_input": ["pricing_approval"]
            }),
            narrative: Some("The vendor confirmed a daily refresh.".to_string()),
        }))
        .await
        .expect("vendor response call")
}

async fn state(server: &PuddleMcpServer, inquiry_id: &str) -> Value {
    let result = server
        .get_inquiry_full_state(Parameters(InquiryIdArgs { inquiry_id: inquiry_id.to_string() }))
        .await
        .expect("state call");
    assert!(!is_error(&result));
    json_of(&result)
}

#[tokio::test]
async fn server_lists_every_tool_and_advertises_prompts() {
    let (server, _) = test_server().await;

    let mut listed = server.tool_names();
    listed.sort();
    let mut expected: Vec<String> = ALL_TOOL_NAMES.iter().map(|name| name.to_string()).collect();
    expected.sort();
    assert_eq!(listed, expected);

    let info = server.get_info();
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.prompts.is_some());
    assert_eq!(info.server_info.name, "puddle-mcp");
}

#[tokio::test]
async fn vendor_tools_search_and_report_missing_records_as_text() {
    let (server, _) = test_server().await;

    let found = server
        .search_vendors(Parameters(SearchArgs { query: "FINANCE".to_string(), limit: None }))
        .await
        .expect("search");
    let text = text_of(&found);
    assert!(text.starts_with("Found 1 vendors matching 'FINANCE':"));
    assert!(text.contains("VENDOR: Northwind Analytics"));

    let profile = server
        .get_vendor_details(Parameters(VendorIdArgs { vendor_id: NORTHWIND.to_string() }))
        .await
        .expect("details");
    assert!(text_of(&profile).contains("Location: Austin, Texas, USA"));

    let missing = server
        .get_vendor_details(Parameters(VendorIdArgs { vendor_id: "nope".to_string() }))
        .await
        .expect("details");
    assert!(!is_error(&missing));
    assert_eq!(text_of(&missing), "Vendor not found.");
}

#[tokio::test]
async fn semantic_search_ranks_visible_datasets_by_similarity() {
    let (server, _) = test_server().await;

    let result = server
        .search_datasets_semantic(Parameters(SearchArgs {
            query: "card fraud".to_string(),
            limit: Some(500),
        }))
        .await
        .expect("semantic search");
    let text = text_of(&result);

    assert!(text.starts_with("Found 3 datasets relevant to: 'card fraud':"));
    let fraud = text.find("Card Transaction Fraud Signals").expect("fraud dataset");
    let ports = text.find("Global Port Call Events").expect("port dataset");
    let spend = text.find("Merchant Category Spend Index").expect("spend dataset");
    assert!(fraud < ports && ports < spend, "{text}");
    assert!(text.contains("(Match Score: 1.00)"));
    assert!(!text.contains("Freight Lane Rate Benchmarks"));
    assert!(!text.contains("Provider Directory 2019"));
}

#[tokio::test]
async fn filter_tool_ands_predicates_over_visible_datasets() {
    let (server, _) = test_server().await;

    let unfiltered = server
        .filter_datasets(Parameters(FilterArgs { domain: None, price_model: None, limit: None }))
        .await
        .expect("filter");
    assert!(text_of(&unfiltered).starts_with("Filtered Search Results (3 found):"));

    let finance_subscriptions = server
        .filter_datasets(Parameters(FilterArgs {
            domain: Some("fin".to_string()),
            price_model: Some("SUBSCRIPTION".to_string()),
            limit: Some(10),
        }))
        .await
        .expect("filter");
    let text = text_of(&finance_subscriptions);
    assert!(text.starts_with("Filtered Search Results (1 found):"));
    assert!(text.contains("Card Transaction Fraud Signals"));

    let none = server
        .filter_datasets(Parameters(FilterArgs {
            domain: Some("Astronomy".to_string()),
            price_model: None,
            limit: None,
        }))
        .await
        .expect("filter");
    assert_eq!(text_of(&none), "No datasets found matching the applied filters.");
}

#[tokio::test]
async fn zero_and_negative_limits_return_no_rows() {
    let (server, _) = test_server().await;

    for limit in [0, -4] {
        let filtered = server
            .filter_datasets(Parameters(FilterArgs {
                domain: None,
                price_model: None,
                limit: Some(limit),
            }))
            .await
            .expect("filter");
        assert_eq!(text_of(&filtered), "No datasets found matching the applied filters.");
    }

    let vendors = server
        .search_vendors(Parameters(SearchArgs { query: "FINANCE".to_string(), limit: Some(0) }))
        .await
        .expect("search");
    assert_eq!(text_of(&vendors), "No vendors found matching your criteria.");
}

#[tokio::test]
async fn dataset_report_hides_private_datasets() {
    let (server, _) = test_server().await;

    let report = server
        .get_dataset_details_complete(Parameters(DatasetIdArgs {
            dataset_id: FRAUD_SIGNALS.to_string(),
        }))
        .await
        .expect("report");
    let text = text_of(&report);
    assert!(text.starts_with("=== DATASET REPORT: Card Transaction Fraud Signals ==="));
    assert!(text.contains("Contact: data@northwind.example"));
    assert!(text.contains("=== SCHEMA (3 Columns) ==="));
    let first = text.find("- txn_date (date)").expect("first column");
    let last = text.find("- fraud_rate_bps (decimal)").expect("last column");
    assert!(first < last);

    let private = server
        .get_dataset_details_complete(Parameters(DatasetIdArgs {
            dataset_id: FREIGHT_PRIVATE.to_string(),
        }))
        .await
        .expect("report");
    assert_eq!(text_of(&private), "Dataset not found or is private.");
}

#[tokio::test]
async fn inquiry_negotiation_round_trip_keeps_summary_append_only() {
    let (server, audit) = test_server().await;
    let inquiry_id = create_inquiry(&server).await;

    let initial = state(&server, &inquiry_id).await;
    assert_eq!(initial["status"], "submitted");
    assert_eq!(initial["cumulative_summary"], "The buyer requested fintech data.");
    assert!(initial["vendor_json"].is_null());

    let responded = respond(&server, &inquiry_id).await;
    assert_eq!(json_of(&responded)["status"], "responded");

    let mut edited = buyer_document();
    edited["constraints"]["region"] = json!("EU");
    let updated = server
        .update_buyer_json(Parameters(UpdateBuyerArgs {
            inquiry_id: inquiry_id.clone(),
            buyer_json: edited,
            cumulative_summary: "The buyer limited the request to EU data.".to_string(),
        }))
        .await
        .expect("update");
    assert!(!is_error(&updated), "{}", text_of(&updated));
    assert_eq!(json_of(&updated)["status"], "responded");

    let resubmitted = server
        .resubmit_inquiry_to_vendor(Parameters(InquiryIdArgs { inquiry_id: inquiry_id.clone() }))
        .await
        .expect("resubmit");
    assert_eq!(json_of(&resubmitted)["status"], "submitted");

    respond(&server, &inquiry_id).await;
    let rejected = server
        .reject_vendor_response(Parameters(RejectArgs {
            inquiry_id: inquiry_id.clone(),
            reason: "too expensive".to_string(),
        }))
        .await
        .expect("reject");
    assert_eq!(json_of(&rejected)["status"], "rejected");

    let closed = state(&server, &inquiry_id).await;
    let summary = closed["cumulative_summary"].as_str().expect("summary");
    assert!(summary.starts_with("The buyer requested fintech data.\n"));
    assert!(summary.contains("The buyer limited the request to EU data."));
    assert!(summary.ends_with("too expensive."));
    assert_eq!(closed["buyer_json"]["constraints"]["region"], "EU");
    assert_eq!(closed["vendor_json"]["answers"][0]["q_ref"], "q1");
    assert_eq!(closed["state_version"], 6);
    assert!(!audit.events().is_empty());
}

#[tokio::test]
async fn illegal_inquiry_actions_return_structured_tool_errors() {
    let (server, _) = test_server().await;
    let inquiry_id = create_inquiry(&server).await;

    let premature = server
        .accept_vendor_response(Parameters(InquiryIdArgs { inquiry_id: inquiry_id.clone() }))
        .await
        .expect("accept call");
    assert!(is_error(&premature));
    let body = json_of(&premature);
    assert_eq!(body["error_kind"], "InvalidTransition");
    assert_eq!(body["retryable"], false);
    assert_eq!(state(&server, &inquiry_id).await["status"], "submitted");

    let unknown = server
        .get_inquiry_full_state(Parameters(InquiryIdArgs { inquiry_id: "missing".to_string() }))
        .await
        .expect("state call");
    assert!(is_error(&unknown));
    assert_eq!(json_of(&unknown)["error_kind"], "NotFound");

    let invalid = server
        .create_buyer_inquiry(Parameters(CreateInquiryArgs {
            dataset_id: FRAUD_SIGNALS.to_string(),
            buyer_id: "buyer-7".to_string(),
            buyer_json: json!({ "summary": "no intent" }),
            narrative: "The buyer asked.".to_string(),
        }))
        .await
        .expect("create call");
    assert_eq!(json_of(&invalid)["error_kind"], "ValidationError");

    let private = server
        .create_buyer_inquiry(Parameters(CreateInquiryArgs {
            dataset_id: FREIGHT_PRIVATE.to_string(),
            buyer_id: "buyer-7".to_string(),
            buyer_json: buyer_document(),
            narrative: "The buyer asked.".to_string(),
        }))
        .await
        .expect("create call");
    assert_eq!(json_of(&private)["error_kind"], "NotFound");
}

#[tokio::test]
async fn inquiry_prompt_renders_protocol_for_active_inquiry() {
    let (server, _) = test_server().await;

    let messages = server
        .inquiry_manager(Parameters(InquiryManagerArgs {
            inquiry_id: Some("inq-42".to_string()),
            buyer_request: "Ask whether EU data is available".to_string(),
        }))
        .await
        .expect("prompt");

    assert_eq!(messages.len(), 1);
    let message = serde_json::to_value(&messages[0]).expect("serialize prompt");
    assert_eq!(message["role"], "user");
    let text = message["content"]["text"].as_str().expect("text content");
    assert!(text.contains("get_inquiry_full_state"));
    assert!(text.contains("**ACTIVE INQUIRY:** inq-42"));
}

fn authenticated_router(server: PuddleMcpServer, pool: DbPool) -> axum::Router {
    let auth = AuthManager::with_keys(
        vec![ApiKeyEntry::new("agent", SecretString::from("s3cret-token".to_string()), 100)],
        Duration::from_secs(60),
    );
    http::router(server, auth, pool, "/puddle-mcp")
}

#[tokio::test]
async fn http_transport_requires_bearer_token_except_for_health() {
    let pool = seeded_pool().await;
    let server = PuddleMcpServer::new(
        pool.clone(),
        Arc::new(FixedEmbedder(Vec::new())),
        Arc::new(InMemoryAuditSink::default()),
    );
    let app = authenticated_router(server, pool);

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("health response");
    assert_eq!(health.status(), StatusCode::OK);

    let anonymous = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/puddle-mcp")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("anonymous response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/puddle-mcp")
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("wrong token response");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let authorized = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/puddle-mcp")
                .header(header::AUTHORIZATION, "Bearer s3cret-token")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json, text/event-stream")
                .body(Body::from(
                    json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "method": "initialize",
                        "params": {
                            "protocolVersion": "2024-11-05",
                            "capabilities": {},
                            "clientInfo": { "name": "integration-test", "version": "0.0.0" }
                        }
                    })
                    .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("authorized response");
    assert_ne!(authorized.status(), StatusCode::UNAUTHORIZED);
}
