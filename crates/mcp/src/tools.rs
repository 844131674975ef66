//! Tool and prompt names grouped by the side of the marketplace they serve.

pub struct CatalogTools;

pub struct InquiryTools;

pub trait ToolCategory {
    fn category_name() -> &'static str
    where
        Self: Sized;
    fn tool_names() -> &'static [&'static str]
    where
        Self: Sized;
}

impl ToolCategory for CatalogTools {
    fn category_name() -> &'static str {
        "catalog"
    }
    fn tool_names() -> &'static [&'static str] {
        &[
            "search_vendors",
            "get_vendor_details",
            "search_datasets_semantic",
            "filter_datasets",
            "get_dataset_details_complete",
        ]
    }
}

impl ToolCategory for InquiryTools {
    fn category_name() -> &'static str {
        "inquiry"
    }
    fn tool_names() -> &'static [&'static str] {
        &[
            "create_buyer_inquiry",
            "get_inquiry_full_state",
            "update_buyer_json",
            "resubmit_inquiry_to_vendor",
            "accept_vendor_response",
            "reject_vendor_response",
            "record_vendor_response",
        ]
    }
}

pub const ALL_TOOL_NAMES: &[&str] = &[
    "search_vendors",
    "get_vendor_details",
    "search_datasets_semantic",
    "filter_datasets",
    "get_dataset_details_complete",
    "create_buyer_inquiry",
    "get_inquiry_full_state",
    "update_buyer_json",
    "resubmit_inquiry_to_vendor",
    "accept_vendor_response",
    "reject_vendor_response",
    "record_vendor_response",
];

pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();

pub const ALL_PROMPT_NAMES: &[&str] =
    &["buyer_discovery_assistant", "dataset_evaluation_report", "inquiry_manager"];
