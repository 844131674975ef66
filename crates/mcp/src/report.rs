//! Plain-text renderings of catalog records returned by the read tools.

use puddle_core::domain::catalog::{Dataset, DatasetReport, ScoredDataset, Vendor};

pub const NO_VENDORS: &str = "No vendors found matching your criteria.";
pub const VENDOR_NOT_FOUND: &str = "Vendor not found.";
pub const NO_RELEVANT_DATASETS: &str = "No relevant datasets found.";
pub const NO_FILTERED_DATASETS: &str = "No datasets found matching the applied filters.";
pub const DATASET_NOT_FOUND: &str = "Dataset not found or is private.";

const ENTRY_SEPARATOR: &str = "---";

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().filter(|value| !value.trim().is_empty()).unwrap_or("N/A")
}

fn vendor_entry(vendor: &Vendor) -> String {
    let founded = vendor.founded_year.map(|year| year.to_string());
    format!(
        "VENDOR: {name}\n - ID: {id}\n - Type: {kind} (Founded: {founded})\n - Industry: {industry}\n - Location: {location}\n - Description: {description}",
        name = vendor.name,
        id = vendor.id.0,
        kind = or_na(&vendor.organization_type),
        founded = or_na(&founded),
        industry = or_na(&vendor.industry_focus),
        location = vendor.location(),
        description = vendor.description.as_deref().unwrap_or("No description available."),
    )
}

fn dataset_entry(dataset: &Dataset, score: Option<f64>) -> String {
    let score = score.map(|score| format!(" (Match Score: {score:.2})")).unwrap_or_default();
    format!(
        "DATASET: {title}{score}\n - ID: {id}\n - Vendor: {vendor}\n - Domain: {domain} | Pricing: {pricing}\n - Description: {description}",
        title = dataset.title,
        id = dataset.id.0,
        vendor = dataset.vendor_name,
        domain = or_na(&dataset.domain),
        pricing = or_na(&dataset.pricing_model),
        description = dataset.description.as_deref().unwrap_or("No description."),
    )
}

fn with_entries(header: String, entries: impl Iterator<Item = String>) -> String {
    let mut lines = vec![header];
    for entry in entries {
        lines.push(entry);
        lines.push(ENTRY_SEPARATOR.to_string());
    }
    lines.join("\n")
}

pub fn vendor_list(query: &str, vendors: &[Vendor]) -> String {
    if vendors.is_empty() {
        return NO_VENDORS.to_string();
    }
    with_entries(
        format!("Found {} vendors matching '{query}':\n", vendors.len()),
        vendors.iter().map(vendor_entry),
    )
}

pub fn vendor_profile(vendor: &Vendor) -> String {
    let founded = vendor.founded_year.map(|year| year.to_string());
    format!(
        "=== VENDOR PROFILE ===\nName: {name}\nWebsite: {website}\nLocation: {location}\nIndustry: {industry}\nOrg Type: {kind} (Est. {founded})\n\nABOUT:\n{about}",
        name = vendor.name,
        website = or_na(&vendor.website_url),
        location = vendor.location(),
        industry = or_na(&vendor.industry_focus),
        kind = or_na(&vendor.organization_type),
        founded = or_na(&founded),
        about = vendor.description.as_deref().unwrap_or("No description available."),
    )
}

/// Scores of exactly zero (degraded search, missing embeddings) are left off the entry.
pub fn ranked_datasets(query: &str, results: &[ScoredDataset]) -> String {
    if results.is_empty() {
        return NO_RELEVANT_DATASETS.to_string();
    }
    with_entries(
        format!("Found {} datasets relevant to: '{query}':\n", results.len()),
        results.iter().map(|scored| {
            let score = (scored.score != 0.0).then_some(scored.score);
            dataset_entry(&scored.dataset, score)
        }),
    )
}

pub fn filtered_datasets(datasets: &[Dataset]) -> String {
    if datasets.is_empty() {
        return NO_FILTERED_DATASETS.to_string();
    }
    with_entries(
        format!("Filtered Search Results ({} found):\n", datasets.len()),
        datasets.iter().map(|dataset| dataset_entry(dataset, None)),
    )
}

pub fn dataset_report(report: &DatasetReport) -> String {
    let dataset = &report.dataset;
    let mut lines = vec![
        format!("=== DATASET REPORT: {} ===", dataset.title),
        format!(
            "Vendor: {} (Contact: {})",
            dataset.vendor_name,
            or_na(&report.vendor_contact)
        ),
        format!("Domain: {} | License: {}", or_na(&dataset.domain), or_na(&dataset.license)),
        format!(
            "Pricing: {} | Granularity: {}",
            or_na(&dataset.pricing_model),
            or_na(&dataset.granularity)
        ),
        format!("\nDESCRIPTION:\n{}", dataset.description.as_deref().unwrap_or("No description.")),
        format!(
            "\nCOVERAGE:\n- Geography: {}\n- Time Range: {}",
            dataset.geographic_coverage.as_deref().unwrap_or("Global"),
            or_na(&dataset.temporal_coverage)
        ),
        format!("\n=== SCHEMA ({} Columns) ===", report.columns.len()),
    ];

    if report.columns.is_empty() {
        lines.push("No column metadata available.".to_string());
    }
    for column in &report.columns {
        let samples = column
            .sample_values
            .as_deref()
            .map(|samples| format!(" (Samples: {samples})"))
            .unwrap_or_default();
        lines.push(format!(
            "- {} ({}): {}{samples}",
            column.name,
            column.data_type,
            column.description.as_deref().unwrap_or("No desc")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use puddle_core::domain::catalog::{
        Dataset, DatasetColumn, DatasetId, DatasetReport, ScoredDataset, VendorId,
    };

    use super::*;

    fn dataset() -> Dataset {
        Dataset {
            id: DatasetId("d-1".to_string()),
            vendor_id: VendorId("v-1".to_string()),
            vendor_name: "Northwind Analytics".to_string(),
            title: "Card Transaction Fraud Signals".to_string(),
            description: Some("Daily fraud aggregates.".to_string()),
            domain: Some("Finance".to_string()),
            pricing_model: Some("subscription".to_string()),
            license: None,
            granularity: Some("Daily".to_string()),
            temporal_coverage: None,
            geographic_coverage: None,
        }
    }

    #[test]
    fn empty_results_use_fixed_messages() {
        assert_eq!(vendor_list("x", &[]), NO_VENDORS);
        assert_eq!(ranked_datasets("x", &[]), NO_RELEVANT_DATASETS);
        assert_eq!(filtered_datasets(&[]), NO_FILTERED_DATASETS);
    }

    #[test]
    fn ranked_entries_show_nonzero_scores_only() {
        let text = ranked_datasets(
            "fraud",
            &[
                ScoredDataset { dataset: dataset(), score: 0.8765 },
                ScoredDataset { dataset: dataset(), score: 0.0 },
            ],
        );

        assert!(text.starts_with("Found 2 datasets relevant to: 'fraud':"));
        assert_eq!(text.matches("(Match Score: 0.88)").count(), 1);
        assert_eq!(text.matches("---").count(), 2);
    }

    #[test]
    fn report_lists_columns_and_defaults() {
        let report = DatasetReport {
            dataset: dataset(),
            vendor_contact: Some("data@northwind.example".to_string()),
            columns: vec![DatasetColumn {
                name: "fraud_rate_bps".to_string(),
                data_type: "decimal".to_string(),
                description: None,
                sample_values: Some("12.5".to_string()),
            }],
        };

        let text = dataset_report(&report);
        assert!(text.contains("Vendor: Northwind Analytics (Contact: data@northwind.example)"));
        assert!(text.contains("License: N/A"));
        assert!(text.contains("- Geography: Global"));
        assert!(text.contains("=== SCHEMA (1 Columns) ==="));
        assert!(text.contains("- fraud_rate_bps (decimal): No desc (Samples: 12.5)"));
    }
}
