use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub industry_focus: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub contact_email: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub organization_type: Option<String>,
    pub founded_year: Option<i32>,
}

impl Vendor {
    /// "City, Region, Country" with missing parts skipped.
    pub fn location(&self) -> String {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub title: String,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub pricing_model: Option<String>,
    pub license: Option<String>,
    pub granularity: Option<String>,
    pub temporal_coverage: Option<String>,
    pub geographic_coverage: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetColumn {
    pub name: String,
    pub data_type: String,
    pub description: Option<String>,
    pub sample_values: Option<String>,
}

/// A dataset ranked against a query vector; `score` is `1 - cosine distance`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredDataset {
    pub dataset: Dataset,
    pub score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFilter {
    pub domain: Option<String>,
    pub price_model: Option<String>,
}

impl DatasetFilter {
    pub fn is_unconstrained(&self) -> bool {
        self.domain.is_none() && self.price_model.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub vendor_contact: Option<String>,
    pub columns: Vec<DatasetColumn>,
}
