//! Read-side catalog retrieval: vendor lookup, semantic dataset ranking and attribute filters.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::catalog::{
    Dataset, DatasetFilter, DatasetId, DatasetReport, ScoredDataset, Vendor, VendorId,
};
use crate::errors::ApplicationError;

pub const MAX_RESULT_LIMIT: u32 = 50;
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
pub const DEFAULT_FILTER_LIMIT: u32 = 10;

/// Clamps a caller-supplied result limit into `0..=MAX_RESULT_LIMIT`; negatives count as zero.
pub fn clamp_limit(requested: Option<i64>, default: u32) -> u32 {
    match requested {
        None => default,
        Some(value) => value.clamp(0, i64::from(MAX_RESULT_LIMIT)) as u32,
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn search_vendors(&self, query: &str, limit: u32)
        -> Result<Vec<Vendor>, ApplicationError>;

    async fn find_vendor(&self, id: &VendorId) -> Result<Option<Vendor>, ApplicationError>;

    /// Public, active datasets in store order, each with its stored embedding if any.
    async fn visible_datasets_with_embeddings(
        &self,
    ) -> Result<Vec<(Dataset, Option<Vec<f32>>)>, ApplicationError>;

    async fn filter_datasets(
        &self,
        filter: &DatasetFilter,
        limit: u32,
    ) -> Result<Vec<Dataset>, ApplicationError>;

    async fn dataset_report(&self, id: &DatasetId)
        -> Result<Option<DatasetReport>, ApplicationError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError>;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for std::sync::Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        (**self).embed(text).await
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f64> {
    if left.is_empty() || left.len() != right.len() {
        return None;
    }

    let (mut dot, mut left_norm, mut right_norm) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (a, b) in left.iter().zip(right) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return Some(0.0);
    }
    Some(dot / (left_norm.sqrt() * right_norm.sqrt()))
}

/// Orders candidates by cosine similarity to `query`, highest first.
///
/// An empty query vector scores every candidate 0 and keeps store order. Candidates without a
/// comparable embedding score 0 and rank after every candidate that has one.
pub fn rank_by_similarity(
    candidates: Vec<(Dataset, Option<Vec<f32>>)>,
    query: &[f32],
    limit: u32,
) -> Vec<ScoredDataset> {
    let limit = limit as usize;
    if query.is_empty() {
        return candidates
            .into_iter()
            .take(limit)
            .map(|(dataset, _)| ScoredDataset { dataset, score: 0.0 })
            .collect();
    }

    let mut scored = candidates
        .into_iter()
        .map(|(dataset, embedding)| {
            let similarity =
                embedding.as_deref().and_then(|embedding| cosine_similarity(query, embedding));
            (dataset, similarity)
        })
        .collect::<Vec<_>>();

    scored.sort_by(|(_, left), (_, right)| match (left, right) {
        (Some(left), Some(right)) => right.total_cmp(left),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(dataset, similarity)| ScoredDataset { dataset, score: similarity.unwrap_or(0.0) })
        .collect()
}

pub struct CatalogSearch<C, E> {
    store: C,
    embedder: E,
}

impl<C: CatalogStore, E: EmbeddingProvider> CatalogSearch<C, E> {
    pub fn new(store: C, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub async fn search_vendors(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Vendor>, ApplicationError> {
        self.store.search_vendors(query, limit).await
    }

    pub async fn vendor_details(&self, id: &VendorId) -> Result<Vendor, ApplicationError> {
        self.store
            .find_vendor(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("vendor", id.0.clone()))
    }

    /// Embedding failures degrade to an empty query vector instead of failing the search.
    pub async fn search_datasets_semantic(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ScoredDataset>, ApplicationError> {
        let query_vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(
                    event_name = "catalog.embedding.degraded",
                    error = %error,
                    "embedding unavailable; ranking with an empty query vector"
                );
                Vec::new()
            }
        };

        let candidates = self.store.visible_datasets_with_embeddings().await?;
        let ranked = rank_by_similarity(candidates, &query_vector, limit);
        info!(
            event_name = "catalog.semantic_search.completed",
            results = ranked.len(),
            degraded = query_vector.is_empty(),
            "semantic dataset search completed"
        );
        Ok(ranked)
    }

    pub async fn filter_datasets(
        &self,
        filter: &DatasetFilter,
        limit: u32,
    ) -> Result<Vec<Dataset>, ApplicationError> {
        self.store.filter_datasets(filter, limit).await
    }

    pub async fn dataset_details(&self, id: &DatasetId) -> Result<DatasetReport, ApplicationError> {
        self.store
            .dataset_report(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("dataset", id.0.clone()))
    }
}
