use async_trait::async_trait;
use sqlx::Row;

use puddle_core::discovery::CatalogStore;
use puddle_core::domain::catalog::{
    Dataset, DatasetColumn, DatasetFilter, DatasetId, DatasetReport, Vendor, VendorId,
};
use puddle_core::errors::ApplicationError;

use super::{decode_err, RepositoryError};
use crate::DbPool;

const VENDOR_COLUMNS: &str = "id, name, industry_focus, description, website_url, contact_email,
        country, region, city, organization_type, founded_year";

const DATASET_SELECT: &str = "SELECT d.id, d.vendor_id, v.name AS vendor_name, d.title,
        d.description, d.domain, d.pricing_model, d.license, d.granularity,
        d.temporal_coverage, d.geographic_coverage, d.embedding, v.contact_email
     FROM datasets d
     JOIN vendors v ON v.id = d.vendor_id";

/// Stores embeddings as packed little-endian `f32` values.
pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, RepositoryError> {
    if bytes.len() % 4 != 0 {
        return Err(RepositoryError::Decode(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Case-insensitive substring match using Unicode lowercasing.
///
/// SQLite's `LOWER` and `NOCASE` only fold ASCII, so matching happens here instead of in SQL.
fn contains_folded(haystack: Option<&str>, needle: &str) -> bool {
    haystack.unwrap_or_default().to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Clone)]
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Public, active datasets that have no stored embedding yet, with the text to embed.
    pub async fn datasets_missing_embeddings(
        &self,
        limit: u32,
    ) -> Result<Vec<(DatasetId, String)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, IFNULL(description, '') AS description, IFNULL(domain, '') AS domain
             FROM datasets
             WHERE embedding IS NULL AND visibility = 'public' AND status = 'active'
             ORDER BY rowid
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(decode_err)?;
                let title: String = row.try_get("title").map_err(decode_err)?;
                let description: String = row.try_get("description").map_err(decode_err)?;
                let domain: String = row.try_get("domain").map_err(decode_err)?;
                let text = [title, description, domain]
                    .into_iter()
                    .filter(|part| !part.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok((DatasetId(id), text))
            })
            .collect()
    }

    pub async fn store_dataset_embedding(
        &self,
        id: &DatasetId,
        embedding: &[f32],
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE datasets SET embedding = ? WHERE id = ?")
            .bind(encode_embedding(embedding))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn vendors_matching(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Vendor>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY rowid"))
                .fetch_all(&self.pool)
                .await?;

        let mut matched = Vec::new();
        for row in &rows {
            if matched.len() >= limit as usize {
                break;
            }
            let vendor = row_to_vendor(row)?;
            if contains_folded(Some(&vendor.name), query)
                || contains_folded(vendor.industry_focus.as_deref(), query)
            {
                matched.push(vendor);
            }
        }
        Ok(matched)
    }

    async fn vendor_by_id(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_vendor).transpose()
    }

    async fn visible_candidates(
        &self,
    ) -> Result<Vec<(Dataset, Option<Vec<f32>>)>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{DATASET_SELECT}
             WHERE d.visibility = 'public' AND d.status = 'active'
             ORDER BY d.rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let embedding: Option<Vec<u8>> = row.try_get("embedding").map_err(decode_err)?;
                let embedding = embedding.as_deref().map(decode_embedding).transpose()?;
                Ok((row_to_dataset(row)?, embedding))
            })
            .collect()
    }

    async fn filtered(
        &self,
        filter: &DatasetFilter,
        limit: u32,
    ) -> Result<Vec<Dataset>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{DATASET_SELECT}
             WHERE d.visibility = 'public' AND d.status = 'active'
             ORDER BY d.rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut matched = Vec::new();
        for row in &rows {
            if matched.len() >= limit as usize {
                break;
            }
            let dataset = row_to_dataset(row)?;
            let domain_ok = filter
                .domain
                .as_deref()
                .map_or(true, |domain| contains_folded(dataset.domain.as_deref(), domain));
            let price_ok = filter.price_model.as_deref().map_or(true, |price_model| {
                contains_folded(dataset.pricing_model.as_deref(), price_model)
            });
            if domain_ok && price_ok {
                matched.push(dataset);
            }
        }
        Ok(matched)
    }

    async fn report(&self, id: &DatasetId) -> Result<Option<DatasetReport>, RepositoryError> {
        let row =
            sqlx::query(&format!("{DATASET_SELECT} WHERE d.id = ? AND d.visibility = 'public'"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let dataset = row_to_dataset(&row)?;
        let vendor_contact: Option<String> = row.try_get("contact_email").map_err(decode_err)?;

        let column_rows = sqlx::query(
            "SELECT name, data_type, description, sample_values
             FROM dataset_columns
             WHERE dataset_id = ?
             ORDER BY position, id",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        let columns = column_rows
            .iter()
            .map(|row| {
                Ok(DatasetColumn {
                    name: row.try_get("name").map_err(decode_err)?,
                    data_type: row.try_get("data_type").map_err(decode_err)?,
                    description: row.try_get("description").map_err(decode_err)?,
                    sample_values: row.try_get("sample_values").map_err(decode_err)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(DatasetReport { dataset, vendor_contact, columns }))
    }
}

fn row_to_vendor(row: &sqlx::sqlite::SqliteRow) -> Result<Vendor, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let founded_year: Option<i64> = row.try_get("founded_year").map_err(decode_err)?;

    Ok(Vendor {
        id: VendorId(id),
        name: row.try_get("name").map_err(decode_err)?,
        industry_focus: row.try_get("industry_focus").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        website_url: row.try_get("website_url").map_err(decode_err)?,
        contact_email: row.try_get("contact_email").map_err(decode_err)?,
        country: row.try_get("country").map_err(decode_err)?,
        region: row.try_get("region").map_err(decode_err)?,
        city: row.try_get("city").map_err(decode_err)?,
        organization_type: row.try_get("organization_type").map_err(decode_err)?,
        founded_year: founded_year.and_then(|year| i32::try_from(year).ok()),
    })
}

fn row_to_dataset(row: &sqlx::sqlite::SqliteRow) -> Result<Dataset, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let vendor_id: String = row.try_get("vendor_id").map_err(decode_err)?;

    Ok(Dataset {
        id: DatasetId(id),
        vendor_id: VendorId(vendor_id),
        vendor_name: row.try_get("vendor_name").map_err(decode_err)?,
        title: row.try_get("title").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        domain: row.try_get("domain").map_err(decode_err)?,
        pricing_model: row.try_get("pricing_model").map_err(decode_err)?,
        license: row.try_get("license").map_err(decode_err)?,
        granularity: row.try_get("granularity").map_err(decode_err)?,
        temporal_coverage: row.try_get("temporal_coverage").map_err(decode_err)?,
        geographic_coverage: row.try_get("geographic_coverage").map_err(decode_err)?,
    })
}

#[async_trait]
impl CatalogStore for SqlCatalogRepository {
    async fn search_vendors(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Vendor>, ApplicationError> {
        Ok(self.vendors_matching(query, limit).await?)
    }

    async fn find_vendor(&self, id: &VendorId) -> Result<Option<Vendor>, ApplicationError> {
        Ok(self.vendor_by_id(id).await?)
    }

    async fn visible_datasets_with_embeddings(
        &self,
    ) -> Result<Vec<(Dataset, Option<Vec<f32>>)>, ApplicationError> {
        Ok(self.visible_candidates().await?)
    }

    async fn filter_datasets(
        &self,
        filter: &DatasetFilter,
        limit: u32,
    ) -> Result<Vec<Dataset>, ApplicationError> {
        Ok(self.filtered(filter, limit).await?)
    }

    async fn dataset_report(
        &self,
        id: &DatasetId,
    ) -> Result<Option<DatasetReport>, ApplicationError> {
        Ok(self.report(id).await?)
    }
}
