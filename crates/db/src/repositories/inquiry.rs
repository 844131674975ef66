use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use puddle_core::domain::catalog::{DatasetId, VendorId};
use puddle_core::domain::inquiry::{
    BuyerDocument, BuyerId, Inquiry, InquiryId, InquiryStatus, VendorDocument,
};
use puddle_core::errors::ApplicationError;
use puddle_core::store::InquiryStore;

use super::{decode_err, RepositoryError};
use crate::DbPool;

const INQUIRY_COLUMNS: &str = "id, dataset_id, vendor_id, buyer_id, status, buyer_json, vendor_json,
        cumulative_summary, state_version, created_at, updated_at";

#[derive(Clone)]
pub struct SqlInquiryRepository {
    pool: DbPool,
}

impl SqlInquiryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &InquiryId) -> Result<Option<Inquiry>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_inquiry).transpose()
    }

    async fn write_new(&self, inquiry: &Inquiry) -> Result<(), RepositoryError> {
        let (buyer_json, vendor_json) = encode_documents(inquiry)?;
        sqlx::query(
            "INSERT INTO inquiries (id, dataset_id, vendor_id, buyer_id, status, buyer_json,
                                    vendor_json, cumulative_summary, state_version, created_at,
                                    updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&inquiry.id.0)
        .bind(&inquiry.dataset_id.0)
        .bind(&inquiry.vendor_id.0)
        .bind(&inquiry.buyer_id.0)
        .bind(inquiry.status.as_str())
        .bind(buyer_json)
        .bind(vendor_json)
        .bind(&inquiry.cumulative_summary)
        .bind(i64::from(inquiry.state_version))
        .bind(inquiry.created_at.to_rfc3339())
        .bind(inquiry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn swap(
        &self,
        expected_status: InquiryStatus,
        expected_version: u32,
        next: &Inquiry,
    ) -> Result<bool, RepositoryError> {
        let (buyer_json, vendor_json) = encode_documents(next)?;
        let result = sqlx::query(
            "UPDATE inquiries
             SET status = ?, buyer_json = ?, vendor_json = ?, cumulative_summary = ?,
                 state_version = ?, updated_at = ?
             WHERE id = ? AND status = ? AND state_version = ?",
        )
        .bind(next.status.as_str())
        .bind(buyer_json)
        .bind(vendor_json)
        .bind(&next.cumulative_summary)
        .bind(i64::from(next.state_version))
        .bind(next.updated_at.to_rfc3339())
        .bind(&next.id.0)
        .bind(expected_status.as_str())
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn dataset_owner(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<Option<VendorId>, RepositoryError> {
        let vendor_id: Option<String> = sqlx::query_scalar(
            "SELECT vendor_id FROM datasets
             WHERE id = ? AND visibility = 'public' AND status = 'active'",
        )
        .bind(&dataset_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vendor_id.map(VendorId))
    }
}

fn encode_documents(inquiry: &Inquiry) -> Result<(String, Option<String>), RepositoryError> {
    let buyer_json = serde_json::to_string(&inquiry.buyer).map_err(decode_err)?;
    let vendor_json = inquiry
        .vendor
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(decode_err)?;
    Ok((buyer_json, vendor_json))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid {field} `{value}`: {error}")))
}

fn row_to_inquiry(row: &sqlx::sqlite::SqliteRow) -> Result<Inquiry, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let dataset_id: String = row.try_get("dataset_id").map_err(decode_err)?;
    let vendor_id: String = row.try_get("vendor_id").map_err(decode_err)?;
    let buyer_id: String = row.try_get("buyer_id").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let buyer_json: String = row.try_get("buyer_json").map_err(decode_err)?;
    let vendor_json: Option<String> = row.try_get("vendor_json").map_err(decode_err)?;
    let cumulative_summary: String = row.try_get("cumulative_summary").map_err(decode_err)?;
    let state_version: i64 = row.try_get("state_version").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    let status = InquiryStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown inquiry status `{status}`")))?;
    let buyer: BuyerDocument = serde_json::from_str(&buyer_json)
        .map_err(|error| RepositoryError::Decode(format!("buyer_json: {error}")))?;
    let vendor = vendor_json
        .as_deref()
        .map(serde_json::from_str::<VendorDocument>)
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("vendor_json: {error}")))?;
    let state_version = u32::try_from(state_version).map_err(|_| {
        RepositoryError::Decode(format!("state_version {state_version} out of range"))
    })?;

    Ok(Inquiry {
        id: InquiryId(id),
        status,
        buyer,
        vendor,
        cumulative_summary,
        dataset_id: DatasetId(dataset_id),
        vendor_id: VendorId(vendor_id),
        buyer_id: BuyerId(buyer_id),
        state_version,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl InquiryStore for SqlInquiryRepository {
    async fn insert(&self, inquiry: &Inquiry) -> Result<(), ApplicationError> {
        Ok(self.write_new(inquiry).await?)
    }

    async fn find_by_id(&self, id: &InquiryId) -> Result<Option<Inquiry>, ApplicationError> {
        Ok(self.fetch(id).await?)
    }

    async fn compare_and_swap(
        &self,
        expected_status: InquiryStatus,
        expected_version: u32,
        next: &Inquiry,
    ) -> Result<bool, ApplicationError> {
        Ok(self.swap(expected_status, expected_version, next).await?)
    }

    async fn visible_dataset_vendor(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<Option<VendorId>, ApplicationError> {
        Ok(self.dataset_owner(dataset_id).await?)
    }
}
