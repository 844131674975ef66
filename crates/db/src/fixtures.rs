use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Canonical marketplace seeds and the verification contract they must satisfy.
const SEED_VENDORS: &[SeedVendorContract] = &[
    SeedVendorContract {
        id: "8f1c2a10-0000-4000-8000-000000000001",
        name: "Northwind Analytics",
        industry_focus: "Finance",
    },
    SeedVendorContract {
        id: "8f1c2a10-0000-4000-8000-000000000002",
        name: "Harbor Geospatial",
        industry_focus: "Logistics",
    },
    SeedVendorContract {
        id: "8f1c2a10-0000-4000-8000-000000000003",
        name: "Meadow Health Data",
        industry_focus: "Healthcare",
    },
];

const SEED_DATASETS: &[SeedDatasetContract] = &[
    SeedDatasetContract {
        id: "5d7e9b20-0000-4000-8000-000000000001",
        vendor_id: "8f1c2a10-0000-4000-8000-000000000001",
        title: "Card Transaction Fraud Signals",
        visibility: "public",
        status: "active",
        expected_column_count: 3,
    },
    SeedDatasetContract {
        id: "5d7e9b20-0000-4000-8000-000000000002",
        vendor_id: "8f1c2a10-0000-4000-8000-000000000001",
        title: "Merchant Category Spend Index",
        visibility: "public",
        status: "active",
        expected_column_count: 2,
    },
    SeedDatasetContract {
        id: "5d7e9b20-0000-4000-8000-000000000003",
        vendor_id: "8f1c2a10-0000-4000-8000-000000000002",
        title: "Global Port Call Events",
        visibility: "public",
        status: "active",
        expected_column_count: 3,
    },
    SeedDatasetContract {
        id: "5d7e9b20-0000-4000-8000-000000000004",
        vendor_id: "8f1c2a10-0000-4000-8000-000000000002",
        title: "Freight Lane Rate Benchmarks",
        visibility: "private",
        status: "active",
        expected_column_count: 0,
    },
    SeedDatasetContract {
        id: "5d7e9b20-0000-4000-8000-000000000005",
        vendor_id: "8f1c2a10-0000-4000-8000-000000000003",
        title: "Provider Directory 2019",
        visibility: "public",
        status: "archived",
        expected_column_count: 0,
    },
];

pub struct MarketplaceSeedDataset;

impl MarketplaceSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/marketplace_seed.sql");

    pub fn vendor_ids() -> Vec<&'static str> {
        SEED_VENDORS.iter().map(|vendor| vendor.id).collect()
    }

    pub fn dataset_ids() -> Vec<&'static str> {
        SEED_DATASETS.iter().map(|dataset| dataset.id).collect()
    }

    /// Load the seed catalog. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            vendors_seeded: SEED_VENDORS.len(),
            datasets_seeded: SEED_DATASETS
                .iter()
                .map(|dataset| DatasetSeedInfo {
                    dataset_id: dataset.id,
                    title: dataset.title,
                    discoverable: dataset.is_discoverable(),
                })
                .collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_VENDORS.len() + SEED_DATASETS.len() * 2);

        for vendor in SEED_VENDORS {
            let present: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM vendors WHERE id = ? AND name = ? AND industry_focus = ?)",
            )
            .bind(vendor.id)
            .bind(vendor.name)
            .bind(vendor.industry_focus)
            .fetch_one(pool)
            .await?;
            checks.push((vendor.name, present));
        }

        for dataset in SEED_DATASETS {
            let present: bool = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM datasets
                    WHERE id = ? AND vendor_id = ? AND title = ? AND visibility = ? AND status = ?
                 )",
            )
            .bind(dataset.id)
            .bind(dataset.vendor_id)
            .bind(dataset.title)
            .bind(dataset.visibility)
            .bind(dataset.status)
            .fetch_one(pool)
            .await?;
            checks.push((dataset.title, present));

            let column_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM dataset_columns WHERE dataset_id = ?")
                    .bind(dataset.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((dataset.columns_label(), column_count == dataset.expected_column_count));
        }

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }

    /// Remove seeded catalog rows. Inquiries referencing seeded datasets go first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_datasets = sql_array_from_ids(&Self::dataset_ids());
        let quoted_vendors = sql_array_from_ids(&Self::vendor_ids());

        sqlx::query(&format!("DELETE FROM inquiries WHERE dataset_id IN {quoted_datasets}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM dataset_columns WHERE dataset_id IN {quoted_datasets}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM datasets WHERE id IN {quoted_datasets}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM vendors WHERE id IN {quoted_vendors}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedVendorContract {
    id: &'static str,
    name: &'static str,
    industry_focus: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedDatasetContract {
    id: &'static str,
    vendor_id: &'static str,
    title: &'static str,
    visibility: &'static str,
    status: &'static str,
    expected_column_count: i64,
}

impl SeedDatasetContract {
    fn is_discoverable(&self) -> bool {
        self.visibility == "public" && self.status == "active"
    }

    fn columns_label(&self) -> &'static str {
        match self.id {
            "5d7e9b20-0000-4000-8000-000000000001" => "fraud-signals-columns",
            "5d7e9b20-0000-4000-8000-000000000002" => "spend-index-columns",
            "5d7e9b20-0000-4000-8000-000000000003" => "port-calls-columns",
            "5d7e9b20-0000-4000-8000-000000000004" => "freight-benchmarks-columns",
            _ => "provider-directory-columns",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub vendors_seeded: usize,
    pub datasets_seeded: Vec<DatasetSeedInfo>,
}

#[derive(Debug)]
pub struct DatasetSeedInfo {
    pub dataset_id: &'static str,
    pub title: &'static str,
    pub discoverable: bool,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
