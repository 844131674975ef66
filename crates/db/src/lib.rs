pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use fixtures::{DatasetSeedInfo, MarketplaceSeedDataset, SeedResult, VerificationResult};
pub use repositories::{RepositoryError, SqlCatalogRepository, SqlInquiryRepository};
