use crate::commands::{runtime, CommandResult};
use puddle_core::config::{AppConfig, EmbeddingProviderKind, LoadOptions};
use puddle_core::discovery::EmbeddingProvider;
use puddle_core::domain::catalog::DatasetId;
use puddle_db::{connect_from_config, migrations, RepositoryError, SqlCatalogRepository};
use puddle_mcp::embedding;

pub const DEFAULT_BATCH_SIZE: u32 = 100;

#[derive(Debug, Default)]
pub struct ReindexSummary {
    pub embedded: usize,
    pub failed: Vec<(DatasetId, String)>,
}

/// Embeds up to `batch_size` discoverable datasets that have no stored vector.
///
/// A failed embedding leaves that dataset without a vector and is reported in the summary.
pub async fn backfill(
    catalog: &SqlCatalogRepository,
    embedder: &dyn EmbeddingProvider,
    batch_size: u32,
) -> Result<ReindexSummary, RepositoryError> {
    let mut summary = ReindexSummary::default();
    for (dataset_id, text) in catalog.datasets_missing_embeddings(batch_size.max(1)).await? {
        match embedder.embed(&text).await {
            Ok(vector) => {
                if catalog.store_dataset_embedding(&dataset_id, &vector).await? {
                    summary.embedded += 1;
                }
            }
            Err(error) => summary.failed.push((dataset_id, error.to_string())),
        }
    }
    Ok(summary)
}

pub fn run(batch_size: u32) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "reindex",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    if config.embedding.provider == EmbeddingProviderKind::Disabled {
        return CommandResult::failure(
            "reindex",
            "embedding_disabled",
            "embedding provider is disabled; set embedding.provider = \"gemini\"",
            2,
        );
    }

    let embedder = match embedding::from_config(&config.embedding) {
        Ok(embedder) => embedder,
        Err(error) => {
            return CommandResult::failure("reindex", "embedding_config", error.to_string(), 2);
        }
    };

    let runtime = match runtime("reindex") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let catalog = SqlCatalogRepository::new(pool.clone());
        let summary = backfill(&catalog, embedder.as_ref(), batch_size)
            .await
            .map_err(|error| ("reindex_storage", error.to_string(), 5u8));
        pool.close().await;
        summary
    });

    match result {
        Ok(summary) if summary.failed.is_empty() => CommandResult::success(
            "reindex",
            format!("embedded {} datasets", summary.embedded),
        ),
        Ok(summary) => {
            let failures = summary
                .failed
                .iter()
                .map(|(dataset_id, error)| format!("  - {}: {error}", dataset_id.0))
                .collect::<Vec<_>>();
            CommandResult::failure(
                "reindex",
                "embedding_request",
                format!(
                    "embedded {} datasets, {} failed:\n{}",
                    summary.embedded,
                    summary.failed.len(),
                    failures.join("\n")
                ),
                7,
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reindex", error_class, message, exit_code)
        }
    }
}
