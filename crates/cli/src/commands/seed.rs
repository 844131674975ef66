use crate::commands::{runtime, CommandResult};
use puddle_core::config::{AppConfig, LoadOptions};
use puddle_db::{connect_from_config, migrations, DatasetSeedInfo, MarketplaceSeedDataset};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime("seed") {
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

        let seed_result = MarketplaceSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = MarketplaceSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(SeedOutput {
                vendors: seed_result.vendors_seeded,
                datasets: seed_result.datasets_seeded,
            })
        } else {
            Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => CommandResult::success("seed", output.describe()),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedOutput {
    vendors: usize,
    datasets: Vec<DatasetSeedInfo>,
}

impl SeedOutput {
    fn describe(&self) -> String {
        let lines = self
            .datasets
            .iter()
            .map(|dataset| {
                let visibility = if dataset.discoverable { "discoverable" } else { "hidden" };
                format!("  - {}: {} ({visibility})", dataset.dataset_id, dataset.title)
            })
            .collect::<Vec<_>>();
        format!(
            "marketplace seed loaded: {} vendors, {} datasets\n{}",
            self.vendors,
            self.datasets.len(),
            lines.join("\n")
        )
    }
}

fn verification_failure_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{verification_failure_message, SeedOutput};
    use puddle_db::DatasetSeedInfo;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [
            ("Northwind Analytics", true),
            ("fraud-signals-columns", false),
            ("Global Port Call Events", false),
        ];

        assert_eq!(
            verification_failure_message(&checks),
            "Seed verification failed for checks: fraud-signals-columns, Global Port Call Events"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("Northwind Analytics", true), ("spend-index-columns", true)];

        assert_eq!(verification_failure_message(&checks), "Some seed data failed to load");
    }

    #[test]
    fn summary_marks_hidden_datasets() {
        let output = SeedOutput {
            vendors: 1,
            datasets: vec![
                DatasetSeedInfo { dataset_id: "d-1", title: "Open", discoverable: true },
                DatasetSeedInfo { dataset_id: "d-2", title: "Private", discoverable: false },
            ],
        };

        let summary = output.describe();
        assert!(summary.starts_with("marketplace seed loaded: 1 vendors, 2 datasets"));
        assert!(summary.contains("  - d-1: Open (discoverable)"));
        assert!(summary.contains("  - d-2: Private (hidden)"));
    }
}
