//! Dataset command handlers.

use anyhow::Result;
use finchat_core::config::{Config, paths};
use finchat_core::dataset::Dataset;

use crate::cli::DatasetCommands;

pub fn run(command: &DatasetCommands, config: &Config) -> Result<()> {
    match command {
        DatasetCommands::Path => {
            if let Some(path) = &config.dataset_path {
                println!("{path}");
            } else {
                let default = paths::dataset_path();
                if default.exists() {
                    println!("{}", default.display());
                } else {
                    println!("{} (missing, bundled sample in use)", default.display());
                }
            }
            Ok(())
        }
        DatasetCommands::Summary => {
            let dataset = Dataset::load(config)?;
            let summary = dataset.summary();

            println!("Transactions:   {}", summary.transaction_count);
            println!("Months covered: {}", summary.months.join(", "));
            println!("Total income:   ${:.2}", summary.total_income);
            println!("Total expenses: ${:.2}", summary.total_expenses);
            println!(
                "Net:            ${:.2}",
                summary.total_income - summary.total_expenses
            );
            if !summary.expenses_by_category.is_empty() {
                println!("Top expense categories:");
                for (category, total) in summary.expenses_by_category.iter().take(5) {
                    println!("  {category}: ${total:.2}");
                }
            }
            Ok(())
        }
    }
}
