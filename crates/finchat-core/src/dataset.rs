//! Transactions dataset injected into the analyst system prompt.
//!
//! The assistant reasons over a fixed set of transactions supplied at
//! prompt-assembly time. Loading order: an explicit `dataset_path` from
//! config, then `${FINCHAT_HOME}/transactions.json`, then a bundled sample
//! so the program works out of the box.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{Config, paths};

/// A bundled sample dataset, used when no user dataset is present.
const SAMPLE_TRANSACTIONS: &str = include_str!("../assets/transactions.json");

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// One financial transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

/// The loaded transactions dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    transactions: Vec<Transaction>,
}

/// Aggregates used for the `dataset summary` command and prompt context.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub transaction_count: usize,
    pub total_income: f64,
    pub total_expenses: f64,
    /// Expense totals per category, largest first.
    pub expenses_by_category: Vec<(String, f64)>,
    /// Distinct `YYYY-MM` months covered, ascending.
    pub months: Vec<String>,
}

impl Dataset {
    /// Loads the dataset for the given config.
    ///
    /// # Errors
    /// Returns an error when a user-provided file exists but cannot be read
    /// or parsed. The bundled sample is assumed well-formed.
    pub fn load(config: &Config) -> Result<Self> {
        if let Some(path) = &config.dataset_path {
            return Self::load_file(Path::new(path));
        }

        let default_path = paths::dataset_path();
        if default_path.exists() {
            return Self::load_file(&default_path);
        }

        Self::from_json(SAMPLE_TRANSACTIONS).context("Failed to parse bundled sample dataset")
    }

    fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset from {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse dataset from {}", path.display()))
    }

    /// Parses a dataset from a JSON array of transactions.
    ///
    /// # Errors
    /// Returns an error when the JSON is not a valid transaction array.
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset = serde_json::from_str(json)?;
        Ok(dataset)
    }

    /// Serializes the dataset for injection into the system prompt.
    ///
    /// # Errors
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.transactions).context("Failed to serialize dataset")
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Computes aggregate figures over the dataset.
    pub fn summary(&self) -> DatasetSummary {
        let mut total_income = 0.0;
        let mut total_expenses = 0.0;
        let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
        let mut months: Vec<String> = Vec::new();

        for tx in &self.transactions {
            match tx.kind {
                TransactionKind::Income => total_income += tx.amount,
                TransactionKind::Expense => {
                    total_expenses += tx.amount;
                    *by_category.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;
                }
            }
            let month = format!("{:04}-{:02}", tx.date.year(), tx.date.month());
            if !months.contains(&month) {
                months.push(month);
            }
        }

        months.sort();

        let mut expenses_by_category: Vec<(String, f64)> = by_category
            .into_iter()
            .map(|(category, total)| (category.to_string(), total))
            .collect();
        expenses_by_category
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        DatasetSummary {
            transaction_count: self.transactions.len(),
            total_income,
            total_expenses,
            expenses_by_category,
            months,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_json(
            r#"[
                {"date":"2025-05-01","description":"Salary","category":"Salary","amount":3000.0,"type":"income"},
                {"date":"2025-05-03","description":"Groceries","category":"Food","amount":120.5,"type":"expense"},
                {"date":"2025-06-10","description":"Rent","category":"Housing","amount":900.0,"type":"expense"},
                {"date":"2025-06-12","description":"Restaurant","category":"Food","amount":45.0,"type":"expense"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parses_transactions() {
        let dataset = sample();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.transactions()[0].kind, TransactionKind::Income);
        assert_eq!(
            dataset.transactions()[1].date,
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap()
        );
    }

    #[test]
    fn test_summary_totals_and_categories() {
        let summary = sample().summary();
        assert_eq!(summary.transaction_count, 4);
        assert!((summary.total_income - 3000.0).abs() < f64::EPSILON);
        assert!((summary.total_expenses - 1065.5).abs() < 1e-9);
        // Housing (900.0) outranks Food (165.5).
        assert_eq!(summary.expenses_by_category[0].0, "Housing");
        assert_eq!(summary.expenses_by_category[1].0, "Food");
        assert_eq!(summary.months, vec!["2025-05", "2025-06"]);
    }

    #[test]
    fn test_bundled_sample_parses() {
        let dataset = Dataset::from_json(SAMPLE_TRANSACTIONS).unwrap();
        assert!(!dataset.is_empty());
        let summary = dataset.summary();
        assert!(summary.total_income > 0.0);
        assert!(summary.total_expenses > 0.0);
    }

    #[test]
    fn test_round_trips_through_json() {
        let dataset = sample();
        let json = dataset.to_json().unwrap();
        let reparsed = Dataset::from_json(&json).unwrap();
        assert_eq!(dataset, reparsed);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(Dataset::from_json("{\"not\":\"an array\"}").is_err());
        assert!(Dataset::from_json("[{\"date\":\"yesterday\"}]").is_err());
    }
}
