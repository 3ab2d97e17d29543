use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use serde::Serialize;

use crate::money::to_cents;
use crate::transactions::Transaction;

pub const TOO_HIGH_THRESHOLD: i64 = 10_000;

pub const DISCRETIONARY_KEYWORDS: [&str; 7] = [
    "entertainment",
    "games",
    "shoes",
    "clothing",
    "luxury",
    "gadget",
    "vacation",
];

/// Thresholds and keywords behind the per-category annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagRules {
    pub too_high_threshold: Decimal,
    /// lowercase; matched as substrings of the lowercased label
    pub discretionary_keywords: Vec<String>,
}

impl Default for FlagRules {
    fn default() -> FlagRules {
        FlagRules {
            too_high_threshold: Decimal::from(TOO_HIGH_THRESHOLD),
            discretionary_keywords: DISCRETIONARY_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
        }
    }
}

/// What the aggregator reads: the transactions on display and the budget.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub transactions: Vec<Transaction>,
    pub budget: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub too_high: bool,
    pub discretionary: bool,
}

/// Figures derived from a [`Snapshot`], all rounded to two places.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub budget: Option<Decimal>,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// budget minus expenses; unavailable while no budget is set
    pub balance: Option<Decimal>,
    /// budget plus income
    pub combined_budget: Option<Decimal>,
    pub over_budget: bool,
    /// expense categories ordered by label
    pub categories: Vec<CategoryTotal>,
}

impl BudgetSummary {
    pub fn category(&self, label: &str) -> Option<&CategoryTotal> {
        self.categories.iter().find(|c| c.category == label)
    }

    pub fn category_totals(&self) -> BTreeMap<String, Decimal> {
        self.categories
            .iter()
            .map(|c| (c.category.clone(), c.total))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetAggregator {
    rules: FlagRules,
}

impl BudgetAggregator {
    pub fn new(rules: FlagRules) -> BudgetAggregator {
        BudgetAggregator { rules }
    }

    pub fn total_income(&self, transactions: &[Transaction]) -> Decimal {
        transactions
            .iter()
            .filter(|t| t.is_income())
            .fold(Decimal::ZERO, |sum, t| sum.saturating_add(t.amount.value()))
    }

    pub fn total_expenses(&self, transactions: &[Transaction]) -> Decimal {
        transactions
            .iter()
            .filter(|t| t.is_expense())
            .fold(Decimal::ZERO, |sum, t| sum.saturating_add(t.amount.value()))
    }

    /// category_totals sums expenses per label; income never creates a key
    pub fn category_totals(&self, transactions: &[Transaction]) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for t in transactions.iter().filter(|t| t.is_expense()) {
            let total = totals.entry(t.category.clone()).or_insert(Decimal::ZERO);
            *total = total.saturating_add(t.amount.value());
        }
        totals
    }

    pub fn is_too_high(&self, total: Decimal) -> bool {
        total > self.rules.too_high_threshold
    }

    pub fn is_discretionary(&self, category: &str) -> bool {
        let label = category.to_lowercase();
        self.rules
            .discretionary_keywords
            .iter()
            .any(|keyword| label.contains(keyword.as_str()))
    }

    /// summarize never fails; sums past `Decimal`'s range saturate
    pub fn summarize(&self, snapshot: &Snapshot) -> BudgetSummary {
        let income = self.total_income(&snapshot.transactions);
        let expenses = self.total_expenses(&snapshot.transactions);
        let budget = snapshot.budget;

        let categories = self
            .category_totals(&snapshot.transactions)
            .into_iter()
            .map(|(category, total)| CategoryTotal {
                too_high: self.is_too_high(total),
                discretionary: self.is_discretionary(&category),
                total: to_cents(total),
                category,
            })
            .collect();

        BudgetSummary {
            budget: budget.map(to_cents),
            total_income: to_cents(income),
            total_expenses: to_cents(expenses),
            balance: budget.map(|b| to_cents(b.saturating_sub(expenses))),
            combined_budget: budget.map(|b| to_cents(b.saturating_add(income))),
            over_budget: budget.map_or(false, |b| expenses > b.saturating_add(income)),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Amount;
    use crate::transactions::{TransactionId, TransactionKind, UserId};
    use anyhow::Result;
    use rust_decimal_macros::dec;

    fn tx(id: i64, category: &str, amount: &str, kind: TransactionKind) -> Result<Transaction> {
        Ok(Transaction {
            id: TransactionId(id),
            user: UserId(1),
            category: category.to_string(),
            amount: Amount::parse(amount)?,
            kind,
        })
    }

    fn snapshot(budget: Option<&str>, transactions: Vec<Transaction>) -> Result<Snapshot> {
        Ok(Snapshot {
            transactions,
            budget: budget.map(Decimal::from_str).transpose()?,
        })
    }

    #[test]
    fn test_dashboard_scenario() -> Result<()> {
        let snapshot = snapshot(
            Some("1000"),
            vec![
                tx(1, "food", "1200", TransactionKind::Expense)?,
                tx(2, "salary", "2000", TransactionKind::Income)?,
            ],
        )?;
        let summary = BudgetAggregator::default().summarize(&snapshot);
        assert_eq!(summary.total_expenses.to_string(), "1200.00");
        assert_eq!(summary.total_income.to_string(), "2000.00");
        assert_eq!(summary.balance.map(|b| b.to_string()), Some("-200.00".to_string()));
        assert_eq!(summary.combined_budget, Some(dec!(3000)));
        assert!(!summary.over_budget);
        Ok(())
    }

    #[test]
    fn test_over_budget() -> Result<()> {
        let snapshot = snapshot(
            Some("1000"),
            vec![
                tx(1, "rent", "900", TransactionKind::Expense)?,
                tx(2, "food", "200.01", TransactionKind::Expense)?,
                tx(3, "refund", "100", TransactionKind::Income)?,
            ],
        )?;
        assert!(BudgetAggregator::default().summarize(&snapshot).over_budget);
        Ok(())
    }

    #[test]
    fn test_expenses_equal_to_combined_budget_is_not_over() -> Result<()> {
        let snapshot = snapshot(
            Some("1000"),
            vec![
                tx(1, "rent", "1100", TransactionKind::Expense)?,
                tx(2, "refund", "100", TransactionKind::Income)?,
            ],
        )?;
        assert!(!BudgetAggregator::default().summarize(&snapshot).over_budget);
        Ok(())
    }

    #[test]
    fn test_unset_budget() -> Result<()> {
        let snapshot = snapshot(None, vec![tx(1, "rent", "99999", TransactionKind::Expense)?])?;
        let summary = BudgetAggregator::default().summarize(&snapshot);
        assert_eq!(summary.budget, None);
        assert_eq!(summary.balance, None);
        assert_eq!(summary.combined_budget, None);
        assert!(!summary.over_budget);
        assert_eq!(summary.total_expenses, dec!(99999));
        Ok(())
    }

    #[test]
    fn test_empty_snapshot() {
        let summary = BudgetAggregator::default().summarize(&Snapshot::default());
        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.total_expenses, Decimal::ZERO);
        assert!(summary.categories.is_empty());
    }

    #[test]
    fn test_totals_independent_of_order() -> Result<()> {
        let mut transactions = vec![
            tx(1, "food", "0.10", TransactionKind::Expense)?,
            tx(2, "salary", "1500.55", TransactionKind::Income)?,
            tx(3, "food", "0.20", TransactionKind::Expense)?,
            tx(4, "bonus", "0.30", TransactionKind::Income)?,
            tx(5, "rent", "700", TransactionKind::Expense)?,
        ];
        let aggregator = BudgetAggregator::default();
        let expected = aggregator.summarize(&Snapshot {
            transactions: transactions.clone(),
            budget: None,
        });
        assert_eq!(expected.total_income, dec!(1500.85));
        assert_eq!(expected.total_expenses, dec!(700.30));

        for rotation in 1..transactions.len() {
            transactions.rotate_left(1);
            let mut reversed = transactions.clone();
            reversed.reverse();
            for order in [transactions.clone(), reversed] {
                let summary = aggregator.summarize(&Snapshot {
                    transactions: order,
                    budget: None,
                });
                assert_eq!(summary, expected, "rotation {}", rotation);
            }
        }
        Ok(())
    }

    #[test]
    fn test_no_drift_over_many_small_amounts() -> Result<()> {
        let transactions = (0..1000)
            .map(|i| tx(i, "coffee", "0.10", TransactionKind::Expense))
            .collect::<Result<Vec<_>>>()?;
        let total = BudgetAggregator::default().total_expenses(&transactions);
        assert_eq!(total, dec!(100));
        Ok(())
    }

    #[test]
    fn test_extreme_values_saturate() -> Result<()> {
        let largest = Amount::try_from(Decimal::from(crate::money::MAX_AMOUNT))?;
        let transactions = (0..1000)
            .map(|i| Transaction {
                id: TransactionId(i),
                user: UserId(1),
                category: "yacht".to_string(),
                amount: largest,
                kind: if i % 2 == 0 {
                    TransactionKind::Expense
                } else {
                    TransactionKind::Income
                },
            })
            .collect::<Vec<_>>();
        let aggregator = BudgetAggregator::default();

        let summary = aggregator.summarize(&Snapshot {
            transactions: transactions.clone(),
            budget: Some(Decimal::MAX),
        });
        assert_eq!(summary.total_expenses.to_string(), "500000000000000.00");
        assert_eq!(summary.combined_budget, Some(Decimal::MAX));
        assert!(!summary.over_budget);

        let summary = aggregator.summarize(&Snapshot {
            transactions,
            budget: Some(Decimal::MIN),
        });
        assert_eq!(summary.balance, Some(Decimal::MIN));
        assert!(summary.over_budget);
        Ok(())
    }

    #[test]
    fn test_balance_is_budget_minus_expenses() -> Result<()> {
        let aggregator = BudgetAggregator::default();
        for (budget, expected) in [("0", "-250.25"), ("250.25", "0.00"), ("1000", "749.75")] {
            let summary = aggregator.summarize(&snapshot(
                Some(budget),
                vec![
                    tx(1, "rent", "200", TransactionKind::Expense)?,
                    tx(2, "food", "50.25", TransactionKind::Expense)?,
                    tx(3, "salary", "900", TransactionKind::Income)?,
                ],
            )?);
            assert_eq!(summary.balance.map(|b| b.to_string()), Some(expected.to_string()));
        }
        Ok(())
    }

    #[test]
    fn test_category_totals_only_count_expenses() -> Result<()> {
        let transactions = vec![
            tx(1, "food", "10.10", TransactionKind::Expense)?,
            tx(2, "food", "5.05", TransactionKind::Expense)?,
            tx(3, "salary", "3000", TransactionKind::Income)?,
            tx(4, "Food", "1", TransactionKind::Expense)?,
        ];
        let totals = BudgetAggregator::default().category_totals(&transactions);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get("food"), Some(&dec!(15.15)));
        assert_eq!(totals.get("Food"), Some(&dec!(1)));
        assert_eq!(totals.get("salary"), None);
        Ok(())
    }

    #[test]
    fn test_luxury_category_flags() -> Result<()> {
        let snapshot = snapshot(
            Some("20000"),
            vec![
                tx(1, "luxury bag", "9000", TransactionKind::Expense)?,
                tx(2, "luxury bag", "6000", TransactionKind::Expense)?,
                tx(3, "groceries", "10000", TransactionKind::Expense)?,
            ],
        )?;
        let summary = BudgetAggregator::default().summarize(&snapshot);

        let bag = summary.category("luxury bag").expect("category present");
        assert_eq!(bag.total, dec!(15000));
        assert!(bag.too_high);
        assert!(bag.discretionary);

        let groceries = summary.category("groceries").expect("category present");
        assert!(!groceries.too_high, "threshold is exclusive");
        assert!(!groceries.discretionary);
        Ok(())
    }

    #[test]
    fn test_discretionary_is_case_insensitive_substring() {
        let aggregator = BudgetAggregator::default();
        assert!(aggregator.is_discretionary("Summer VACATION"));
        assert!(aggregator.is_discretionary("video games"));
        assert!(aggregator.is_discretionary("Gadgets"));
        assert!(!aggregator.is_discretionary("rent"));
        assert!(!aggregator.is_discretionary("game"));
    }

    #[test]
    fn test_custom_rules() {
        let aggregator = BudgetAggregator::new(FlagRules {
            too_high_threshold: dec!(50),
            discretionary_keywords: vec!["coffee".to_string()],
        });
        assert!(aggregator.is_too_high(dec!(50.01)));
        assert!(aggregator.is_discretionary("Morning Coffee"));
        assert!(!aggregator.is_discretionary("luxury"));
    }

    #[test]
    fn test_summarize_is_idempotent() -> Result<()> {
        let snapshot = snapshot(
            Some("1234.56"),
            vec![
                tx(1, "shoes", "120.99", TransactionKind::Expense)?,
                tx(2, "salary", "2000", TransactionKind::Income)?,
            ],
        )?;
        let aggregator = BudgetAggregator::default();
        let first = aggregator.summarize(&snapshot);
        let second = aggregator.summarize(&snapshot);
        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);
        Ok(())
    }
}
