use std::io;

use rust_decimal::prelude::*;
use serde::{Serialize, Serializer};

use crate::summary::BudgetSummary;

/// Advisory marker, written as `yes` or left blank.
#[derive(PartialEq, Debug, Clone, Copy)]
enum Flag {
    Raised,
    Clear,
}

impl From<bool> for Flag {
    fn from(raised: bool) -> Flag {
        if raised {
            Flag::Raised
        } else {
            Flag::Clear
        }
    }
}

impl Serialize for Flag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(match self {
            Flag::Raised => "yes",
            Flag::Clear => "",
        })
    }
}

#[derive(Serialize)]
struct Statement<'a> {
    category: &'a str,
    total: Decimal,
    too_high: Flag,
    discretionary: Flag,
}

/// write_statement emits one CSV row per expense category
pub fn write_statement<W: io::Write>(summary: &BudgetSummary, out: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for category in &summary.categories {
        writer.serialize(Statement {
            category: &category.category,
            total: category.total,
            too_high: category.too_high.into(),
            discretionary: category.discretionary.into(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{BudgetAggregator, Snapshot};
    use crate::money::Amount;
    use crate::transactions::{Transaction, TransactionId, TransactionKind, UserId};
    use anyhow::Result;

    #[test]
    fn test_write_statement() -> Result<()> {
        let expense = |id: i64, category: &str, amount: &str| -> Result<Transaction> {
            Ok(Transaction {
                id: TransactionId(id),
                user: UserId(1),
                category: category.to_string(),
                amount: Amount::parse(amount)?,
                kind: TransactionKind::Expense,
            })
        };
        let summary = BudgetAggregator::default().summarize(&Snapshot {
            transactions: vec![expense(1, "rent", "800")?, expense(2, "luxury bag", "15000")?],
            budget: None,
        });

        let mut out = Vec::new();
        write_statement(&summary, &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "category,total,too_high,discretionary\n\
             luxury bag,15000.00,yes,yes\n\
             rent,800.00,,\n"
        );
        Ok(())
    }
}
