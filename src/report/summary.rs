use serde::Serialize;

use crate::transaction::{TransactionRow, TransactionType};

/// The totals shown at the top of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_income: f64,
    pub total_expense: f64,
    /// Income minus expenses.
    pub net: f64,
}

/// Total the income and expenses in `rows`.
pub fn summarize(rows: &[TransactionRow]) -> ReportSummary {
    let (total_income, total_expense) =
        rows.iter()
            .fold((0.0, 0.0), |(income, expense), row| match row.transaction_type {
                TransactionType::Income => (income + row.amount, expense),
                TransactionType::Expense => (income, expense + row.amount),
            });

    ReportSummary {
        total_income,
        total_expense,
        net: total_income - total_expense,
    }
}
