//! Chart datasets
//!
//! The three datasets the dashboard charts, returned as plain [`Table`]s with
//! a hint about which columns go on which axis. Drawing is left to the caller.

use crate::core::db::{CallOptions, ConnectionManager, Params, QueryExecutor};
use crate::core::{BankslightError, Result};
use crate::table::Table;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How a dataset is meant to be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartStyle {
    Bar,
    Pie,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    CustomersByCity,
    TransactionVolumeByType,
    AccountBalanceDistribution,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::CustomersByCity,
        ChartKind::TransactionVolumeByType,
        ChartKind::AccountBalanceDistribution,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ChartKind::CustomersByCity => "customers_by_city",
            ChartKind::TransactionVolumeByType => "transaction_volume_by_type",
            ChartKind::AccountBalanceDistribution => "account_balance_distribution",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::CustomersByCity => "Customers by City",
            ChartKind::TransactionVolumeByType => "Transaction Volume by Type",
            ChartKind::AccountBalanceDistribution => "Account Balance Distribution",
        }
    }

    pub fn style(&self) -> ChartStyle {
        match self {
            ChartKind::CustomersByCity => ChartStyle::Bar,
            ChartKind::TransactionVolumeByType => ChartStyle::Pie,
            ChartKind::AccountBalanceDistribution => ChartStyle::Histogram,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            ChartKind::CustomersByCity => {
                "SELECT city, COUNT(*) AS total FROM customers GROUP BY city ORDER BY city"
            }
            ChartKind::TransactionVolumeByType => {
                "SELECT txn_type, SUM(amount) AS total FROM transactions GROUP BY txn_type ORDER BY txn_type"
            }
            ChartKind::AccountBalanceDistribution => {
                "SELECT account_balance FROM accounts ORDER BY account_balance"
            }
        }
    }

    /// `(x, y)` columns; a histogram only has an x axis
    fn axes(&self) -> (&'static str, Option<&'static str>) {
        match self {
            ChartKind::CustomersByCity => ("city", Some("total")),
            ChartKind::TransactionVolumeByType => ("txn_type", Some("total")),
            ChartKind::AccountBalanceDistribution => ("account_balance", None),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChartKind {
    type Err = BankslightError;

    fn from_str(s: &str) -> Result<Self> {
        ChartKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| BankslightError::NotFound(format!("unknown chart '{}'", s)))
    }
}

/// A dataset ready to be handed to a plotting front end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub kind: ChartKind,
    pub title: &'static str,
    pub style: ChartStyle,
    pub x: &'static str,
    pub y: Option<&'static str>,
    pub table: Table,
}

/// Loads the dataset for `kind`
pub fn load(connections: &ConnectionManager, kind: ChartKind, options: &CallOptions) -> Result<ChartData> {
    let table = QueryExecutor::new(connections).run_with(kind.sql(), &Params::None, options)?;
    debug!("Chart {} has {} points", kind, table.row_count());

    let (x, y) = kind.axes();
    Ok(ChartData {
        kind,
        title: kind.title(),
        style: kind.style(),
        x,
        y,
        table,
    })
}
