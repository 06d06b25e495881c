//! Query Catalog
//!
//! The fixed set of named, parameterized insight queries over the banking
//! schema. Entries are declared once, in display order, and never change at
//! runtime. Every statement uses named placeholders; the literals the
//! dashboard used to hard-code are now parameter defaults.

use crate::core::db::Params;
use crate::core::{BankslightError, Result};
use crate::table::Value;

/// Default value of a catalog parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Integer(i64),
    Text(&'static str),
}

impl From<ParamDefault> for Value {
    fn from(default: ParamDefault) -> Self {
        match default {
            ParamDefault::Integer(i) => Value::Integer(i),
            ParamDefault::Text(t) => Value::Text(t.to_string()),
        }
    }
}

/// A named placeholder declared by a catalog entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogParam {
    /// Placeholder name without the leading `:`
    pub name: &'static str,
    pub default: ParamDefault,
}

/// A pre-authored read query with its human-readable label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub sql: &'static str,
    pub params: &'static [CatalogParam],
}

const fn int(name: &'static str, value: i64) -> CatalogParam {
    CatalogParam {
        name,
        default: ParamDefault::Integer(value),
    }
}

const fn text(name: &'static str, value: &'static str) -> CatalogParam {
    CatalogParam {
        name,
        default: ParamDefault::Text(value),
    }
}

static ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        id: "customers_per_city_avg_balance",
        label: "How many customers exist per city, and what is their average account balance?",
        sql: "SELECT city, COUNT(*) AS customers, AVG(account_balance) AS avg_balance
              FROM customers c
              JOIN accounts a USING (customer_id)
              GROUP BY city
              LIMIT :limit",
        params: &[int("limit", 5)],
    },
    CatalogEntry {
        id: "account_type_total_balance",
        label: "Which account type holds the highest total balance?",
        sql: "SELECT c.account_type, SUM(a.account_balance) AS total_balance
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              GROUP BY c.account_type
              ORDER BY total_balance DESC",
        params: &[],
    },
    CatalogEntry {
        id: "top_customers_by_balance",
        label: "Top customers by total balance across all accounts",
        sql: "SELECT c.customer_id, c.name, c.city, c.account_type,
                     SUM(a.account_balance) AS total_balance
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              GROUP BY c.customer_id, c.name, c.city, c.account_type
              ORDER BY total_balance DESC
              LIMIT :limit",
        params: &[int("limit", 5)],
    },
    CatalogEntry {
        id: "joined_in_year_high_balance",
        label: "Customers who opened accounts in a given year with a high balance",
        sql: "SELECT c.customer_id, c.name, c.city, c.account_type, a.account_balance, c.join_date
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              WHERE strftime('%Y', c.join_date) = :year
                AND a.account_balance > :min_balance
              ORDER BY a.account_balance DESC
              LIMIT :limit",
        params: &[text("year", "2023"), int("min_balance", 100_000), int("limit", 5)],
    },
    CatalogEntry {
        id: "transaction_volume_by_type",
        label: "Total transaction volume by transaction type",
        sql: "SELECT txn_type, SUM(amount) AS total
              FROM transactions
              GROUP BY txn_type
              ORDER BY total DESC",
        params: &[],
    },
    CatalogEntry {
        id: "failed_transactions_per_month",
        label: "Accounts with repeated failed transactions in a month",
        sql: "SELECT customer_id, strftime('%Y-%m', txn_time) AS txn_month,
                     COUNT(*) AS failed_txn_count
              FROM transactions
              WHERE status = 'failed'
              GROUP BY customer_id, txn_month
              HAVING COUNT(*) > :min_failed
              ORDER BY failed_txn_count DESC
              LIMIT :limit",
        params: &[int("min_failed", 2), int("limit", 5)],
    },
    CatalogEntry {
        id: "top_branches_recent_volume",
        label: "Top branches by transaction volume (recent window)",
        sql: "SELECT b.Branch_Name, SUM(t.amount) AS total_transaction_volume
              FROM transactions t
              JOIN customers c ON t.customer_id = c.customer_id
              JOIN branches b ON c.city = b.City
              WHERE t.txn_time >= strftime('%Y-%m-%d', 'now', :window)
              GROUP BY b.Branch_Name
              ORDER BY total_transaction_volume DESC
              LIMIT :limit",
        params: &[text("window", "-6 months"), int("limit", 5)],
    },
    CatalogEntry {
        id: "high_value_transaction_accounts",
        label: "Accounts with many high-value successful transactions",
        sql: "SELECT customer_id, COUNT(txn_id) AS high_value_transaction_count
              FROM transactions
              WHERE amount >= :min_amount AND status = 'success'
              GROUP BY customer_id
              HAVING COUNT(txn_id) >= :min_count
              ORDER BY high_value_transaction_count DESC
              LIMIT :limit",
        params: &[int("min_amount", 95_000), int("min_count", 5), int("limit", 5)],
    },
    CatalogEntry {
        id: "loan_averages_by_type",
        label: "Average loan amount and interest rate by loan type",
        sql: "SELECT Loan_Type, AVG(Loan_Amount) AS avg_loan_amount,
                     AVG(Interest_Rate) AS avg_interest_rate
              FROM loans
              GROUP BY Loan_Type
              ORDER BY avg_loan_amount DESC",
        params: &[],
    },
    CatalogEntry {
        id: "customers_multiple_active_loans",
        label: "Customers holding more than one active loan",
        sql: "SELECT Customer_ID, COUNT(*) AS active_loans
              FROM loans
              WHERE Loan_Status IN ('Active', 'Approved')
              GROUP BY Customer_ID
              HAVING COUNT(*) > 1
              ORDER BY active_loans DESC
              LIMIT :limit",
        params: &[int("limit", 5)],
    },
    CatalogEntry {
        id: "top_outstanding_loans",
        label: "Customers with the highest outstanding loan amount",
        sql: "SELECT Customer_ID, SUM(Loan_Amount) AS total_outstanding
              FROM loans
              WHERE Loan_Status != 'Closed'
              GROUP BY Customer_ID
              ORDER BY total_outstanding DESC
              LIMIT :limit",
        params: &[int("limit", 5)],
    },
    CatalogEntry {
        id: "branch_total_balance",
        label: "Branches with the highest account balance",
        sql: "SELECT b.Branch_Name, SUM(a.account_balance) AS total_balance
              FROM accounts a
              JOIN customers c ON a.customer_id = c.customer_id
              JOIN branches b ON c.city = b.City
              GROUP BY b.Branch_Name
              ORDER BY total_balance DESC
              LIMIT :limit",
        params: &[int("limit", 5)],
    },
    CatalogEntry {
        id: "branch_performance",
        label: "Branch performance (customers, loans, transactions)",
        sql: "SELECT b.Branch_Name,
                     COUNT(DISTINCT c.customer_id) AS total_customers,
                     COUNT(DISTINCT l.Loan_ID) AS total_loans,
                     SUM(t.amount) AS total_transaction_volume
              FROM branches b
              LEFT JOIN customers c ON c.city = b.City
              LEFT JOIN loans l ON l.Branch = b.Branch_Name
              LEFT JOIN transactions t ON t.customer_id = c.customer_id
              GROUP BY b.Branch_Name",
        params: &[],
    },
    CatalogEntry {
        id: "slowest_issue_categories",
        label: "Issue categories with the longest resolution time",
        sql: "SELECT issue_category,
                     AVG(JULIANDAY(date_closed) - JULIANDAY(date_opened)) AS avg_resolution_days
              FROM support_tickets
              WHERE date_opened IS NOT NULL
              GROUP BY issue_category
              ORDER BY avg_resolution_days DESC",
        params: &[],
    },
    CatalogEntry {
        id: "agents_critical_high_rating",
        label: "Agents resolving the most critical tickets with a high rating",
        sql: "SELECT Support_Agent, COUNT(*) AS resolved_critical_high_rating
              FROM support_tickets
              WHERE priority = 'Critical'
                AND Customer_Rating >= :min_rating
                AND status = 'Resolved'
              GROUP BY Support_Agent
              ORDER BY resolved_critical_high_rating DESC",
        params: &[int("min_rating", 4)],
    },
    CatalogEntry {
        id: "customers_per_city",
        label: "How many customers exist in each city?",
        sql: "SELECT city, COUNT(*) AS total_customers
              FROM customers
              GROUP BY city",
        params: &[],
    },
    CatalogEntry {
        id: "avg_balance_by_account_type",
        label: "What is the average account balance by account type?",
        sql: "SELECT account_type, AVG(account_balance) AS avg_balance
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              GROUP BY account_type",
        params: &[],
    },
    CatalogEntry {
        id: "top_customer_names_by_balance",
        label: "Who are the top customers by total account balance?",
        sql: "SELECT c.name, SUM(a.account_balance) AS total_balance
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              GROUP BY c.customer_id
              ORDER BY total_balance DESC
              LIMIT :limit",
        params: &[int("limit", 10)],
    },
    CatalogEntry {
        id: "joined_in_year_balances",
        label: "Which customers opened accounts in a given year with a high balance?",
        sql: "SELECT c.customer_id, c.name, a.account_balance
              FROM customers c
              JOIN accounts a ON c.customer_id = a.customer_id
              WHERE strftime('%Y', c.join_date) = :year
                AND a.account_balance > :min_balance",
        params: &[text("year", "2023"), int("min_balance", 100_000)],
    },
    CatalogEntry {
        id: "transaction_volume_totals",
        label: "Transaction volume totals per transaction type",
        sql: "SELECT txn_type, SUM(amount) AS total_volume
              FROM transactions
              GROUP BY txn_type",
        params: &[],
    },
    CatalogEntry {
        id: "agents_resolved_critical",
        label: "Support agents who resolved the most critical tickets with a high rating",
        sql: "SELECT support_agent, COUNT(*) AS resolved_tickets
              FROM support_tickets
              WHERE priority = 'Critical'
                AND customer_rating >= :min_rating
                AND status = 'Resolved'
              GROUP BY support_agent
              ORDER BY resolved_tickets DESC",
        params: &[int("min_rating", 4)],
    },
    CatalogEntry {
        id: "stale_accounts",
        label: "Accounts whose balance has not been updated recently",
        sql: "SELECT *
              FROM accounts
              WHERE last_updated < DATE('now', :window)",
        params: &[text("window", "-30 days")],
    },
    CatalogEntry {
        id: "avg_age_by_account_type",
        label: "Average customer age for each account type",
        sql: "SELECT account_type, AVG(age) AS avg_age
              FROM customers
              GROUP BY account_type",
        params: &[],
    },
    CatalogEntry {
        id: "weekend_transactions",
        label: "How many transactions happened on weekends",
        sql: "SELECT COUNT(*) AS weekend_transactions
              FROM transactions
              WHERE strftime('%w', txn_time) IN ('0', '6')",
        params: &[],
    },
    CatalogEntry {
        id: "large_transaction_customers",
        label: "Customers who made at least one large transaction",
        sql: "SELECT DISTINCT customer_id
              FROM transactions
              WHERE amount > :min_amount",
        params: &[int("min_amount", 50_000)],
    },
    CatalogEntry {
        id: "failed_transactions_per_customer",
        label: "Total number of failed transactions per customer",
        sql: "SELECT customer_id, COUNT(*) AS failed_count
              FROM transactions
              WHERE status = 'failed'
              GROUP BY customer_id",
        params: &[],
    },
    CatalogEntry {
        id: "earliest_customers",
        label: "Earliest registered customers",
        sql: "SELECT *
              FROM customers
              ORDER BY join_date
              LIMIT :limit",
        params: &[int("limit", 10)],
    },
    CatalogEntry {
        id: "crowded_cities",
        label: "Cities shared by more than a few customers",
        sql: "SELECT city, COUNT(*) AS num_customers
              FROM customers
              GROUP BY city
              HAVING num_customers > :min_customers",
        params: &[int("min_customers", 2)],
    },
    CatalogEntry {
        id: "transactions_by_status",
        label: "Count of transactions by status (success/failed)",
        sql: "SELECT status, COUNT(*) AS count
              FROM transactions
              GROUP BY status",
        params: &[],
    },
    CatalogEntry {
        id: "customers_by_name_prefix",
        label: "Customers whose name starts with a given prefix",
        sql: "SELECT *
              FROM customers
              WHERE name LIKE :prefix || '%'",
        params: &[text("prefix", "A")],
    },
];

/// Immutable, ordered catalog of insight queries
#[derive(Debug, Clone, Copy)]
pub struct QueryCatalog {
    entries: &'static [CatalogEntry],
}

impl Default for QueryCatalog {
    fn default() -> Self {
        QueryCatalog::builtin()
    }
}

impl QueryCatalog {
    /// The banking insight queries, in display order
    pub fn builtin() -> Self {
        QueryCatalog { entries: ENTRIES }
    }

    /// Finds an entry by id
    ///
    /// # Errors
    ///
    /// `BankslightError::NotFound` for an unknown id.
    pub fn lookup(&self, id: &str) -> Result<&'static CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| BankslightError::NotFound(format!("unknown catalog query '{}'", id)))
    }

    /// `(id, label)` pairs in declaration order
    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        self.entries.iter().map(|e| (e.id, e.label)).collect()
    }

    pub fn entries(&self) -> &'static [CatalogEntry] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CatalogEntry {
    /// Parses a textual override into the type of the parameter's default
    ///
    /// # Errors
    ///
    /// `BankslightError::Query` for an undeclared parameter or a value that
    /// does not parse as an integer where one is expected.
    pub fn parse_override(&self, name: &str, raw: &str) -> Result<(String, Value)> {
        let bare = name.trim_start_matches(':');
        let param = self
            .params
            .iter()
            .find(|p| p.name == bare)
            .ok_or_else(|| BankslightError::Query(format!("query '{}' has no parameter '{}'", self.id, bare)))?;

        let value = match param.default {
            ParamDefault::Integer(_) => raw.trim().parse::<i64>().map(Value::Integer).map_err(|_| {
                BankslightError::Query(format!("parameter '{}' expects an integer, got '{}'", bare, raw))
            })?,
            ParamDefault::Text(_) => Value::Text(raw.to_string()),
        };
        Ok((bare.to_string(), value))
    }

    /// Named parameters for this entry: defaults, with `overrides` applied
    ///
    /// Override names may carry a leading `:`.
    ///
    /// # Errors
    ///
    /// `BankslightError::Query` if an override names a parameter the entry
    /// does not declare.
    ///
    /// ```
    /// use bankslight::{Params, QueryCatalog, Value};
    ///
    /// let entry = QueryCatalog::builtin().lookup("top_customers_by_balance").unwrap();
    /// let params = entry.bind(&[("limit".to_string(), Value::Integer(2))]).unwrap();
    /// assert_eq!(params, Params::Named(vec![(":limit".to_string(), Value::Integer(2))]));
    /// ```
    pub fn bind(&self, overrides: &[(String, Value)]) -> Result<Params> {
        for (name, _) in overrides {
            let bare = name.trim_start_matches(':');
            if !self.params.iter().any(|p| p.name == bare) {
                return Err(BankslightError::Query(format!(
                    "query '{}' has no parameter '{}'",
                    self.id, bare
                )));
            }
        }

        if self.params.is_empty() {
            return Ok(Params::None);
        }

        let pairs = self.params.iter().map(|param| {
            let value = overrides
                .iter()
                .rev()
                .find(|(name, _)| name.trim_start_matches(':') == param.name)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| param.default.into());
            (param.name, value)
        });
        Ok(Params::named(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entry_has_a_statement() {
        let catalog = QueryCatalog::builtin();
        assert_eq!(catalog.len(), 30);
        for (id, _) in catalog.list() {
            let entry = catalog.lookup(id).unwrap();
            assert!(!entry.sql.trim().is_empty(), "{} has an empty statement", id);
            assert!(!entry.label.trim().is_empty(), "{} has an empty label", id);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let catalog = QueryCatalog::builtin();
        let ids: HashSet<_> = catalog.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_declared_params_match_placeholders() {
        for entry in QueryCatalog::builtin().entries() {
            for param in entry.params {
                assert!(
                    entry.sql.contains(&format!(":{}", param.name)),
                    "{} declares unused parameter {}",
                    entry.id,
                    param.name
                );
            }
        }
    }

    #[test]
    fn test_lookup_unknown_id() {
        let catalog = QueryCatalog::builtin();
        match catalog.lookup("drop_everything") {
            Err(BankslightError::NotFound(msg)) => assert!(msg.contains("drop_everything")),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_preserves_declaration_order() {
        let list = QueryCatalog::builtin().list();
        assert_eq!(list[0].0, "customers_per_city_avg_balance");
        assert_eq!(list[4].0, "transaction_volume_by_type");
        assert_eq!(list[4].1, "Total transaction volume by transaction type");
        assert_eq!(list[29].0, "customers_by_name_prefix");
    }

    #[test]
    fn test_bind_uses_defaults() {
        let entry = QueryCatalog::builtin().lookup("joined_in_year_high_balance").unwrap();
        let params = entry.bind(&[]).unwrap();
        assert_eq!(
            params,
            Params::Named(vec![
                (":year".to_string(), Value::from("2023")),
                (":min_balance".to_string(), Value::Integer(100_000)),
                (":limit".to_string(), Value::Integer(5)),
            ])
        );
    }

    #[test]
    fn test_bind_applies_overrides() {
        let entry = QueryCatalog::builtin().lookup("top_customers_by_balance").unwrap();
        let params = entry
            .bind(&[(":limit".to_string(), Value::Integer(3))])
            .unwrap();
        assert_eq!(params, Params::Named(vec![(":limit".to_string(), Value::Integer(3))]));
    }

    #[test]
    fn test_bind_rejects_unknown_override() {
        let entry = QueryCatalog::builtin().lookup("transaction_volume_by_type").unwrap();
        assert_eq!(entry.bind(&[]).unwrap(), Params::None);

        let result = entry.bind(&[("limit".to_string(), Value::Integer(1))]);
        assert!(matches!(result, Err(BankslightError::Query(_))));
    }

    #[test]
    fn test_parse_override_follows_default_type() {
        let entry = QueryCatalog::builtin().lookup("joined_in_year_high_balance").unwrap();

        assert_eq!(
            entry.parse_override("year", "2024").unwrap(),
            ("year".to_string(), Value::from("2024"))
        );
        assert_eq!(
            entry.parse_override(":limit", " 7").unwrap(),
            ("limit".to_string(), Value::Integer(7))
        );
        assert!(matches!(entry.parse_override("limit", "seven"), Err(BankslightError::Query(_))));
        assert!(matches!(entry.parse_override("window", "-1 day"), Err(BankslightError::Query(_))));
    }
}
