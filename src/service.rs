//! BankService facade
//!
//! The narrow interface presentation layers call. A `BankService` owns the
//! connection manager and the catalog and lends them to short-lived executor
//! and mutation components per call.

use crate::catalog::QueryCatalog;
use crate::charts::{self, ChartData, ChartKind};
use crate::config::{Config, StoreConfig};
use crate::core::db::{
    describe_table, list_tables, quote_identifier, CallOptions, Column, ConnectionManager, Params,
    QueryExecutor,
};
use crate::core::{BankslightError, Result};
use crate::customers::{CustomerFilter, CustomerService, MutationResult, NewCustomer};
use crate::table::{Table, Value};
use rusqlite::Connection;
use tracing::{debug, info};

pub struct BankService {
    connections: ConnectionManager,
    catalog: QueryCatalog,
    defaults: CallOptions,
}

impl BankService {
    /// Service over the configured store. Nothing is opened until first use.
    pub fn from_config(config: &Config) -> Self {
        let defaults = match config.query_timeout() {
            Some(timeout) => CallOptions::default().with_timeout(timeout),
            None => CallOptions::default(),
        };
        BankService {
            connections: ConnectionManager::new(config.store.clone()),
            catalog: QueryCatalog::builtin(),
            defaults,
        }
    }

    /// Service over `store` with unbounded calls
    pub fn new(store: StoreConfig) -> Self {
        BankService {
            connections: ConnectionManager::new(store),
            catalog: QueryCatalog::builtin(),
            defaults: CallOptions::default(),
        }
    }

    /// Service over an already-open connection
    pub fn from_connection(connection: Connection) -> Result<Self> {
        Ok(BankService {
            connections: ConnectionManager::from_connection(connection)?,
            catalog: QueryCatalog::builtin(),
            defaults: CallOptions::default(),
        })
    }

    /// Replaces the options applied to every facade call
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn call_options(&self) -> &CallOptions {
        &self.defaults
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Executor for callers that need their own per-call options
    pub fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.connections)
    }

    /// Mutation service for callers that need their own per-call options
    pub fn customers(&self) -> CustomerService<'_> {
        CustomerService::new(&self.connections)
    }

    /// `(id, label)` for every catalog entry, in display order
    pub fn list_queries(&self) -> Vec<(&'static str, &'static str)> {
        self.catalog.list()
    }

    /// Runs a catalog entry with its default parameters
    pub fn run_catalog_query(&self, id: &str) -> Result<Table> {
        self.run_catalog_query_with(id, &[])
    }

    /// Runs a catalog entry with `overrides` applied over its defaults
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Query` for an undeclared override or a
    /// failing statement.
    pub fn run_catalog_query_with(&self, id: &str, overrides: &[(String, Value)]) -> Result<Table> {
        let entry = self.catalog.lookup(id)?;
        let params = entry.bind(overrides)?;
        info!("Running catalog query {}", entry.id);
        self.executor().run_with(entry.sql, &params, &self.defaults)
    }

    /// Runs a caller-supplied read statement
    pub fn run_ad_hoc_query(&self, sql: &str, params: &Params) -> Result<Table> {
        debug!("Running ad-hoc query");
        self.executor().run_with(sql, params, &self.defaults)
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.connections.acquire()?;
        list_tables(&conn)
    }

    /// Every row of a store table
    ///
    /// # Errors
    ///
    /// `NotFound` unless `name` is one of [`BankService::list_tables`].
    pub fn fetch_table(&self, name: &str) -> Result<Table> {
        if !self.list_tables()?.iter().any(|t| t == name) {
            return Err(BankslightError::NotFound(format!("unknown table '{}'", name)));
        }
        let sql = format!("SELECT * FROM {}", quote_identifier(name));
        self.executor().run_with(&sql, &Params::None, &self.defaults)
    }

    pub fn describe_table(&self, name: &str) -> Result<Vec<Column>> {
        let conn = self.connections.acquire()?;
        describe_table(&conn, name)
    }

    pub fn create_customer(&self, customer: &NewCustomer) -> Result<MutationResult> {
        self.customers().create(customer, &self.defaults)
    }

    pub fn read_customers(&self, filter: &CustomerFilter) -> Result<Table> {
        self.customers().read(filter, &self.defaults)
    }

    pub fn update_customer_city(&self, customer_id: &str, new_city: &str) -> Result<MutationResult> {
        self.customers().update_city(customer_id, new_city, &self.defaults)
    }

    pub fn delete_customer(&self, customer_id: &str) -> Result<MutationResult> {
        self.customers().delete(customer_id, &self.defaults)
    }

    pub fn chart_data(&self, kind: ChartKind) -> Result<ChartData> {
        charts::load(&self.connections, kind, &self.defaults)
    }

    /// Closes the store handle. A later call reopens it.
    pub fn shutdown(&mut self) -> Result<()> {
        self.connections.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::CancelToken;
    use crate::test_utils::{BankFixture, BANK_TABLES};

    fn sample_service() -> BankService {
        let conn = Connection::open_in_memory().unwrap();
        crate::test_utils::create_bank_schema(&conn).unwrap();
        crate::test_utils::populate_sample_data(&conn).unwrap();
        BankService::from_connection(conn).unwrap()
    }

    #[test]
    fn test_transaction_volume_example() {
        let conn = Connection::open_in_memory().unwrap();
        crate::test_utils::create_bank_schema(&conn).unwrap();
        conn.execute_batch(
            "
            INSERT INTO transactions VALUES ('T1', 'C1', 'deposit', 100, 'success', '2024-01-01');
            INSERT INTO transactions VALUES ('T2', 'C1', 'deposit', 50, 'success', '2024-01-02');
            INSERT INTO transactions VALUES ('T3', 'C2', 'withdrawal', 30, 'success', '2024-01-03');
        ",
        )
        .unwrap();
        let service = BankService::from_connection(conn).unwrap();

        let table = service.run_catalog_query("transaction_volume_by_type").unwrap();
        assert_eq!(table.columns, vec!["txn_type", "total"]);
        assert_eq!(
            table.rows,
            vec![
                vec![Value::from("deposit"), Value::Real(150.0)],
                vec![Value::from("withdrawal"), Value::Real(30.0)],
            ]
        );
    }

    #[test]
    fn test_every_catalog_query_runs() {
        let service = sample_service();
        for (id, _) in service.list_queries() {
            let first = service
                .run_catalog_query(id)
                .unwrap_or_else(|e| panic!("{} failed: {}", id, e));
            let second = service.run_catalog_query(id).unwrap();
            assert_eq!(first, second, "{} is not idempotent", id);
            assert!(!first.columns.is_empty(), "{} has no columns", id);
        }
    }

    #[test]
    fn test_catalog_overrides() {
        let service = sample_service();

        let all = service
            .run_catalog_query_with("large_transaction_customers", &[("min_amount".to_string(), Value::Integer(0))])
            .unwrap();
        assert_eq!(all.row_count(), 4);

        let err = service
            .run_catalog_query_with("large_transaction_customers", &[("year".to_string(), Value::from("2024"))])
            .unwrap_err();
        assert!(matches!(err, BankslightError::Query(_)));
    }

    #[test]
    fn test_unknown_catalog_id() {
        let service = sample_service();
        assert!(matches!(
            service.run_catalog_query("biggest_spenders"),
            Err(BankslightError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_fetch_tables() {
        let service = sample_service();
        assert_eq!(service.list_tables().unwrap(), BANK_TABLES.to_vec());

        let branches = service.fetch_table("branches").unwrap();
        assert_eq!(branches.columns, vec!["Branch_ID", "Branch_Name", "City", "Manager_Name"]);
        assert_eq!(branches.row_count(), 3);
    }

    #[test]
    fn test_fetch_table_rejects_unlisted_names() {
        let service = sample_service();
        for name in ["tickets", "customers; DROP TABLE customers", "sqlite_master"] {
            assert!(
                matches!(service.fetch_table(name), Err(BankslightError::NotFound(_))),
                "{} should be rejected",
                name
            );
        }
        assert_eq!(service.fetch_table("customers").unwrap().row_count(), 6);
    }

    #[test]
    fn test_describe_table() {
        let service = sample_service();
        let columns = service.describe_table("customers").unwrap();
        assert_eq!(columns[0].name, "customer_id");
        assert!(columns[0].pk);
        assert!(matches!(service.describe_table("ledger"), Err(BankslightError::NotFound(_))));
    }

    #[test]
    fn test_customer_lifecycle() {
        let fixture = BankFixture::new("lifecycle").unwrap();
        let service = BankService {
            connections: fixture.manager,
            catalog: QueryCatalog::builtin(),
            defaults: CallOptions::default(),
        };
        let customer = NewCustomer {
            customer_id: "C900".to_string(),
            name: "Meera Iyer".to_string(),
            gender: "F".to_string(),
            age: 31,
            city: "Chennai".to_string(),
            account_type: "Savings".to_string(),
        };

        assert_eq!(service.create_customer(&customer).unwrap().rows_affected, 1);
        assert!(matches!(
            service.create_customer(&customer),
            Err(BankslightError::DuplicateKey(_))
        ));

        assert_eq!(service.update_customer_city("C900", "Pune").unwrap().rows_affected, 1);
        let table = service
            .read_customers(&CustomerFilter::ById("C900".to_string()))
            .unwrap();
        assert_eq!(table.value(0, "city"), Some(&Value::from("Pune")));

        assert_eq!(service.delete_customer("C900").unwrap().rows_affected, 1);
        assert_eq!(service.delete_customer("C900").unwrap().rows_affected, 0);
    }

    #[test]
    fn test_default_call_options_apply() {
        let token = CancelToken::new();
        token.cancel();
        let service = sample_service().with_call_options(CallOptions::default().with_cancel(token));

        assert!(matches!(
            service.run_catalog_query("customers_per_city"),
            Err(BankslightError::Cancelled(_))
        ));
        assert!(matches!(
            service.delete_customer("C001"),
            Err(BankslightError::Cancelled(_))
        ));

        // Components still accept their own options
        let table = service
            .executor()
            .run("SELECT COUNT(*) AS n FROM customers", &Params::None)
            .unwrap();
        assert_eq!(table.value(0, "n"), Some(&Value::Integer(6)));
    }

    #[test]
    fn test_config_timeout_becomes_default() {
        let config = crate::config::parse_config(
            "[store]\npath = \"unused.db\"\n[query]\ntimeout_ms = 250\n",
        )
        .unwrap();
        let service = BankService::from_config(&config);
        assert_eq!(service.call_options().timeout, Some(std::time::Duration::from_millis(250)));
        assert!(!service.connections().is_open());
    }

    #[test]
    fn test_chart_data() {
        let service = sample_service();
        let data = service.chart_data(ChartKind::CustomersByCity).unwrap();
        assert_eq!(data.title, "Customers by City");
        assert_eq!(data.table.row_count(), 3);
    }
}
