//! Customer mutations
//!
//! Create, read, update and delete for the `customers` table, the only entity
//! this core writes. Each write is a single auto-committed statement, so a
//! failed call leaves the store untouched. Deleting a customer does not touch
//! dependent accounts, transactions or loans; those rows keep pointing at the
//! removed id.

use crate::core::db::{guarded, is_interrupted, CallOptions, ConnectionManager, Params, QueryExecutor};
use crate::core::{BankslightError, Result};
use crate::table::{Table, Value};
use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};
use rusqlite::{params, ErrorCode};
use serde::Serialize;
use tracing::{info, warn};

pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;

/// Fields supplied by the caller when creating a customer. The join date is
/// always assigned by the store at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub customer_id: String,
    pub name: String,
    pub gender: String,
    pub age: i64,
    pub city: String,
    pub account_type: String,
}

impl NewCustomer {
    pub fn validate(&self) -> Result<()> {
        require_text("customer_id", &self.customer_id)?;
        require_text("name", &self.name)?;
        require_text("gender", &self.gender)?;
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(BankslightError::validation(
                "age",
                format!("must be between {} and {}, got {}", MIN_AGE, MAX_AGE, self.age),
            ));
        }
        require_text("city", &self.city)?;
        require_text("account_type", &self.account_type)?;
        Ok(())
    }
}

fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BankslightError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Which customers a read returns
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CustomerFilter {
    #[default]
    All,
    ById(String),
    ByCity(String),
}

/// Outcome of a write. Zero rows affected means the id matched nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationResult {
    pub rows_affected: usize,
}

impl MutationResult {
    pub fn is_noop(&self) -> bool {
        self.rows_affected == 0
    }
}

/// Customer mutation service bound to a connection manager
pub struct CustomerService<'a> {
    connections: &'a ConnectionManager,
}

impl<'a> CustomerService<'a> {
    pub fn new(connections: &'a ConnectionManager) -> Self {
        CustomerService { connections }
    }

    /// Inserts a customer whose join date is today's date at commit
    ///
    /// # Errors
    ///
    /// `Validation` before any write, `DuplicateKey` when the id exists,
    /// `Cancelled` when interrupted, `Mutation` for any other store failure.
    pub fn create(&self, customer: &NewCustomer, options: &CallOptions) -> Result<MutationResult> {
        customer.validate()?;

        let result = self.write(options, |conn| {
            conn.execute(
                "INSERT INTO customers (customer_id, name, gender, age, city, account_type, join_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, DATE('now'))",
                params![
                    customer.customer_id,
                    customer.name,
                    customer.gender,
                    customer.age,
                    customer.city,
                    customer.account_type,
                ],
            )
        });

        match result {
            Ok(outcome) => {
                info!("Created customer {}", customer.customer_id);
                Ok(outcome)
            }
            Err(WriteFailure::Store(e)) if is_duplicate_key(&e) => {
                warn!("Customer {} already exists", customer.customer_id);
                Err(BankslightError::DuplicateKey(customer.customer_id.clone()))
            }
            Err(failure) => Err(failure.into_error("create customer")),
        }
    }

    /// Reads customers matching `filter`
    pub fn read(&self, filter: &CustomerFilter, options: &CallOptions) -> Result<Table> {
        let executor = QueryExecutor::new(self.connections);
        match filter {
            CustomerFilter::All => executor.run_with("SELECT * FROM customers", &Params::None, options),
            CustomerFilter::ById(id) => executor.run_with(
                "SELECT * FROM customers WHERE customer_id = ?1",
                &Params::positional([Value::from(id.as_str())]),
                options,
            ),
            CustomerFilter::ByCity(city) => executor.run_with(
                "SELECT * FROM customers WHERE city = ?1",
                &Params::positional([Value::from(city.as_str())]),
                options,
            ),
        }
    }

    /// Moves a customer to `new_city`
    ///
    /// An unknown id is not an error; it yields `rows_affected == 0`. A blank
    /// `new_city` fails validation the same way it does on create.
    pub fn update_city(&self, customer_id: &str, new_city: &str, options: &CallOptions) -> Result<MutationResult> {
        require_text("city", new_city)?;

        let outcome = self
            .write(options, |conn| {
                conn.execute(
                    "UPDATE customers SET city = ?1 WHERE customer_id = ?2",
                    params![new_city, customer_id],
                )
            })
            .map_err(|f| f.into_error("update customer"))?;

        if outcome.is_noop() {
            info!("Update matched no customer with id {}", customer_id);
        } else {
            info!("Moved customer {} to {}", customer_id, new_city);
        }
        Ok(outcome)
    }

    /// Removes a customer row; dependent rows are left in place
    ///
    /// An unknown id is not an error; it yields `rows_affected == 0`.
    pub fn delete(&self, customer_id: &str, options: &CallOptions) -> Result<MutationResult> {
        let outcome = self
            .write(options, |conn| {
                conn.execute("DELETE FROM customers WHERE customer_id = ?1", params![customer_id])
            })
            .map_err(|f| f.into_error("delete customer"))?;

        if outcome.is_noop() {
            info!("Delete matched no customer with id {}", customer_id);
        } else {
            info!("Deleted customer {}", customer_id);
        }
        Ok(outcome)
    }

    fn write(
        &self,
        options: &CallOptions,
        statement: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<usize>,
    ) -> std::result::Result<MutationResult, WriteFailure> {
        let conn = self.connections.acquire().map_err(WriteFailure::Core)?;
        let rows_affected = guarded(&conn, options, statement)
            .map_err(WriteFailure::Core)?
            .map_err(WriteFailure::Store)?;
        Ok(MutationResult { rows_affected })
    }
}

enum WriteFailure {
    /// Already classified (connection, cancellation before start)
    Core(BankslightError),
    Store(rusqlite::Error),
}

impl WriteFailure {
    fn into_error(self, action: &str) -> BankslightError {
        match self {
            WriteFailure::Core(e) => e,
            WriteFailure::Store(e) if is_interrupted(&e) => {
                warn!("Failed to {}: interrupted", action);
                BankslightError::Cancelled(e.to_string())
            }
            WriteFailure::Store(e) => {
                warn!("Failed to {}: {}", action, e);
                BankslightError::Mutation(format!("Failed to {}: {}", action, e))
            }
        }
    }
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == SQLITE_CONSTRAINT_UNIQUE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::BankFixture;
    use chrono::Utc;

    fn new_customer(id: &str) -> NewCustomer {
        NewCustomer {
            customer_id: id.to_string(),
            name: "Meera Iyer".to_string(),
            gender: "F".to_string(),
            age: 34,
            city: "Chennai".to_string(),
            account_type: "Savings".to_string(),
        }
    }

    fn count_for(service: &CustomerService, id: &str) -> usize {
        service
            .read(&CustomerFilter::ById(id.to_string()), &CallOptions::default())
            .unwrap()
            .row_count()
    }

    #[test]
    fn test_create_then_read() {
        let fixture = BankFixture::new("create_then_read").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();

        let before = Utc::now().date_naive();
        let outcome = service.create(&new_customer("C900"), &opts).unwrap();
        let after = Utc::now().date_naive();
        assert_eq!(outcome.rows_affected, 1);

        let table = service.read(&CustomerFilter::ById("C900".into()), &opts).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(
            table.columns,
            vec!["customer_id", "name", "gender", "age", "city", "account_type", "join_date"]
        );
        assert_eq!(table.value(0, "customer_id"), Some(&Value::from("C900")));
        assert_eq!(table.value(0, "name"), Some(&Value::from("Meera Iyer")));
        assert_eq!(table.value(0, "gender"), Some(&Value::from("F")));
        assert_eq!(table.value(0, "age"), Some(&Value::Integer(34)));
        assert_eq!(table.value(0, "city"), Some(&Value::from("Chennai")));
        assert_eq!(table.value(0, "account_type"), Some(&Value::from("Savings")));

        // The store's clock may cross midnight between the two readings
        let joined = table.value(0, "join_date").and_then(Value::as_date).unwrap();
        assert!(joined == before || joined == after, "{} not in {}..={}", joined, before, after);
    }

    #[test]
    fn test_create_duplicate_id() {
        let fixture = BankFixture::new("duplicate").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();

        service.create(&new_customer("C901"), &opts).unwrap();

        let mut second = new_customer("C901");
        second.name = "Someone Else".to_string();
        match service.create(&second, &opts) {
            Err(BankslightError::DuplicateKey(id)) => assert_eq!(id, "C901"),
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }

        assert_eq!(count_for(&service, "C901"), 1);
        let table = service.read(&CustomerFilter::ById("C901".into()), &opts).unwrap();
        assert_eq!(table.value(0, "name"), Some(&Value::from("Meera Iyer")));
    }

    #[test]
    fn test_create_validation() {
        let fixture = BankFixture::new("validation").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();

        let cases: Vec<(NewCustomer, &str)> = vec![
            (NewCustomer { customer_id: "  ".into(), ..new_customer("x") }, "customer_id"),
            (NewCustomer { name: "".into(), ..new_customer("C902") }, "name"),
            (NewCustomer { age: 0, ..new_customer("C902") }, "age"),
            (NewCustomer { age: 121, ..new_customer("C902") }, "age"),
            (NewCustomer { city: "".into(), ..new_customer("C902") }, "city"),
            (NewCustomer { account_type: "\t".into(), ..new_customer("C902") }, "account_type"),
        ];

        for (customer, expected_field) in cases {
            match service.create(&customer, &opts) {
                Err(BankslightError::Validation { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("Expected Validation on {}, got {:?}", expected_field, other),
            }
        }
        assert_eq!(count_for(&service, "C902"), 0);

        // Boundaries are inclusive
        service.create(&NewCustomer { age: 1, ..new_customer("C903") }, &opts).unwrap();
        service.create(&NewCustomer { age: 120, ..new_customer("C904") }, &opts).unwrap();
    }

    #[test]
    fn test_update_city() {
        let fixture = BankFixture::new("update").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();
        service.create(&new_customer("C905"), &opts).unwrap();

        let missing = service.update_city("NOPE", "Delhi", &opts).unwrap();
        assert_eq!(missing, MutationResult { rows_affected: 0 });
        assert!(missing.is_noop());

        let updated = service.update_city("C905", "Delhi", &opts).unwrap();
        assert_eq!(updated.rows_affected, 1);

        let table = service.read(&CustomerFilter::ById("C905".into()), &opts).unwrap();
        assert_eq!(table.value(0, "city"), Some(&Value::from("Delhi")));

        let by_city = service.read(&CustomerFilter::ByCity("Delhi".into()), &opts).unwrap();
        assert_eq!(by_city.row_count(), 1);
    }

    #[test]
    fn test_update_requires_city() {
        let fixture = BankFixture::new("update_validation").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let result = service.update_city("C905", " ", &CallOptions::default());
        assert!(matches!(result, Err(BankslightError::Validation { field: "city", .. })));
    }

    #[test]
    fn test_blank_id_matches_nothing() {
        let fixture = BankFixture::with_sample_data("blank_id").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();

        assert_eq!(service.update_city("", "Pune", &opts).unwrap().rows_affected, 0);
        assert_eq!(service.update_city("   ", "Pune", &opts).unwrap().rows_affected, 0);
        assert_eq!(service.delete("", &opts).unwrap().rows_affected, 0);

        let all = service.read(&CustomerFilter::All, &opts).unwrap();
        assert_eq!(all.row_count(), crate::test_utils::SAMPLE_CUSTOMER_COUNT);
        let pune = service.read(&CustomerFilter::ByCity("Pune".into()), &opts).unwrap();
        assert!(pune.is_empty());
    }

    #[test]
    fn test_delete_twice() {
        let fixture = BankFixture::new("delete").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();
        service.create(&new_customer("C906"), &opts).unwrap();

        assert_eq!(service.delete("C906", &opts).unwrap().rows_affected, 1);
        assert_eq!(service.delete("C906", &opts).unwrap().rows_affected, 0);
        assert_eq!(count_for(&service, "C906"), 0);
    }

    #[test]
    fn test_delete_leaves_orphans() {
        let fixture = BankFixture::with_sample_data("orphans").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let opts = CallOptions::default();

        assert_eq!(service.delete("C001", &opts).unwrap().rows_affected, 1);

        let executor = QueryExecutor::new(&fixture.manager);
        let accounts = executor
            .run(
                "SELECT COUNT(*) AS n FROM accounts WHERE customer_id = ?1",
                &Params::positional(["C001"]),
            )
            .unwrap();
        assert!(accounts.value(0, "n").and_then(Value::as_i64).unwrap() > 0);
    }

    #[test]
    fn test_cancelled_write_changes_nothing() {
        let fixture = BankFixture::new("cancelled").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let token = crate::core::db::CancelToken::new();
        token.cancel();

        let result = service.create(&new_customer("C907"), &CallOptions::default().with_cancel(token));
        assert!(matches!(result, Err(BankslightError::Cancelled(_))));
        assert_eq!(count_for(&service, "C907"), 0);
    }

    #[test]
    fn test_write_interrupted_mid_statement_rolls_back() {
        let fixture = BankFixture::with_sample_data("interrupted_write").unwrap();
        {
            let conn = fixture.manager.acquire().unwrap();
            conn.execute_batch(
                "
                CREATE TABLE big (x INTEGER);
                WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 1000)
                INSERT INTO big SELECT x FROM n;
                CREATE TRIGGER slow_update AFTER UPDATE ON customers BEGIN
                    SELECT COUNT(*) FROM big a, big b, big c;
                END;
            ",
            )
            .unwrap();
        }

        let service = CustomerService::new(&fixture.manager);
        let options = CallOptions::default().with_timeout(std::time::Duration::from_millis(100));
        let result = service.update_city("C001", "Pune", &options);
        assert!(matches!(result, Err(BankslightError::Cancelled(_))), "{:?}", result);

        // The row change made before the trigger ran was rolled back
        let table = service
            .read(&CustomerFilter::ById("C001".into()), &CallOptions::default())
            .unwrap();
        assert_eq!(table.value(0, "city"), Some(&Value::from("Mumbai")));
    }

    #[test]
    fn test_read_all() {
        let fixture = BankFixture::with_sample_data("read_all").unwrap();
        let service = CustomerService::new(&fixture.manager);
        let table = service.read(&CustomerFilter::All, &CallOptions::default()).unwrap();
        assert_eq!(table.row_count(), crate::test_utils::SAMPLE_CUSTOMER_COUNT);
    }
}
