//! # Test Utilities Module
//!
//! Fixtures that stand in for the external seeding process: they create the
//! banking schema in an in-memory store and fill it with a small, fixed data
//! set whose aggregates the tests can reason about.

use crate::core::db::ConnectionManager;
use crate::core::{BankslightError, Result};
use rusqlite::Connection;

/// Number of customers inserted by [`populate_sample_data`]
pub const SAMPLE_CUSTOMER_COUNT: usize = 6;

/// The banking schema as the seeding process lays it out
pub const BANK_SCHEMA: &str = "
    CREATE TABLE customers (
        customer_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        gender TEXT,
        age INTEGER,
        city TEXT,
        account_type TEXT,
        join_date DATE
    );

    CREATE TABLE accounts (
        account_id TEXT PRIMARY KEY,
        customer_id TEXT REFERENCES customers (customer_id),
        account_balance REAL,
        last_updated DATETIME
    );

    CREATE TABLE transactions (
        txn_id TEXT PRIMARY KEY,
        customer_id TEXT REFERENCES customers (customer_id),
        txn_type TEXT,
        amount REAL,
        status TEXT,
        txn_time DATETIME
    );

    CREATE TABLE loans (
        Loan_ID INTEGER PRIMARY KEY,
        Customer_ID TEXT REFERENCES customers (customer_id),
        Loan_Type TEXT,
        Loan_Amount REAL,
        Interest_Rate REAL,
        Loan_Status TEXT,
        Branch TEXT
    );

    CREATE TABLE credit_cards (
        Card_ID INTEGER PRIMARY KEY,
        Customer_ID TEXT REFERENCES customers (customer_id),
        Card_Type TEXT,
        Card_Network TEXT,
        Credit_Limit REAL,
        Amount_Spent REAL,
        Status TEXT
    );

    CREATE TABLE branches (
        Branch_ID INTEGER PRIMARY KEY,
        Branch_Name TEXT,
        City TEXT,
        Manager_Name TEXT
    );

    CREATE TABLE support_tickets (
        Ticket_ID TEXT PRIMARY KEY,
        Customer_ID TEXT REFERENCES customers (customer_id),
        Issue_Category TEXT,
        Date_Opened DATE,
        Date_Closed DATE,
        Priority TEXT,
        Status TEXT,
        Support_Agent TEXT,
        Customer_Rating INTEGER
    );
";

/// Tables created by [`BANK_SCHEMA`], in name order
pub const BANK_TABLES: [&str; 7] = [
    "accounts",
    "branches",
    "credit_cards",
    "customers",
    "loans",
    "support_tickets",
    "transactions",
];

/// Creates the banking schema on `conn`
pub fn create_bank_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(BANK_SCHEMA)
}

/// Inserts the sample data set
///
/// Transaction volume by type: deposit 150000, withdrawal 30500, transfer 15000.
/// One transfer is dated ten days before the current date.
pub fn populate_sample_data(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        INSERT INTO customers VALUES ('C001', 'Aarav Shah', 'M', 29, 'Mumbai', 'Savings', '2023-01-15');
        INSERT INTO customers VALUES ('C002', 'Anika Rao', 'F', 41, 'Mumbai', 'Current', '2022-07-03');
        INSERT INTO customers VALUES ('C003', 'Kabir Singh', 'M', 35, 'Delhi', 'Savings', '2023-05-20');
        INSERT INTO customers VALUES ('C004', 'Diya Menon', 'F', 52, 'Mumbai', 'Savings', '2021-11-30');
        INSERT INTO customers VALUES ('C005', 'Rohan Das', 'M', 23, 'Kolkata', 'Current', '2024-02-11');
        INSERT INTO customers VALUES ('C006', 'Ishita Jain', 'F', 38, 'Delhi', 'Savings', '2023-09-09');

        INSERT INTO accounts VALUES ('A001', 'C001', 150000.0, '2024-01-01 10:00:00');
        INSERT INTO accounts VALUES ('A002', 'C001', 25000.0, '2024-03-01 09:30:00');
        INSERT INTO accounts VALUES ('A003', 'C002', 80000.0, '2023-12-12 12:00:00');
        INSERT INTO accounts VALUES ('A004', 'C003', 220000.0, '2024-02-20 15:45:00');
        INSERT INTO accounts VALUES ('A005', 'C004', 5000.0, '2023-06-01 08:00:00');
        INSERT INTO accounts VALUES ('A006', 'C005', 60000.0, '2024-04-04 11:11:00');
        INSERT INTO accounts VALUES ('A007', 'C006', 99000.0, '2024-01-20 16:20:00');

        INSERT INTO transactions VALUES ('T001', 'C001', 'deposit', 100000.0, 'success', '2024-01-06 10:00:00');
        INSERT INTO transactions VALUES ('T002', 'C001', 'deposit', 50000.0, 'success', '2024-01-07 11:00:00');
        INSERT INTO transactions VALUES ('T003', 'C002', 'withdrawal', 30000.0, 'success', '2024-01-08 12:00:00');
        INSERT INTO transactions VALUES ('T004', 'C003', 'transfer', 12000.0, 'success', '2024-01-09 13:00:00');
        INSERT INTO transactions VALUES ('T005', 'C004', 'withdrawal', 200.0, 'failed', '2024-02-01 09:00:00');
        INSERT INTO transactions VALUES ('T006', 'C004', 'withdrawal', 100.0, 'failed', '2024-02-02 09:00:00');
        INSERT INTO transactions VALUES ('T007', 'C004', 'withdrawal', 200.0, 'failed', '2024-02-03 09:00:00');
        INSERT INTO transactions VALUES ('T008', 'C001', 'transfer', 3000.0, 'success', datetime('now', '-10 days'));

        INSERT INTO loans VALUES (1, 'C001', 'Home', 2500000.0, 8.5, 'Active', 'Mumbai Main');
        INSERT INTO loans VALUES (2, 'C001', 'Auto', 600000.0, 9.2, 'Approved', 'Mumbai Main');
        INSERT INTO loans VALUES (3, 'C003', 'Personal', 200000.0, 12.0, 'Closed', 'Delhi Central');
        INSERT INTO loans VALUES (4, 'C006', 'Education', 400000.0, 7.1, 'Active', 'Delhi Central');

        INSERT INTO credit_cards VALUES (1, 'C001', 'Platinum', 'Visa', 300000.0, 45000.0, 'Active');
        INSERT INTO credit_cards VALUES (2, 'C002', 'Gold', 'Mastercard', 150000.0, 12000.0, 'Active');
        INSERT INTO credit_cards VALUES (3, 'C005', 'Classic', 'RuPay', 50000.0, 49000.0, 'Blocked');

        INSERT INTO branches VALUES (1, 'Mumbai Main', 'Mumbai', 'S. Kulkarni');
        INSERT INTO branches VALUES (2, 'Delhi Central', 'Delhi', 'R. Mehta');
        INSERT INTO branches VALUES (3, 'Kolkata East', 'Kolkata', 'P. Bose');

        INSERT INTO support_tickets VALUES ('K001', 'C001', 'Card Block', '2024-01-01', '2024-01-03', 'Critical', 'Resolved', 'Neha', 5);
        INSERT INTO support_tickets VALUES ('K002', 'C002', 'Loan Query', '2024-01-05', '2024-01-15', 'Low', 'Resolved', 'Arjun', 3);
        INSERT INTO support_tickets VALUES ('K003', 'C003', 'Card Block', '2024-02-01', '2024-02-02', 'Critical', 'Resolved', 'Neha', 4);
        INSERT INTO support_tickets VALUES ('K004', 'C005', 'Net Banking', '2024-03-01', NULL, 'High', 'Open', 'Arjun', NULL);
        ",
    )
}

/// Isolated in-memory banking store
pub struct BankFixture {
    pub name: String,
    pub manager: ConnectionManager,
}

impl BankFixture {
    /// Schema only, no rows
    pub fn new(name: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BankslightError::Connection(e.to_string()))?;
        create_bank_schema(&conn).map_err(|e| BankslightError::Query(e.to_string()))?;

        Ok(BankFixture {
            name: name.to_string(),
            manager: ConnectionManager::from_connection(conn)?,
        })
    }

    /// Schema plus the sample data set
    pub fn with_sample_data(name: &str) -> Result<Self> {
        let fixture = Self::new(name)?;
        {
            let conn = fixture.manager.acquire()?;
            populate_sample_data(&conn).map_err(|e| BankslightError::Query(e.to_string()))?;
        }
        Ok(fixture)
    }
}
