mod customer;
mod invoice;
mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use customer::{Customer, CustomerStore};
pub use invoice::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceStore, NewInvoice, NewInvoiceItem, add_days,
};
pub use token::RefreshTokenStore;
pub use user::{Address, NewUser, User, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table. invoice_counter numbers invoices per user.
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    address_line1 TEXT NOT NULL,
                    address_line2 TEXT,
                    city TEXT NOT NULL,
                    county TEXT,
                    postcode TEXT NOT NULL,
                    invoice_counter INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_email ON users(email)",
                // Currently-valid refresh tokens. A user may hold several
                // (one per device/session). Presence in this table is the
                // revocation point for otherwise stateless-verifiable JWTs.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT UNIQUE NOT NULL,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_token ON refresh_tokens(token)",
                // Customers
                "CREATE TABLE customers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    address_line1 TEXT NOT NULL,
                    address_line2 TEXT,
                    city TEXT NOT NULL,
                    county TEXT,
                    postcode TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_customers_uuid ON customers(uuid)",
                "CREATE INDEX idx_customers_user_id ON customers(user_id)",
                // Invoices. Totals and due dates are computed, never stored.
                "CREATE TABLE invoices (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
                    invoice_number INTEGER NOT NULL,
                    status TEXT NOT NULL DEFAULT 'draft',
                    date TEXT,
                    payment_terms INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_invoices_uuid ON invoices(uuid)",
                "CREATE INDEX idx_invoices_user_id ON invoices(user_id)",
                "CREATE INDEX idx_invoices_customer_id ON invoices(customer_id)",
                // Invoice line items. Amounts are stored in minor units (pence).
                "CREATE TABLE invoice_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    invoice_id INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
                    quantity INTEGER NOT NULL DEFAULT 0,
                    description TEXT NOT NULL DEFAULT '',
                    amount INTEGER NOT NULL DEFAULT 0
                )",
                "CREATE INDEX idx_invoice_items_invoice_id ON invoice_items(invoice_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the customer store.
    pub fn customers(&self) -> CustomerStore {
        CustomerStore::new(self.pool.clone())
    }

    /// Get the invoice store.
    pub fn invoices(&self) -> InvoiceStore {
        InvoiceStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(email: &str) -> NewUser {
        NewUser {
            uuid: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: "Alice".to_string(),
            password_hash: "$2b$04$fakehashfortests".to_string(),
            address: Address {
                line1: "1 High Street".to_string(),
                line2: None,
                city: "Bristol".to_string(),
                county: None,
                postcode: "BS1 1AA".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.users().create(&test_user("alice@example.com")).await.unwrap();

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "Alice");
        assert_eq!(user.invoice_counter, 0);

        let user = db.users().get_by_uuid(&user.uuid).await.unwrap().unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create(&test_user("alice@example.com")).await.unwrap();

        let user = db.users().get_by_email("Alice@Example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create(&test_user("alice@example.com")).await.unwrap();
        let result = db.users().create(&test_user("alice@example.com")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invoice_counter_increments() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.users().create(&test_user("alice@example.com")).await.unwrap();

        assert_eq!(db.users().next_invoice_number(id).await.unwrap(), 1);
        assert_eq!(db.users().next_invoice_number(id).await.unwrap(), 2);
        assert_eq!(db.users().next_invoice_number(id).await.unwrap(), 3);

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.invoice_counter, 3);
    }
}
