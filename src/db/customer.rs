use sqlx::sqlite::SqlitePool;

use super::user::Address;

#[derive(Clone)]
pub struct CustomerStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub address: Address,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    uuid: String,
    user_id: i64,
    name: String,
    email: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    county: Option<String>,
    postcode: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            address: Address {
                line1: row.address_line1,
                line2: row.address_line2,
                city: row.city,
                county: row.county,
                postcode: row.postcode,
            },
        }
    }
}

const CUSTOMER_COLUMNS: &str =
    "id, uuid, user_id, name, email, address_line1, address_line2, city, county, postcode";

impl CustomerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a customer for a user. Returns the new customer's UUID.
    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        email: &str,
        address: &Address,
    ) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO customers (uuid, user_id, name, email, \
             address_line1, address_line2, city, county, postcode) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.county)
        .bind(address.postcode.to_uppercase())
        .execute(&self.pool)
        .await?;
        Ok(uuid)
    }

    /// List all of a user's customers, by name.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Customer>, sqlx::Error> {
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM customers WHERE user_id = ? ORDER BY name",
            CUSTOMER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Get one of a user's customers by UUID. Another user's customer is
    /// reported as absent, not as forbidden.
    pub async fn get_for_user(
        &self,
        user_id: i64,
        uuid: &str,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM customers WHERE user_id = ? AND uuid = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(user_id)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Customer::from))
    }

    /// Get a customer by internal ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Customer>, sqlx::Error> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM customers WHERE id = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Customer::from))
    }

    /// Replace a customer's fields. Returns false when not owned/absent.
    pub async fn update_for_user(
        &self,
        user_id: i64,
        uuid: &str,
        name: &str,
        email: &str,
        address: &Address,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers SET name = ?, email = ?, address_line1 = ?, \
             address_line2 = ?, city = ?, county = ?, postcode = ? \
             WHERE user_id = ? AND uuid = ?",
        )
        .bind(name)
        .bind(email)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.county)
        .bind(address.postcode.to_uppercase())
        .bind(user_id)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete one of a user's customers. Invoices referencing the customer
    /// keep existing with the reference nulled (ON DELETE SET NULL).
    pub async fn delete_for_user(&self, user_id: i64, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE user_id = ? AND uuid = ?")
            .bind(user_id)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Address, Database, NewUser};

    fn address() -> Address {
        Address {
            line1: "1 High Street".to_string(),
            line2: None,
            city: "Bristol".to_string(),
            county: Some("Avon".to_string()),
            postcode: "bs1 1aa".to_string(),
        }
    }

    async fn test_user(db: &Database, email: &str) -> i64 {
        db.users()
            .create(&NewUser {
                uuid: uuid::Uuid::new_v4().to_string(),
                email: email.to_string(),
                name: "Alice".to_string(),
                password_hash: "hash".to_string(),
                address: address(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_crud_and_postcode_uppercasing() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = test_user(&db, "alice@example.com").await;

        let uuid = db
            .customers()
            .create(user_id, "Acme Ltd", "billing@acme.test", &address())
            .await
            .unwrap();

        let customer = db
            .customers()
            .get_for_user(user_id, &uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.name, "Acme Ltd");
        assert_eq!(customer.address.postcode, "BS1 1AA");

        assert!(db
            .customers()
            .update_for_user(user_id, &uuid, "Acme Ltd", "accounts@acme.test", &address())
            .await
            .unwrap());

        let customer = db
            .customers()
            .get_for_user(user_id, &uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.email, "accounts@acme.test");

        assert!(db.customers().delete_for_user(user_id, &uuid).await.unwrap());
        assert!(db
            .customers()
            .get_for_user(user_id, &uuid)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ownership_scoping() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = test_user(&db, "alice@example.com").await;
        let bob = test_user(&db, "bob@example.com").await;

        let uuid = db
            .customers()
            .create(alice, "Acme Ltd", "billing@acme.test", &address())
            .await
            .unwrap();

        assert!(db.customers().get_for_user(bob, &uuid).await.unwrap().is_none());
        assert!(!db.customers().delete_for_user(bob, &uuid).await.unwrap());
        assert_eq!(db.customers().list_by_user(bob).await.unwrap().len(), 0);
    }
}
