//! Invoice storage and date arithmetic.
//!
//! Totals and due dates are derived values: item total is quantity * amount,
//! invoice total is the sum over items, and the due date is the invoice date
//! plus the payment terms in days. None of these are stored.

use sqlx::sqlite::SqlitePool;

/// Invoice lifecycle status. Draft invoices may be partially filled in;
/// pending and paid invoices have all fields validated at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => InvoiceStatus::Pending,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// A line item. Amounts are in minor currency units (pence).
#[derive(Debug, Clone)]
pub struct InvoiceItem {
    pub id: i64,
    pub quantity: i64,
    pub description: String,
    pub amount: i64,
}

impl InvoiceItem {
    /// Line total: quantity * amount, saturating at the i64 range.
    pub fn total(&self) -> i64 {
        self.quantity.saturating_mul(self.amount)
    }
}

#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub customer_id: Option<i64>,
    pub invoice_number: i64,
    pub status: InvoiceStatus,
    /// Invoice date, `YYYY-MM-DD`. Optional while drafting.
    pub date: Option<String>,
    /// Payment terms in days. Optional while drafting.
    pub payment_terms: Option<i64>,
    pub items: Vec<InvoiceItem>,
    pub created_at: String,
}

impl Invoice {
    /// Sum of line totals, saturating at the i64 range.
    pub fn total(&self) -> i64 {
        self.items
            .iter()
            .map(InvoiceItem::total)
            .fold(0, i64::saturating_add)
    }

    /// Due date: invoice date plus payment terms. None while either is unset.
    pub fn due(&self) -> Option<String> {
        let date = self.date.as_deref()?;
        let days = self.payment_terms?;
        add_days(date, days)
    }
}

/// Input for creating or replacing an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: Option<i64>,
    pub status: InvoiceStatus,
    pub date: Option<String>,
    pub payment_terms: Option<i64>,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub quantity: i64,
    pub description: String,
    pub amount: i64,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    uuid: String,
    user_id: i64,
    customer_id: Option<i64>,
    invoice_number: i64,
    status: String,
    date: Option<String>,
    payment_terms: Option<i64>,
    created_at: String,
}

const INVOICE_COLUMNS: &str =
    "id, uuid, user_id, customer_id, invoice_number, status, date, payment_terms, created_at";

pub struct InvoiceStore {
    pool: SqlitePool,
}

impl InvoiceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an invoice with its items in one transaction.
    /// Returns the new invoice's UUID.
    pub async fn create(
        &self,
        user_id: i64,
        invoice_number: i64,
        data: &NewInvoice,
    ) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO invoices (uuid, user_id, customer_id, invoice_number, status, date, payment_terms) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(data.customer_id)
        .bind(invoice_number)
        .bind(data.status.as_str())
        .bind(&data.date)
        .bind(data.payment_terms)
        .execute(&mut *tx)
        .await?;

        let invoice_id = result.last_insert_rowid();
        Self::insert_items(&mut tx, invoice_id, &data.items).await?;
        tx.commit().await?;

        Ok(uuid)
    }

    async fn insert_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        invoice_id: i64,
        items: &[NewInvoiceItem],
    ) -> Result<(), sqlx::Error> {
        for item in items {
            sqlx::query(
                "INSERT INTO invoice_items (invoice_id, quantity, description, amount) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(invoice_id)
            .bind(item.quantity)
            .bind(&item.description)
            .bind(item.amount)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, sqlx::Error> {
        let rows: Vec<(i64, i64, String, i64)> = sqlx::query_as(
            "SELECT id, quantity, description, amount FROM invoice_items \
             WHERE invoice_id = ? ORDER BY id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, quantity, description, amount)| InvoiceItem {
                id,
                quantity,
                description,
                amount,
            })
            .collect())
    }

    async fn hydrate(&self, row: InvoiceRow) -> Result<Invoice, sqlx::Error> {
        let items = self.load_items(row.id).await?;
        Ok(Invoice {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            customer_id: row.customer_id,
            invoice_number: row.invoice_number,
            status: InvoiceStatus::from_str(&row.status),
            date: row.date,
            payment_terms: row.payment_terms,
            items,
            created_at: row.created_at,
        })
    }

    /// List all of a user's invoices, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Invoice>, sqlx::Error> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE user_id = ? ORDER BY invoice_number DESC",
            INVOICE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            invoices.push(self.hydrate(row).await?);
        }
        Ok(invoices)
    }

    /// Get one of a user's invoices by UUID. Another user's invoice is
    /// reported as absent, not as forbidden.
    pub async fn get_for_user(
        &self,
        user_id: i64,
        uuid: &str,
    ) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE user_id = ? AND uuid = ?",
            INVOICE_COLUMNS
        ))
        .bind(user_id)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Replace an invoice's fields and items. The invoice number is kept.
    /// Returns false when the user owns no such invoice.
    pub async fn update_for_user(
        &self,
        user_id: i64,
        uuid: &str,
        data: &NewInvoice,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM invoices WHERE user_id = ? AND uuid = ?")
                .bind(user_id)
                .bind(uuid)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((invoice_id,)) = row else {
            return Ok(false);
        };

        sqlx::query(
            "UPDATE invoices SET customer_id = ?, status = ?, date = ?, payment_terms = ? \
             WHERE id = ?",
        )
        .bind(data.customer_id)
        .bind(data.status.as_str())
        .bind(&data.date)
        .bind(data.payment_terms)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

        // Items are replaced wholesale
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_items(&mut tx, invoice_id, &data.items).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete one of a user's invoices. Returns false when not owned/absent.
    pub async fn delete_for_user(&self, user_id: i64, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invoices WHERE user_id = ? AND uuid = ?")
            .bind(user_id)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- Date arithmetic ---
//
// Calendar conversions from http://howardhinnant.github.io/date_algorithms.html

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

/// Convert year, month, day to days since Unix epoch.
fn ymd_to_days(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year as i64 - 1 } else { year as i64 };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = if month > 2 { month - 3 } else { month + 9 } as i64;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Parse a `YYYY-MM-DD` date string. Rejects dates that do not exist on
/// the calendar (2024-02-31 parses as digits but is not a date).
pub(crate) fn parse_date(s: &str) -> Option<(i32, u32, u32)> {
    let mut parts = s.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    if days_to_ymd(ymd_to_days(year, month, day)) != (year, month, day) {
        return None;
    }
    Some((year, month, day))
}

/// Add a number of days to a `YYYY-MM-DD` date string.
/// Returns None when the input does not parse.
pub fn add_days(date: &str, days: i64) -> Option<String> {
    let (y, m, d) = parse_date(date)?;
    let (y, m, d) = days_to_ymd(ymd_to_days(y, m, d) + days);
    Some(format!("{:04}-{:02}-{:02}", y, m, d))
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
pub(crate) fn timestamp_to_datetime(timestamp: u64) -> String {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}
