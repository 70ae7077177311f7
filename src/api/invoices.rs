//! Invoice CRUD endpoints.
//!
//! Totals and due dates are computed on the way out, never stored. Draft
//! invoices may be arbitrarily incomplete; pending and paid invoices must
//! carry a date, positive payment terms, a customer and at least one line
//! item. Invoice numbers come from the owner's counter at creation and
//! survive updates.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, Json, ResultExt, validate_uuid};
use crate::auth::Auth;
use crate::db::{
    Address, Customer, Database, Invoice, InvoiceStatus, NewInvoice, NewInvoiceItem,
};
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;

#[derive(Clone)]
pub struct InvoicesState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
}

impl_has_auth_backend!(InvoicesState);

pub fn router(state: InvoicesState) -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route(
            "/{uuid}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceRequest {
    status: InvoiceStatus,
    date: Option<String>,
    payment_terms: Option<i64>,
    /// Customer UUID; must belong to the authenticated user.
    customer: Option<String>,
    #[serde(default)]
    items: Vec<ItemRequest>,
}

#[derive(Deserialize)]
struct ItemRequest {
    quantity: i64,
    description: String,
    amount: i64,
}

#[derive(Serialize)]
struct EmbeddedCustomer {
    uuid: String,
    name: String,
    email: String,
    address: Address,
}

impl From<Customer> for EmbeddedCustomer {
    fn from(c: Customer) -> Self {
        Self {
            uuid: c.uuid,
            name: c.name,
            email: c.email,
            address: c.address,
        }
    }
}

#[derive(Serialize)]
struct ItemResponse {
    quantity: i64,
    description: String,
    amount: i64,
    total: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceResponse {
    uuid: String,
    invoice_number: i64,
    status: InvoiceStatus,
    date: Option<String>,
    payment_terms: Option<i64>,
    customer: Option<EmbeddedCustomer>,
    items: Vec<ItemResponse>,
    total: i64,
    due: Option<String>,
}

impl InvoiceResponse {
    fn build(invoice: Invoice, customer: Option<Customer>) -> Self {
        Self {
            total: invoice.total(),
            due: invoice.due(),
            uuid: invoice.uuid,
            invoice_number: invoice.invoice_number,
            status: invoice.status,
            date: invoice.date,
            payment_terms: invoice.payment_terms,
            customer: customer.map(EmbeddedCustomer::from),
            items: invoice
                .items
                .into_iter()
                .map(|item| ItemResponse {
                    total: item.total(),
                    quantity: item.quantity,
                    description: item.description,
                    amount: item.amount,
                })
                .collect(),
        }
    }
}

const MAX_ITEMS: usize = 100;
const MAX_QUANTITY: i64 = 1_000_000;
/// Largest accepted line amount in minor units (ten million pounds).
const MAX_AMOUNT: i64 = 1_000_000_000;
const MAX_PAYMENT_TERMS: i64 = 3650;

fn validate_invoice(payload: &InvoiceRequest) -> Result<(), ApiError> {
    if let Some(date) = &payload.date {
        if crate::db::add_days(date, 0).is_none() {
            return Err(ApiError::bad_request("Invoice date must be YYYY-MM-DD"));
        }
    }
    // Bounds apply to drafts too: anything stored ends up in computed totals
    if payload.items.len() > MAX_ITEMS {
        return Err(ApiError::bad_request("Too many items"));
    }
    for item in &payload.items {
        if item.quantity < 0 || item.quantity > MAX_QUANTITY {
            return Err(ApiError::bad_request("Item quantity is out of range"));
        }
        if item.amount < 0 || item.amount > MAX_AMOUNT {
            return Err(ApiError::bad_request("Item amount is out of range"));
        }
    }

    // Drafts may otherwise be arbitrarily incomplete
    if payload.status == InvoiceStatus::Draft {
        return Ok(());
    }

    if payload.date.is_none() {
        return Err(ApiError::bad_request("Invoice date is required"));
    }
    match payload.payment_terms {
        None => return Err(ApiError::bad_request("Payment terms are required")),
        Some(days) if days < 1 => {
            return Err(ApiError::bad_request("Payment terms must be at least 1 day"));
        }
        Some(days) if days > MAX_PAYMENT_TERMS => {
            return Err(ApiError::bad_request("Payment terms are out of range"));
        }
        Some(_) => {}
    }
    if payload.customer.is_none() {
        return Err(ApiError::bad_request("A customer is required"));
    }
    if payload.items.is_empty() {
        return Err(ApiError::bad_request("At least one item is required"));
    }
    for item in &payload.items {
        if item.quantity < 1 {
            return Err(ApiError::bad_request("Item quantity must be at least 1"));
        }
        if item.description.trim().is_empty() {
            return Err(ApiError::bad_request("Item description cannot be empty"));
        }
    }
    Ok(())
}

/// Resolve the request's customer UUID to an internal id, scoped to the
/// authenticated user.
async fn resolve_customer(
    state: &InvoicesState,
    user_id: i64,
    payload: &InvoiceRequest,
) -> Result<Option<i64>, ApiError> {
    let Some(customer_uuid) = &payload.customer else {
        return Ok(None);
    };
    let customer = state
        .db
        .customers()
        .get_for_user(user_id, customer_uuid)
        .await
        .db_err("Failed to resolve customer")?
        .ok_or_else(|| ApiError::bad_request("Unknown customer"))?;
    Ok(Some(customer.id))
}

async fn to_new_invoice(
    state: &InvoicesState,
    user_id: i64,
    payload: InvoiceRequest,
) -> Result<NewInvoice, ApiError> {
    validate_invoice(&payload)?;
    let customer_id = resolve_customer(state, user_id, &payload).await?;
    Ok(NewInvoice {
        customer_id,
        status: payload.status,
        date: payload.date,
        payment_terms: payload.payment_terms,
        items: payload
            .items
            .into_iter()
            .map(|item| NewInvoiceItem {
                quantity: item.quantity,
                description: item.description,
                amount: item.amount,
            })
            .collect(),
    })
}

async fn respond_with(
    state: &InvoicesState,
    user_id: i64,
    uuid: &str,
) -> Result<InvoiceResponse, ApiError> {
    let invoice = state
        .db
        .invoices()
        .get_for_user(user_id, uuid)
        .await
        .db_err("Failed to load invoice")?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))?;

    let customer = match invoice.customer_id {
        Some(id) => state
            .db
            .customers()
            .get_by_id(id)
            .await
            .db_err("Failed to load invoice customer")?,
        None => None,
    };

    Ok(InvoiceResponse::build(invoice, customer))
}

async fn list_invoices(
    State(state): State<InvoicesState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let invoices = state
        .db
        .invoices()
        .list_by_user(user.id)
        .await
        .db_err("Failed to list invoices")?;

    let mut responses = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let customer = match invoice.customer_id {
            Some(id) => state
                .db
                .customers()
                .get_by_id(id)
                .await
                .db_err("Failed to load invoice customer")?,
            None => None,
        };
        responses.push(InvoiceResponse::build(invoice, customer));
    }
    Ok(Json(responses))
}

async fn create_invoice(
    State(state): State<InvoicesState>,
    Auth(user): Auth,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let data = to_new_invoice(&state, user.id, payload).await?;

    let number = state
        .db
        .users()
        .next_invoice_number(user.id)
        .await
        .db_err("Failed to allocate invoice number")?;
    let uuid = state
        .db
        .invoices()
        .create(user.id, number, &data)
        .await
        .db_err("Failed to create invoice")?;

    let response = respond_with(&state, user.id, &uuid).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_invoice(
    State(state): State<InvoicesState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;
    let response = respond_with(&state, user.id, &uuid).await?;
    Ok(Json(response))
}

async fn update_invoice(
    State(state): State<InvoicesState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;
    let data = to_new_invoice(&state, user.id, payload).await?;

    let updated = state
        .db
        .invoices()
        .update_for_user(user.id, &uuid, &data)
        .await
        .db_err("Failed to update invoice")?;
    if !updated {
        return Err(ApiError::not_found("Invoice not found"));
    }

    let response = respond_with(&state, user.id, &uuid).await?;
    Ok(Json(response))
}

async fn delete_invoice(
    State(state): State<InvoicesState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let deleted = state
        .db
        .invoices()
        .delete_for_user(user.id, &uuid)
        .await
        .db_err("Failed to delete invoice")?;
    if !deleted {
        return Err(ApiError::not_found("Invoice not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
