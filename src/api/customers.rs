//! Customer CRUD endpoints. All routes require a bearer access token and
//! operate only on the authenticated user's customers; another user's
//! customer is indistinguishable from a missing one (404).

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
use crate::db::{Address, Customer, Database};
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;

#[derive(Clone)]
pub struct CustomersState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
}

impl_has_auth_backend!(CustomersState);

pub fn router(state: CustomersState) -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/{uuid}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct CustomerRequest {
    name: String,
    email: String,
    address: Address,
}

#[derive(Serialize)]
struct CustomerResponse {
    uuid: String,
    name: String,
    email: String,
    address: Address,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            uuid: c.uuid,
            name: c.name,
            email: c.email,
            address: c.address,
        }
    }
}

fn validate_customer(payload: &CustomerRequest) -> Result<(), ApiError> {
    let name = payload.name.trim();
    if name.len() < 2 || name.len() > 35 {
        return Err(ApiError::bad_request(
            "Customer name must be between 2 and 35 characters",
        ));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::bad_request("Invalid customer email address"));
    }
    if payload.address.line1.trim().is_empty()
        || payload.address.city.trim().is_empty()
        || payload.address.postcode.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "Address line 1, city and postcode are required",
        ));
    }
    Ok(())
}

async fn list_customers(
    State(state): State<CustomersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let customers = state
        .db
        .customers()
        .list_by_user(user.id)
        .await
        .db_err("Failed to list customers")?;

    let customers: Vec<CustomerResponse> =
        customers.into_iter().map(CustomerResponse::from).collect();
    Ok(Json(customers))
}

async fn create_customer(
    State(state): State<CustomersState>,
    Auth(user): Auth,
    Json(payload): Json<CustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_customer(&payload)?;

    let uuid = state
        .db
        .customers()
        .create(
            user.id,
            payload.name.trim(),
            payload.email.trim(),
            &payload.address,
        )
        .await
        .db_err("Failed to create customer")?;

    let customer = state
        .db
        .customers()
        .get_for_user(user.id, &uuid)
        .await
        .db_err("Failed to load customer")?
        .ok_or_else(|| ApiError::internal("Customer vanished after creation"))?;

    Ok((StatusCode::CREATED, Json(CustomerResponse::from(customer))))
}

async fn get_customer(
    State(state): State<CustomersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let customer = state
        .db
        .customers()
        .get_for_user(user.id, &uuid)
        .await
        .db_err("Failed to get customer")?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

async fn update_customer(
    State(state): State<CustomersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<CustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;
    validate_customer(&payload)?;

    let updated = state
        .db
        .customers()
        .update_for_user(
            user.id,
            &uuid,
            payload.name.trim(),
            payload.email.trim(),
            &payload.address,
        )
        .await
        .db_err("Failed to update customer")?;
    if !updated {
        return Err(ApiError::not_found("Customer not found"));
    }

    let customer = state
        .db
        .customers()
        .get_for_user(user.id, &uuid)
        .await
        .db_err("Failed to load customer")?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

async fn delete_customer(
    State(state): State<CustomersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let deleted = state
        .db
        .customers()
        .delete_for_user(user.id, &uuid)
        .await
        .db_err("Failed to delete customer")?;
    if !deleted {
        return Err(ApiError::not_found("Customer not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
