//! Customer and invoice CRUD over real HTTP, including ownership scoping
//! and computed invoice fields.

mod common;

use common::*;
use serde_json::{Value, json};

async fn create_customer(server: &TestServer, token: &str, name: &str) -> Value {
    let response = bare_client()
        .post(format!("{}/api/customers", server.base_url))
        .bearer_auth(token)
        .json(&json!({
            "name": name,
            "email": "billing@acme.example",
            "address": {
                "line1": "4 Factory Road",
                "city": "Leeds",
                "postcode": "ls1 4ab"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

fn pending_invoice(customer_uuid: &str) -> Value {
    json!({
        "status": "pending",
        "date": "2024-01-15",
        "paymentTerms": 30,
        "customer": customer_uuid,
        "items": [
            { "quantity": 3, "description": "Design", "amount": 5000 },
            { "quantity": 1, "description": "Hosting", "amount": 1200 }
        ]
    })
}

#[tokio::test]
async fn test_customer_crud() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;

    let customer = create_customer(&server, &token, "Acme Ltd").await;
    let uuid = customer["uuid"].as_str().unwrap();
    assert_eq!(customer["name"], "Acme Ltd");
    // postcodes are normalized to uppercase
    assert_eq!(customer["address"]["postcode"], "LS1 4AB");

    let response = bare_client()
        .put(format!("{}/api/customers/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Acme Holdings",
            "email": "accounts@acme.example",
            "address": { "line1": "4 Factory Road", "city": "Leeds", "postcode": "LS1 4AB" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "Acme Holdings");

    let response = bare_client()
        .get(format!("{}/api/customers", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let list: Vec<Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 1);

    let response = bare_client()
        .delete(format!("{}/api/customers/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = bare_client()
        .get(format!("{}/api/customers/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_customer_name_length_is_validated() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;

    let response = bare_client()
        .post(format!("{}/api/customers", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "A",
            "email": "a@b.example",
            "address": { "line1": "1 Road", "city": "Leeds", "postcode": "LS1 4AB" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_invoice_lifecycle_with_computed_fields() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;
    let customer = create_customer(&server, &token, "Acme Ltd").await;
    let customer_uuid = customer["uuid"].as_str().unwrap();

    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&pending_invoice(customer_uuid))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let invoice: Value = response.json().await.unwrap();

    assert_eq!(invoice["invoiceNumber"], 1);
    assert_eq!(invoice["status"], "pending");
    // total = 3*5000 + 1*1200; due = date + 30 days
    assert_eq!(invoice["total"], 16200);
    assert_eq!(invoice["due"], "2024-02-14");
    assert_eq!(invoice["items"][0]["total"], 15000);
    assert_eq!(invoice["customer"]["name"], "Acme Ltd");

    let uuid = invoice["uuid"].as_str().unwrap();

    // update to paid; the invoice number must survive
    let mut update = pending_invoice(customer_uuid);
    update["status"] = json!("paid");
    let response = bare_client()
        .put(format!("{}/api/invoices/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "paid");
    assert_eq!(updated["invoiceNumber"], 1);

    // a second invoice takes the next number
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&pending_invoice(customer_uuid))
        .send()
        .await
        .unwrap();
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["invoiceNumber"], 2);

    let response = bare_client()
        .delete(format!("{}/api/invoices/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = bare_client()
        .get(format!("{}/api/invoices/{}", server.base_url, uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_draft_may_be_incomplete_but_pending_may_not() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;

    // a bare draft is fine
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "status": "draft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let draft: Value = response.json().await.unwrap();
    assert_eq!(draft["total"], 0);
    assert!(draft["due"].is_null());

    // pending without items, customer or date is rejected
    for body in [
        json!({ "status": "pending" }),
        json!({ "status": "pending", "date": "2024-01-15", "paymentTerms": 30 }),
        json!({
            "status": "pending", "date": "2024-01-15", "paymentTerms": 0,
            "customer": draft["uuid"], "items": [{ "quantity": 1, "description": "x", "amount": 1 }]
        }),
    ] {
        let response = bare_client()
            .post(format!("{}/api/invoices", server.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "accepted invalid invoice: {}", body);
    }
}

#[tokio::test]
async fn test_oversized_item_values_are_rejected_without_panicking() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;

    // quantity * amount here would wrap i64; the request must die at
    // validation, long before the total is computed
    let huge: i64 = 3_037_000_500;
    for body in [
        json!({
            "status": "draft",
            "items": [{ "quantity": huge, "description": "x", "amount": huge }]
        }),
        json!({ "status": "draft", "items": [{ "quantity": 1, "description": "x", "amount": -1 }] }),
    ] {
        let response = bare_client()
            .post(format!("{}/api/invoices", server.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "accepted invalid invoice: {}", body);
    }

    // the server is still alive and in-range values still work
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "status": "draft",
            "items": [{ "quantity": 2, "description": "x", "amount": 500 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let draft: Value = response.json().await.unwrap();
    assert_eq!(draft["total"], 1000);
}

#[tokio::test]
async fn test_impossible_calendar_dates_are_rejected() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;

    // 2024-02-31 is well-formed but does not exist; it must not be
    // silently normalized into March
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "status": "draft", "date": "2024-02-31" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // a real leap day is fine
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "status": "draft", "date": "2024-02-29" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_other_users_records_are_absent_not_forbidden() {
    let server = spawn_server().await;
    signup(&server, "alice@example.com").await;
    signup(&server, "bob@example.com").await;
    let (alice_token, _) = login(&server, "alice@example.com").await;
    let (bob_token, _) = login(&server, "bob@example.com").await;

    let customer = create_customer(&server, &alice_token, "Acme Ltd").await;
    let customer_uuid = customer["uuid"].as_str().unwrap();

    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&alice_token)
        .json(&pending_invoice(customer_uuid))
        .send()
        .await
        .unwrap();
    let invoice: Value = response.json().await.unwrap();
    let invoice_uuid = invoice["uuid"].as_str().unwrap();

    // Bob sees 404, not 403, for Alice's records
    for path in [
        format!("/api/invoices/{}", invoice_uuid),
        format!("/api/customers/{}", customer_uuid),
    ] {
        let response = bare_client()
            .get(format!("{}{}", server.base_url, path))
            .bearer_auth(&bob_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    let response = bare_client()
        .delete(format!("{}/api/invoices/{}", server.base_url, invoice_uuid))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // and Bob cannot attach Alice's customer to his own invoice
    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&bob_token)
        .json(&pending_invoice(customer_uuid))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_deleting_a_customer_detaches_it_from_invoices() {
    let server = spawn_server().await;
    let (token, _cookie) = signup_and_login(&server, "alice@example.com").await;
    let customer = create_customer(&server, &token, "Acme Ltd").await;
    let customer_uuid = customer["uuid"].as_str().unwrap();

    let response = bare_client()
        .post(format!("{}/api/invoices", server.base_url))
        .bearer_auth(&token)
        .json(&pending_invoice(customer_uuid))
        .send()
        .await
        .unwrap();
    let invoice: Value = response.json().await.unwrap();
    let invoice_uuid = invoice["uuid"].as_str().unwrap();

    let response = bare_client()
        .delete(format!("{}/api/customers/{}", server.base_url, customer_uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = bare_client()
        .get(format!("{}/api/invoices/{}", server.base_url, invoice_uuid))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let invoice: Value = response.json().await.unwrap();
    assert!(invoice["customer"].is_null());
}

#[tokio::test]
async fn test_signup_validation() {
    let server = spawn_server().await;

    // mismatched confirmation (password shape rules are unit-tested)
    let mut body = signup_body("Test User", "mismatch@example.com");
    body["passwordConfirmation"] = json!("Different1");
    let response = bare_client()
        .post(format!("{}/api/users", server.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // duplicate email (case-insensitive) is a conflict
    signup(&server, "alice@example.com").await;
    let response = bare_client()
        .post(format!("{}/api/users", server.base_url))
        .json(&signup_body("Other User", "Alice@Example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}
