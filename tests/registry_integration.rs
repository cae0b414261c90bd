/// Integration tests for the vehicle registry: role gates, lookups, renewals
/// and per-user saved lists, driven with tokens minted by the auth service.
use auth_service::crypto::generate_jwt;
use axum::http::{header, HeaderValue};
use axum_test::TestServer;
use common::roles::Role;
use registry_service::{routes, MemoryVehicleStore, RegistryService, RegistryState};
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "shared-secret";

fn server() -> TestServer {
    let service = RegistryService::new(Arc::new(MemoryVehicleStore::new()));
    TestServer::new(routes::router(RegistryState::new(Arc::new(service)), SECRET)).unwrap()
}

fn auth(email: &str, role: Role) -> HeaderValue {
    let token = generate_jwt(email, role, SECRET, 600).unwrap();
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn vehicle(number: &str, licence: &str, expiry: &str) -> Value {
    json!({
        "vehicle_number": number,
        "licence_number": licence,
        "vehicle_class": "Motor Car",
        "fuel_type": "Petrol",
        "owner_name": "A. Perera",
        "owner_address": "12 Galle Rd, Colombo",
        "owner_nic": "901234567V",
        "district": "Colombo",
        "licence_valid_from": "2020-01-01",
        "licence_expiry_date": expiry,
    })
}

async fn register(server: &TestServer, body: Value) -> axum_test::TestResponse {
    server
        .post("/vehicles")
        .add_header(header::AUTHORIZATION, auth("clerk@dmt.gov.lk", Role::Dmt))
        .json(&body)
        .await
}

#[tokio::test]
async fn test_requires_token() {
    let server = server();

    let response = server.get("/vehicles/CAB1234").await;
    assert_eq!(response.status_code(), 401);

    let response = server
        .get("/saved-vehicles")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer nonsense"))
        .await;
    assert_eq!(response.status_code(), 401);

    let forged = generate_jwt("clerk@dmt.gov.lk", Role::Dmt, "other-secret", 600).unwrap();
    let response = server
        .get("/vehicles/CAB1234")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {forged}")).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), 401);

    assert_eq!(server.get("/healthz").await.status_code(), 200);
}

#[tokio::test]
async fn test_register_and_lookup_by_role() {
    let server = server();

    let response = register(&server, vehicle("cab-1234", "LIC-001", "2999-12-31")).await;
    assert_eq!(response.status_code(), 200);
    let created: Value = response.json();
    assert_eq!(created["vehicle_number"], "CAB1234");
    assert_eq!(created["status"], "VALID");

    let response = register(&server, vehicle("CAB 1234", "LIC-002", "2999-12-31")).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "Vehicle number already registered");

    // Police may look up by plate, the public may not
    let response = server
        .get("/vehicles/cab%201234")
        .add_header(header::AUTHORIZATION, auth("officer@police.lk", Role::Police))
        .await;
    assert_eq!(response.status_code(), 200);
    let found: Value = response.json();
    assert_eq!(found["licence_number"], "LIC-001");

    let response = server
        .get("/vehicles/CAB1234")
        .add_header(header::AUTHORIZATION, auth("citizen@mail.lk", Role::Public))
        .await;
    assert_eq!(response.status_code(), 403);

    // Anyone signed in may look up by licence
    let response = server
        .get("/vehicles/license/LIC-001")
        .add_header(header::AUTHORIZATION, auth("citizen@mail.lk", Role::Public))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = server
        .get("/vehicles/license/LIC-404")
        .add_header(header::AUTHORIZATION, auth("citizen@mail.lk", Role::Public))
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "Vehicle not found with this license number");

    let response = server
        .get("/vehicles/ZZ0000")
        .add_header(header::AUTHORIZATION, auth("officer@police.lk", Role::Police))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_only_dmt_mutates() {
    let server = server();
    register(&server, vehicle("KX4455", "LIC-9", "2001-01-01")).await;

    let response = server
        .post("/vehicles")
        .add_header(header::AUTHORIZATION, auth("officer@police.lk", Role::Police))
        .json(&vehicle("NEW1", "LIC-NEW", "2999-01-01"))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .put("/vehicles/KX4455/renew")
        .add_header(header::AUTHORIZATION, auth("officer@police.lk", Role::Police))
        .json(&json!({ "new_expiry_date": "2999-01-01" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .put("/vehicles/kx-4455/renew")
        .add_header(header::AUTHORIZATION, auth("clerk@dmt.gov.lk", Role::Dmt))
        .json(&json!({ "new_expiry_date": "2999-01-01" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let renewed: Value = response.json();
    assert_eq!(renewed["licence_expiry_date"], "2999-01-01");
    assert_eq!(renewed["licence_valid_from"], "2020-01-01");
    assert_eq!(renewed["status"], "VALID");

    let response = server
        .put("/vehicles/NOPE1/renew")
        .add_header(header::AUTHORIZATION, auth("clerk@dmt.gov.lk", Role::Dmt))
        .json(&json!({ "new_expiry_date": "2999-01-01" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_saved_vehicles_are_per_user() {
    let server = server();
    register(&server, vehicle("CAB1234", "LIC-001", "2001-01-01")).await;

    let alice = auth("alice@mail.lk", Role::Public);
    let bob = auth("bob@mail.lk", Role::Public);

    let response = server
        .post("/saved-vehicles/cab1234")
        .add_header(header::AUTHORIZATION, alice.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "Vehicle saved successfully");

    let response = server
        .post("/saved-vehicles/CAB1234")
        .add_header(header::AUTHORIZATION, alice.clone())
        .await;
    assert_eq!(response.status_code(), 409);

    let response = server
        .post("/saved-vehicles/UNKNOWN9")
        .add_header(header::AUTHORIZATION, alice.clone())
        .await;
    assert_eq!(response.status_code(), 404);

    let saved: Vec<Value> = server
        .get("/saved-vehicles")
        .add_header(header::AUTHORIZATION, alice.clone())
        .await
        .json();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["status"], "EXPIRED");

    let saved: Vec<Value> = server
        .get("/saved-vehicles")
        .add_header(header::AUTHORIZATION, bob.clone())
        .await
        .json();
    assert!(saved.is_empty());

    let response = server
        .delete("/saved-vehicles/CAB1234")
        .add_header(header::AUTHORIZATION, bob)
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .delete("/saved-vehicles/CAB1234")
        .add_header(header::AUTHORIZATION, alice)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "Vehicle removed successfully");
}
