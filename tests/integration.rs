use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use donation_hub::api::rest::router;
use donation_hub::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

const DONOR: (&str, &str) = ("donor-1", "donor");
const RECEIVER: (&str, &str) = ("receiver-1", "receiver");

fn setup() -> axum::Router {
    router(Arc::new(AppState::in_memory(1024)))
}

fn request(
    method: &str,
    uri: &str,
    identity: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = identity {
        builder = builder.header("x-user-id", user_id).header("x-user-role", role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn get_request(uri: &str) -> Request<Body> {
    request("GET", uri, None, None)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn donation_body(lat: f64, lng: f64) -> Value {
    json!({
        "food_type": "Rice",
        "quantity": 5,
        "description": "veg pulao",
        "pickup_time": "2026-10-19T18:00:00Z",
        "location": { "lat": lat, "lng": lng },
        "address": "MG Road, Bangalore"
    })
}

async fn post_donation(app: &axum::Router, lat: f64, lng: f64) -> String {
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/donations",
            Some(DONOR),
            Some(donation_body(lat, lng)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pending_donations"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_subscriptions"));
}

#[tokio::test]
async fn create_donation_returns_pending_record() {
    let app = setup();
    let response = app
        .oneshot(request(
            "POST",
            "/donations",
            Some(DONOR),
            Some(donation_body(12.9716, 77.5946)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["donor_id"], "donor-1");
    assert_eq!(body["food_type"], "Rice");
    assert!(body["receiver_id"].is_null());
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_donation_without_identity_returns_401() {
    let app = setup();
    let response = app
        .oneshot(request(
            "POST",
            "/donations",
            None,
            Some(donation_body(12.9716, 77.5946)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthenticated");
}

#[tokio::test]
async fn create_donation_zero_quantity_returns_400() {
    let app = setup();
    let mut body = donation_body(12.9716, 77.5946);
    body["quantity"] = json!(0);

    let response = app
        .oneshot(request("POST", "/donations", Some(DONOR), Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_donation_without_location_returns_400() {
    let app = setup();
    let mut body = donation_body(12.9716, 77.5946);
    body.as_object_mut().unwrap().remove("location");

    let response = app
        .oneshot(request("POST", "/donations", Some(DONOR), Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "validation");
}

#[tokio::test]
async fn get_nonexistent_donation_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/donations/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nearby_returns_donations_within_radius_sorted() {
    let app = setup();
    let far = post_donation(&app, 12.9716, 77.5946).await;
    let near = post_donation(&app, 12.9400, 77.6245).await;
    let _out_of_range = post_donation(&app, 13.3, 77.6).await;

    let response = app
        .oneshot(get_request("/nearby?lat=12.9352&lng=77.6245&radius_km=15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], near);
    assert_eq!(list[1]["id"], far);
    let distance = list[1]["distance_km"].as_f64().unwrap();
    assert!((distance - 5.18).abs() < 0.1);
}

#[tokio::test]
async fn nearby_small_radius_excludes_donation() {
    let app = setup();
    post_donation(&app, 12.9716, 77.5946).await;

    let response = app
        .oneshot(get_request("/nearby?lat=12.9352&lng=77.6245&radius_km=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn nearby_accepts_radius_as_query_key() {
    let app = setup();
    let id = post_donation(&app, 12.9716, 77.5946).await;

    let response = app
        .clone()
        .oneshot(get_request("/nearby?lat=12.9352&lng=77.6245&radius=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    let response = app
        .oneshot(get_request("/nearby?lat=12.9352&lng=77.6245&radius=15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await[0]["id"], id);
}

#[tokio::test]
async fn nearby_falls_back_to_receiver_profile_location() {
    let app = setup();
    let id = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/profiles",
            Some(RECEIVER),
            Some(json!({
                "name": "Ravi",
                "email": "ravi@example.com",
                "phone": "98450 00000",
                "address": "Koramangala",
                "location": { "lat": 12.9352, "lng": 77.6245 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/nearby", Some(RECEIVER), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["id"], id);
}

#[tokio::test]
async fn nearby_rejects_half_a_coordinate() {
    let app = setup();
    let response = app
        .oneshot(get_request("/nearby?lat=12.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_booking_flow() {
    let app = setup();
    let donation_id = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/profiles",
            Some(DONOR),
            Some(json!({
                "name": "Annapurna Kitchen",
                "email": "kitchen@example.com",
                "phone": "080 1234 5678",
                "address": "MG Road",
                "location": { "lat": 12.9716, "lng": 77.5946 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{donation_id}/book"),
            Some(RECEIVER),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let booking = body_json(res).await;
    assert_eq!(booking["status"], "Active");
    assert_eq!(booking["donation_id"], donation_id);
    assert_eq!(booking["receiver_id"], "receiver-1");

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{donation_id}/book"),
            Some(("receiver-2", "receiver")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["code"], "conflict");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/donations/{donation_id}")))
        .await
        .unwrap();
    let donation = body_json(res).await;
    assert_eq!(donation["status"], "Booked");
    assert_eq!(donation["receiver_id"], "receiver-1");
    assert!(!donation["booked_at"].is_null());
    assert_eq!(donation["donor"]["name"], "Annapurna Kitchen");
    assert_eq!(donation["donor"]["phone"], "080 1234 5678");

    let res = app
        .clone()
        .oneshot(request("GET", "/bookings/tracked", Some(RECEIVER), None))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(request("GET", "/donations/booked", Some(DONOR), None))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{donation_id}/collect"),
            Some(DONOR),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "Collected");

    let res = app
        .clone()
        .oneshot(request("GET", "/bookings", Some(RECEIVER), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bookings = body_json(res).await;
    let list = bookings.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["status"], "Completed");
    assert_eq!(list[0]["donation"]["status"], "Collected");
    assert_eq!(list[0]["donor"]["name"], "Annapurna Kitchen");

    let res = app
        .oneshot(get_request("/nearby?lat=12.9352&lng=77.6245"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn booking_requires_identity() {
    let app = setup();
    let donation_id = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .oneshot(request(
            "POST",
            &format!("/donations/{donation_id}/book"),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_unknown_donation_returns_404() {
    let app = setup();
    let res = app
        .oneshot(request(
            "POST",
            "/donations/00000000-0000-0000-0000-000000000000/book",
            Some(RECEIVER),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn donor_can_cancel_but_not_after_booking() {
    let app = setup();
    let open = post_donation(&app, 12.9716, 77.5946).await;
    let taken = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{open}/cancel"),
            Some(DONOR),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "Cancelled");

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{taken}/book"),
            Some(RECEIVER),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{taken}/cancel"),
            Some(DONOR),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .oneshot(request(
            "POST",
            &format!("/donations/{open}/book"),
            Some(RECEIVER),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn another_donor_cannot_cancel() {
    let app = setup();
    let id = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .oneshot(request(
            "POST",
            &format!("/donations/{id}/cancel"),
            Some(("donor-2", "donor")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn my_donations_lists_only_own_records() {
    let app = setup();
    post_donation(&app, 12.9716, 77.5946).await;
    post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .clone()
        .oneshot(request("GET", "/donations/mine", Some(DONOR), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 2);

    let res = app
        .oneshot(request(
            "GET",
            "/donations/mine",
            Some(("donor-2", "donor")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn profile_registration_and_role_scoped_lookup() {
    let app = setup();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/profiles",
            Some(DONOR),
            Some(json!({ "name": "Meera", "email": "meera@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let profile = body_json(res).await;
    assert_eq!(profile["role"], "donor");
    assert_eq!(profile["profile_complete"], false);
    assert_eq!(profile["total_donations"], 0);
    assert_eq!(profile["location"]["lat"], 0.0);

    let res = app
        .clone()
        .oneshot(request("GET", "/profiles/me", Some(DONOR), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request("/profiles/donor-1?role=receiver"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .oneshot(request(
            "POST",
            "/profiles",
            Some(("donor-1", "receiver")),
            Some(json!({ "name": "Meera", "email": "meera@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn booked_orders_carry_the_receiver_contact() {
    let app = setup();
    let donation_id = post_donation(&app, 12.9716, 77.5946).await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/profiles",
            Some(RECEIVER),
            Some(json!({
                "name": "Ravi",
                "email": "ravi@example.com",
                "phone": "98450 00000",
                "address": "Koramangala",
                "location": { "lat": 12.9352, "lng": 77.6245 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/donations/{donation_id}/book"),
            Some(RECEIVER),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request("GET", "/donations/booked", Some(DONOR), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let orders = body_json(res).await;
    assert_eq!(orders[0]["id"], donation_id);
    assert_eq!(orders[0]["status"], "Booked");
    assert_eq!(orders[0]["receiver"]["name"], "Ravi");
    assert_eq!(orders[0]["receiver"]["phone"], "98450 00000");

    // No donor profile registered: the detail still resolves, without a contact.
    let res = app
        .oneshot(get_request(&format!("/donations/{donation_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_json(res).await["donor"].is_null());
}
