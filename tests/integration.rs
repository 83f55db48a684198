use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use shipping_dispatch::api::rest::router;
use shipping_dispatch::auth::AuthSettings;
use shipping_dispatch::cache::memory::MemoryCache;
use shipping_dispatch::geo::StaticValidator;
use shipping_dispatch::models::user::{NewUser, Role};
use shipping_dispatch::state::AppState;
use shipping_dispatch::store::memory::MemoryStore;
use shipping_dispatch::store::Store;

const UNKNOWN_ADDRESS: &str = "Calle Inexistente 000";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    auth: AuthSettings,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthSettings::new("integration-secret", Duration::from_secs(300));
        let geocoder =
            StaticValidator::new().reject(UNKNOWN_ADDRESS, "No se encontró la dirección");

        let state = AppState::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(geocoder),
            auth.clone(),
            Duration::from_secs(300),
        )
        .unwrap();

        Self {
            app: router(Arc::new(state)),
            store,
            auth,
        }
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Seeds a user straight into the store and mints a token for it.
    async fn token_for(&self, email: &str, role: Role) -> (i64, String) {
        let user = self
            .store
            .create_user(NewUser::new(
                email.split('@').next().unwrap().to_string(),
                email,
                "not-a-real-hash".to_string(),
                role,
            ))
            .await
            .unwrap();
        (user.id, self.auth.issue(user.id, role).unwrap())
    }

    async fn admin(&self) -> String {
        self.token_for("admin@example.com", Role::Admin).await.1
    }

    async fn customer(&self) -> String {
        self.token_for("cliente@example.com", Role::User).await.1
    }

    /// Driver with `capacity` kg attached to a fresh route. Returns route and driver ids.
    async fn route_with_driver(&self, admin: &str, capacity: f64) -> (i64, i64) {
        let response = self
            .send(authed(
                "POST",
                "/api/drive",
                admin,
                Some(json!({ "name": "Luis Pérez", "vehicleCapacity": capacity })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let driver_id = body_json(response).await["driver"]["id"].as_i64().unwrap();

        let response = self
            .send(authed(
                "POST",
                "/api/routes",
                admin,
                Some(json!({ "name": "Bogotá - Cali", "origin": "Bogotá", "destination": "Cali" })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let route_id = body_json(response).await["route"]["id"].as_i64().unwrap();

        let response = self
            .send(authed(
                "POST",
                &format!("/api/routes/{route_id}/assign-driver"),
                admin,
                Some(json!({ "driverId": driver_id })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        (route_id, driver_id)
    }

    async fn create_order(&self, token: &str, weight: f64) -> String {
        let response = self
            .send(authed("POST", "/api/orders", token, Some(order_body(weight))))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["order"]["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn assign(&self, admin: &str, order_id: &str, route_id: i64) -> axum::response::Response {
        self.send(authed(
            "POST",
            &format!("/api/orders/{order_id}/assign"),
            admin,
            Some(json!({ "routeId": route_id })),
        ))
        .await
    }
}

fn order_body(weight: f64) -> Value {
    json!({
        "weight": weight,
        "dimensions": { "length": 1, "width": 1, "height": 1 },
        "productType": "Electrónicos",
        "destinationAddress": "Carrera 7 # 32-16, Bogotá",
        "returnAddress": "Calle 10 # 5-20, Medellín",
        "recipientName": "Eva Ríos",
        "recipientPhone": "3001234567",
        "recipientEmail": "eva@example.com"
    })
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
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

#[tokio::test]
async fn health_reports_backends() {
    let test = TestApp::new();
    let response = test.send(get_request("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "up");
    assert_eq!(body["cache"], "up");
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let test = TestApp::new();
    let customer = test.customer().await;
    test.create_order(&customer, 5.0).await;

    let response = test.send(get_request("/metrics")).await;
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
    assert!(body.contains("orders_created_total 1"));
}

#[tokio::test]
async fn register_then_login_issues_a_token() {
    let test = TestApp::new();

    let response = test
        .send(json_request(
            "POST",
            "/auth/register",
            json!({ "username": "maria", "email": "Maria@Example.com", "password": "clave-segura-1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Usuario registrado exitosamente");
    assert_eq!(body["user"]["email"], "maria@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());

    let response = test
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "maria@example.com", "password": "clave-segura-1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap();
    assert_eq!(body["user"]["username"], "maria");

    let claims = test.auth.verify(token).unwrap();
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let test = TestApp::new();
    let payload = json!({
        "username": "maria",
        "email": "maria@example.com",
        "password": "clave-segura-1"
    });

    let first = test.send(json_request("POST", "/auth/register", payload)).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = test
        .send(json_request(
            "POST",
            "/auth/register",
            json!({ "username": "otra", "email": "MARIA@example.com", "password": "clave-segura-2" }),
        ))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "El correo ya está registrado");
}

#[tokio::test]
async fn wrong_password_gets_no_token() {
    let test = TestApp::new();
    test.send(json_request(
        "POST",
        "/auth/register",
        json!({ "username": "maria", "email": "maria@example.com", "password": "clave-segura-1" }),
    ))
    .await;

    let response = test
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "maria@example.com", "password": "equivocada" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Credenciales inválidas");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn register_rejects_short_password_and_unknown_role() {
    let test = TestApp::new();

    let response = test
        .send(json_request(
            "POST",
            "/auth/register",
            json!({ "username": "maria", "email": "maria@example.com", "password": "corta" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .send(json_request(
            "POST",
            "/auth/register",
            json!({
                "username": "maria",
                "email": "maria@example.com",
                "password": "clave-segura-1",
                "role": "root"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guards_distinguish_missing_invalid_and_insufficient_credentials() {
    let test = TestApp::new();
    let customer = test.customer().await;

    let response = test.send(get_request("/api/orders")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "Acceso denegado. Token no proporcionado."
    );

    let response = test.send(authed("GET", "/api/orders", "garbage", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Token inválido o expirado.");

    let response = test.send(authed("GET", "/api/orders", &customer, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "Acceso denegado. Se requiere rol de administrador."
    );
}

#[tokio::test]
async fn created_order_starts_pending() {
    let test = TestApp::new();
    let customer = test.customer().await;

    let response = test
        .send(authed("POST", "/api/orders", &customer, Some(order_body(5.0))))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Orden de envío creada exitosamente");
    assert_eq!(body["order"]["status"], "En espera");
    assert_eq!(body["order"]["weight"], 5.0);
    assert!(body["order"]["assignedAt"].is_null());
    assert!(body["order"]["deliveredAt"].is_null());

    let order_id = body["order"]["id"].as_str().unwrap();
    let response = test
        .send(authed("GET", &format!("/api/orders/{order_id}/status"), &customer, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "En espera");
    assert_eq!(body["orderId"], order_id);
}

#[tokio::test]
async fn invalid_order_fields_are_rejected() {
    let test = TestApp::new();
    let customer = test.customer().await;

    let mut body = order_body(5.0);
    body["recipientPhone"] = json!("12345");
    let response = test
        .send(authed("POST", "/api/orders", &customer, Some(body)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "El teléfono del destinatario debe ser un celular válido de Colombia"
    );

    let response = test
        .send(authed("POST", "/api/orders", &customer, Some(order_body(0.0))))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "El peso debe ser mayor que 0");
}

#[tokio::test]
async fn geocoder_reason_is_surfaced() {
    let test = TestApp::new();
    let customer = test.customer().await;

    let mut body = order_body(5.0);
    body["returnAddress"] = json!(UNKNOWN_ADDRESS);
    let response = test
        .send(authed("POST", "/api/orders", &customer, Some(body)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Error en dirección de retorno: No se encontró la dirección"
    );
}

#[tokio::test]
async fn capacity_is_enforced_on_assignment() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 10.0).await;

    let first = test.create_order(&customer, 8.0).await;
    let response = test.assign(&admin, &first, route_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Orden asignada exitosamente");
    assert_eq!(body["order"]["status"], "En tránsito");
    assert_eq!(body["driver"]["assignedWeight"], 8.0);
    assert_eq!(body["route"]["id"], route_id);

    let heavy = test.create_order(&customer, 5.0).await;
    let response = test.assign(&admin, &heavy, route_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let message = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(message.contains("13"), "{message}");
    assert!(message.contains("10"), "{message}");

    let light = test.create_order(&customer, 2.0).await;
    let response = test.assign(&admin, &light, route_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["driver"]["assignedWeight"], 10.0);

    let driver = test.store.find_driver(driver_id).await.unwrap().unwrap();
    assert_eq!(driver.assigned_weight, 10.0);
    let untouched = test
        .store
        .find_order(heavy.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(untouched.driver_id.is_none());
}

#[tokio::test]
async fn delivery_flow_and_availability() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 10.0).await;
    let order_id = test.create_order(&customer, 4.0).await;

    let status_uri = format!("/api/orders/{order_id}/status");
    let response = test
        .send(authed("PUT", &status_uri, &admin, Some(json!({ "status": "Entregado" }))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "No se realizó ningún cambio. La orden no está en estado 'En tránsito'."
    );

    test.assign(&admin, &order_id, route_id).await;

    let availability_uri = format!("/api/drive/{driver_id}/availability");
    let response = test.send(authed("PATCH", &availability_uri, &admin, None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("órdenes activas"));

    let response = test
        .send(authed("PUT", &status_uri, &admin, Some(json!({ "status": "En espera" }))))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .send(authed("PUT", &status_uri, &admin, Some(json!({ "status": "Entregado" }))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Estado actualizado exitosamente");

    let response = test.send(authed("GET", &status_uri, &admin, None)).await;
    assert_eq!(body_json(response).await["status"], "Entregado");

    let response = test.send(authed("PATCH", &availability_uri, &admin, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    let driver = test.store.find_driver(driver_id).await.unwrap().unwrap();
    assert!(driver.is_available);
    assert_eq!(driver.assigned_weight, 0.0);
}

#[tokio::test]
async fn order_snapshot_is_refreshed_after_delivery() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, _) = test.route_with_driver(&admin, 10.0).await;
    let order_id = test.create_order(&customer, 1.5).await;
    let order_uri = format!("/api/orders/{order_id}");

    let response = test.send(authed("GET", &order_uri, &customer, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "En espera");

    test.assign(&admin, &order_id, route_id).await;

    let response = test.send(authed("GET", &order_uri, &customer, None)).await;
    let body = body_json(response).await;
    assert_eq!(body["status"], "En tránsito");
    assert_eq!(body["route"]["drivers"][0]["assignedWeight"], 1.5);
    assert_eq!(body["user"]["email"], "cliente@example.com");

    let (_, stranger) = test.token_for("otro@example.com", Role::User).await;
    let response = test.send(authed("GET", &order_uri, &stranger, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn orders_are_filtered_by_status_and_date() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 50.0).await;

    let moving = test.create_order(&customer, 1.0).await;
    let waiting = test.create_order(&customer, 1.0).await;
    let old = test.create_order(&customer, 1.0).await;
    test.assign(&admin, &moving, route_id).await;
    test.store
        .backdate_order(
            old.parse().unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();

    let response = test
        .send(authed("GET", "/api/orders?status=En%20espera", &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let ids: Vec<String> = body_json(response).await["orders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&waiting) && ids.contains(&old));

    let response = test
        .send(authed(
            "GET",
            "/api/orders?startDate=2023-06-01&endDate=2023-06-15",
            &admin,
            None,
        ))
        .await;
    let orders = body_json(response).await["orders"].as_array().unwrap().clone();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], old);

    let response = test
        .send(authed("GET", "/api/orders?status=En%20tr%C3%A1nsito", &admin, None))
        .await;
    let orders = body_json(response).await["orders"].as_array().unwrap().clone();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], moving);
    assert_eq!(orders[0]["user"]["email"], "cliente@example.com");
    assert_eq!(orders[0]["route"]["id"], route_id);
    assert_eq!(orders[0]["route"]["drivers"][0]["id"], driver_id);
    assert_eq!(orders[0]["driver"]["id"], driver_id);

    let response = test
        .send(authed("GET", "/api/orders?status=Perdido", &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_performance_metrics() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 50.0).await;

    let delivered = test.create_order(&customer, 2.0).await;
    let pending = test.create_order(&customer, 3.0).await;
    test.assign(&admin, &delivered, route_id).await;
    test.assign(&admin, &pending, route_id).await;
    test.send(authed(
        "PUT",
        &format!("/api/orders/{delivered}/status"),
        &admin,
        Some(json!({ "status": "Entregado" })),
    ))
    .await;

    let day = |h, m, s| Utc.with_ymd_and_hms(2024, 5, 10, h, m, s).unwrap();
    test.store
        .backdate_order(
            delivered.parse().unwrap(),
            day(8, 0, 0),
            Some(day(9, 0, 0)),
            Some(day(10, 30, 15)),
        )
        .await
        .unwrap();
    test.store
        .backdate_order(pending.parse().unwrap(), day(8, 0, 0), None, None)
        .await
        .unwrap();

    let uri = format!(
        "/api/drive/{driver_id}/performance-metrics?startDate=2024-05-01&endDate=2024-05-10"
    );
    let response = test.send(authed("GET", &uri, &admin, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Métricas obtenidas exitosamente");
    assert_eq!(body["metrics"]["totalOrders"], 2);
    assert_eq!(body["metrics"]["completedShipments"], 1);
    assert_eq!(body["metrics"]["avgDeliveryTimeSeconds"], "5415.00");
    assert_eq!(body["metrics"]["avgDeliveryTime"], "01:30:15");

    let response = test
        .send(authed(
            "GET",
            "/api/drive/metrics?startDate=2024-06-01&endDate=2024-06-30",
            &admin,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["metrics"].as_array().unwrap().is_empty());

    let uri = format!(
        "/api/drive/{driver_id}/performance-metrics?startDate=2024-06-01&endDate=2024-06-30"
    );
    let body = body_json(test.send(authed("GET", &uri, &admin, None)).await).await;
    assert_eq!(body["metrics"]["totalOrders"], 0);
    assert_eq!(body["metrics"]["avgDeliveryTime"], "00:00:00");
    assert!(body["metrics"]["message"].is_string());

    let response = test
        .send(authed(
            "GET",
            "/api/drive/999/performance-metrics?startDate=2024-05-01&endDate=2024-05-10",
            &admin,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test
        .send(authed("GET", "/api/drive/metrics?startDate=2024-05-01", &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_listing_includes_routes_and_filters_availability() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 12.5).await;
    test.send(authed(
        "POST",
        "/api/drive",
        &admin,
        Some(json!({ "name": "Sin ruta", "vehicleCapacity": 5 })),
    ))
    .await;

    let response = test.send(authed("GET", "/api/drive", &admin, None)).await;
    let body = body_json(response).await;
    assert_eq!(body["message"], "Lista de transportistas");
    let drivers = body["drivers"].as_array().unwrap();
    assert_eq!(drivers.len(), 2);
    assert_eq!(drivers[0]["id"], driver_id);
    assert_eq!(drivers[0]["assignedRoutes"][0]["routeId"], route_id);
    assert_eq!(drivers[0]["isAvailable"], false);

    let response = test
        .send(authed("GET", "/api/drive?available=true", &admin, None))
        .await;
    let drivers = body_json(response).await["drivers"].as_array().unwrap().clone();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0]["name"], "Sin ruta");

    let response = test
        .send(authed(
            "POST",
            "/api/drive",
            &admin,
            Some(json!({ "name": "Cero", "vehicleCapacity": 0 })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn route_lifecycle() {
    let test = TestApp::new();
    let admin = test.admin().await;
    let customer = test.customer().await;
    let (route_id, driver_id) = test.route_with_driver(&admin, 10.0).await;

    let response = test
        .send(authed("GET", &format!("/api/routes/{route_id}"), &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Ruta encontrada");
    assert_eq!(body["route"]["drivers"][0]["id"], driver_id);

    let order_id = test.create_order(&customer, 1.0).await;
    test.assign(&admin, &order_id, route_id).await;

    let order_uri = format!("/api/orders/{order_id}");
    let cached = body_json(test.send(authed("GET", &order_uri, &customer, None)).await).await;
    assert_eq!(cached["routeId"], route_id);
    assert_eq!(cached["route"]["id"], route_id);

    let response = test
        .send(authed("DELETE", &format!("/api/routes/{route_id}"), &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Ruta eliminada exitosamente");

    let response = test
        .send(authed("GET", &format!("/api/routes/{route_id}"), &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        format!("La ruta con ID {route_id} no existe.")
    );

    let order = test
        .store
        .find_order(order_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(order.route_id.is_none());

    let refreshed = body_json(test.send(authed("GET", &order_uri, &customer, None)).await).await;
    assert!(refreshed["routeId"].is_null());
    assert!(refreshed["route"].is_null());
    assert_eq!(refreshed["driver"]["id"], driver_id);

    let response = test.send(authed("GET", "/api/routes", &admin, None)).await;
    assert!(body_json(response).await["routes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_identifiers_are_bad_requests() {
    let test = TestApp::new();
    let admin = test.admin().await;

    let response = test
        .send(authed("GET", "/api/orders/not-a-uuid/status", &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let response = test
        .send(authed("GET", "/api/routes/abc", &admin, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
