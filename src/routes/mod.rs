use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::handlers::{admin, catalog, checkout};
use crate::middleware::rate_limit::create_public_governor;
use crate::AppState;

/// Customer-facing routes: catalog, location, checkout.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/products", get(catalog::list_products))
        .route("/store/status", get(checkout::store_status))
        .route("/delivery/settings", get(checkout::delivery_settings))
        .route("/location/search", get(checkout::search_locations))
        .route("/location/resolve", post(checkout::resolve_location))
        .route("/checkout/quote", post(checkout::quote))
        .route("/checkout/window", get(checkout::window_stream))
        .route("/orders", post(checkout::place_order))
}

/// Store operator panel. Unauthenticated; deploy behind the operator's own
/// access control.
fn admin_routes() -> Router<AppState> {
    Router::new()
        // Catalog management
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/products",
            get(catalog::list_all_products).post(catalog::create_product),
        )
        .route(
            "/products/{id}",
            put(catalog::update_product).delete(catalog::delete_product),
        )
        // Orders
        .route("/dashboard", get(admin::dashboard))
        .route("/orders", get(admin::list_orders))
        .route("/orders/stream", get(admin::order_stream))
        .route(
            "/orders/{id}",
            get(admin::get_order).delete(admin::delete_order),
        )
        .route("/orders/{id}/status", patch(admin::update_order_status))
        .route("/orders/{id}/verify", patch(admin::verify_order))
        .route("/orders/{id}/route", get(admin::order_route))
        // Delivery pricing
        .route(
            "/delivery/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        // New-order alert
        .route("/alert", get(admin::alert_status))
        .route("/alert/ack", post(admin::acknowledge_alert))
}

fn assemble(state: AppState, public: Router<AppState>) -> Router {
    Router::new()
        .nest("/api", public)
        .nest("/api/admin", admin_routes())
        .with_state(state)
}

pub fn create_router(state: AppState) -> Router {
    // Per-IP limit on the public surface; needs connect info from the server
    assemble(state, public_routes().layer(create_public_governor()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use chrono::{DateTime, TimeZone};
    use chrono_tz::{Europe::Belgrade, Tz};
    use sea_orm::DatabaseConnection;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::delivery::geo::Coordinate;
    use crate::delivery::window::Clock;
    use crate::services::geocoding::{GeocodeCandidate, Geocoder, GeocodingError};
    use crate::services::notifications::{OrderAlert, OrderFeed, TracingAlerter};
    use crate::services::settings_store::tests::MemoryStore;
    use crate::services::settings_store::SettingsHandle;

    const STORE: Coordinate = Coordinate {
        latitude: 43.276415,
        longitude: 20.011664,
    };

    fn north_of_store(km: f64) -> Coordinate {
        Coordinate {
            latitude: STORE.latitude + (km / 6371.0).to_degrees(),
            longitude: STORE.longitude,
        }
    }

    struct FixedClock(DateTime<Tz>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Tz> {
            self.0
        }
    }

    #[derive(Default)]
    struct StubGeocoder {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<GeocodeCandidate>, GeocodingError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                GeocodeCandidate {
                    coordinate: north_of_store(1.0),
                    label: format!("{query} 1"),
                },
                GeocodeCandidate {
                    coordinate: north_of_store(5.0),
                    label: format!("{query} 2"),
                },
            ])
        }

        async fn reverse(&self, _coordinate: Coordinate) -> Result<String, GeocodingError> {
            Err(GeocodingError::NotFound)
        }
    }

    fn test_config() -> Config {
        Config {
            database_url: "postgres://unused".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            store_location: STORE,
            store_timezone: Belgrade,
            geocoder_base_url: "http://unused".to_string(),
            geocoder_region: String::new(),
            geocoder_user_agent: "test".to_string(),
            geocoder_timeout_secs: 1,
            order_window_recheck: Duration::from_secs(60),
            order_alert_interval: Duration::from_secs(2),
            order_alert_duration: Duration::from_secs(300),
            min_order_amount: rust_decimal::Decimal::from(2000),
            min_order_excluded_category: None,
        }
    }

    async fn test_app(hour: u32) -> (Router, Arc<StubGeocoder>) {
        let geocoder = Arc::new(StubGeocoder::default());
        let settings = SettingsHandle::load(Arc::new(MemoryStore::default()))
            .await
            .unwrap();
        let now = Belgrade.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap();

        let state = AppState {
            db: DatabaseConnection::Disconnected,
            config: test_config(),
            settings,
            geocoder: geocoder.clone(),
            clock: Arc::new(FixedClock(now)),
            feed: OrderFeed::new(16),
            alert: OrderAlert::new(
                Arc::new(TracingAlerter),
                Duration::from_secs(2),
                Duration::from_secs(300),
            ),
        };

        (assemble(state, public_routes()), geocoder)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn store_status_follows_the_clock() {
        let (app, _) = test_app(10).await;
        let (status, body) = send(&app, get("/api/store/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepting_orders"], true);
        assert_eq!(body["radii"]["hard_zone_radius_km"], 3.5);

        let (app, _) = test_app(21).await;
        let (_, body) = send(&app, get("/api/store/status")).await;
        assert_eq!(body["accepting_orders"], false);
        assert_eq!(body["hours_message"], "Orders accepted 8:00–20:00.");
    }

    #[tokio::test]
    async fn short_search_skips_geocoder() {
        let (app, geocoder) = test_app(10).await;
        let (status, body) = send(&app, get("/api/location/search?q=ab")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(geocoder.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_results_are_annotated_with_zone() {
        let (app, _) = test_app(10).await;
        let (status, body) = send(&app, get("/api/location/search?q=Njegoseva")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["within_zone"], true);
        assert_eq!(body[1]["within_zone"], false);
        let far = body[1]["distance_km"].as_f64().unwrap();
        assert!((far - 5.0).abs() < 0.01, "{far}");
    }

    #[tokio::test]
    async fn resolve_rejects_out_of_zone_with_distance() {
        let (app, _) = test_app(10).await;
        let point = north_of_store(4.0);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/location/resolve",
                json!({ "latitude": point.latitude, "longitude": point.longitude }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("4.0 km"), "{message}");
    }

    #[tokio::test]
    async fn resolve_falls_back_to_coordinate_label() {
        let (app, _) = test_app(10).await;
        let point = north_of_store(1.0);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/location/resolve",
                json!({ "latitude": point.latitude, "longitude": point.longitude }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], point.label());
        assert_eq!(body["eta_minutes"]["min"], 15);
    }

    #[tokio::test]
    async fn resolve_rejects_invalid_coordinate() {
        let (app, _) = test_app(10).await;
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/location/resolve",
                json!({ "latitude": 120.0, "longitude": 20.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_update_is_validated_and_applied() {
        let (app, _) = test_app(10).await;

        let mut settings = json!({
            "freeDeliveryThreshold": 2500,
            "underThresholdFee": 150,
            "distanceThresholdKm": 2.0,
            "overDistanceFee": 300,
            "orderStartHour": 20,
            "orderEndHour": 8,
            "maxDeliveryRadiusKm": 3.5
        });
        let (status, _) = send(
            &app,
            json_request("PUT", "/api/admin/delivery/settings", settings.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        settings["orderStartHour"] = json!(7);
        settings["orderEndHour"] = json!(22);
        let (status, _) = send(
            &app,
            json_request("PUT", "/api/admin/delivery/settings", settings),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/api/delivery/settings")).await;
        assert_eq!(body["orderEndHour"], 22);
        assert_eq!(body["underThresholdFee"], "150");
    }

    #[tokio::test]
    async fn order_with_bad_phone_is_rejected() {
        let (app, _) = test_app(10).await;
        let point = north_of_store(1.0);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/orders",
                json!({
                    "first_name": "Ana",
                    "last_name": "Jovanović",
                    "phone": "12345",
                    "location": point,
                    "items": [{ "article_id": 1, "quantity": 1 }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("9 or 10 digits"));
    }

    #[tokio::test]
    async fn order_outside_zone_never_reaches_pricing() {
        let (app, _) = test_app(10).await;
        let point = north_of_store(6.0);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/orders",
                json!({
                    "first_name": "Ana",
                    "last_name": "Jovanović",
                    "phone": "0612345678",
                    "location": point,
                    "items": [{ "article_id": 1, "quantity": 1 }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("too far"));
    }

    fn order_body(location: Coordinate, quantity: u64) -> Value {
        json!({
            "first_name": "Ana",
            "last_name": "Jovanović",
            "phone": "0612345678",
            "location": location,
            "items": [{ "article_id": 1, "quantity": quantity }]
        })
    }

    #[tokio::test]
    async fn order_after_hours_is_blocked_before_cart_lookup() {
        let (app, _) = test_app(21).await;
        let (status, body) = send(
            &app,
            json_request("POST", "/api/orders", order_body(north_of_store(1.0), 1)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("8:00–20:00"));
    }

    #[tokio::test]
    async fn order_with_oversized_quantity_is_rejected() {
        let (app, _) = test_app(10).await;
        for quantity in [1_000, 3_000_000_000] {
            let (status, _) = send(
                &app,
                json_request("POST", "/api/orders", order_body(north_of_store(1.0), quantity)),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn alert_acknowledge_without_orders() {
        let (app, _) = test_app(10).await;
        let (status, body) = send(&app, get("/api/admin/alert")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alerting"], false);

        let (_, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/admin/alert/ack")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["acknowledged"], false);
    }

    #[tokio::test]
    async fn route_rejects_half_a_driver_position() {
        let (app, _) = test_app(10).await;
        let (status, _) = send(&app, get("/api/admin/orders/1/route?from_lat=43.2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
