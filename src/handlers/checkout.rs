use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::delivery::cart::{self, CartLine, MAX_LINE_QUANTITY, MinimumOrder};
use crate::delivery::fee::{FeePolicy, FeeQuote};
use crate::delivery::geo::{self, Coordinate, EtaRange};
use crate::delivery::geofence::{CustomerLocation, evaluate_candidate};
use crate::delivery::picker::resolve_label;
use crate::delivery::search::is_searchable;
use crate::delivery::settings::{DeliveryRadii, DeliverySettings};
use crate::delivery::window::{OrderWindowMonitor, WindowStatus, check_ordering_allowed};
use crate::entities::order::OrderStatus;
use crate::entities::{article, category, order, order_item};
use crate::error::{AppError, AppResult};
use crate::services::notifications::OrderArrived;
use crate::AppState;

// ============ Store & Settings ============

#[derive(Debug, Serialize)]
pub struct StoreStatusResponse {
    #[serde(flatten)]
    pub window: WindowStatus,
    pub store: Coordinate,
    pub radii: DeliveryRadii,
}

pub async fn store_status(State(state): State<AppState>) -> Json<StoreStatusResponse> {
    let settings = state.settings.current();
    Json(StoreStatusResponse {
        window: WindowStatus::evaluate(&state.clock.now(), &settings),
        store: state.store_location(),
        radii: settings.radii(),
    })
}

/// Pricing policy in force (read-only)
pub async fn delivery_settings(State(state): State<AppState>) -> Json<DeliverySettings> {
    Json(state.settings.current())
}

/// Order-window status pushed whenever it flips. The monitor lives as long
/// as the connection.
pub async fn window_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let monitor = OrderWindowMonitor::spawn(
        state.clock.clone(),
        Arc::new(state.settings.clone()),
        state.config.order_window_recheck,
    );
    let initial = monitor.status();

    let events = stream::unfold((monitor, Some(initial)), |(mut monitor, first)| async move {
        let status = match first {
            Some(status) => status,
            None => monitor.changed().await?,
        };
        let data = serde_json::to_string(&status).unwrap_or_default();
        let event = Event::default().event("window").data(data);
        Some((Ok(event), (monitor, None)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

// ============ Location ============

#[derive(Debug, Deserialize)]
pub struct LocationSearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct LocationSuggestion {
    pub label: String,
    pub coordinate: Coordinate,
    pub distance_km: f64,
    pub within_zone: bool,
}

/// Forward geocoding, each hit annotated against the delivery zone
pub async fn search_locations(
    State(state): State<AppState>,
    Query(query): Query<LocationSearchQuery>,
) -> AppResult<Json<Vec<LocationSuggestion>>> {
    if !is_searchable(&query.q) {
        return Ok(Json(Vec::new()));
    }

    let settings = state.settings.current();
    let policy = FeePolicy::new(state.store_location(), &settings);
    let candidates = state.geocoder.search(query.q.trim()).await?;

    let suggestions = candidates
        .into_iter()
        .map(|c| LocationSuggestion {
            distance_km: policy.distance_km(c.coordinate),
            within_zone: policy.is_within_delivery_zone(c.coordinate),
            label: c.label,
            coordinate: c.coordinate,
        })
        .collect();

    Ok(Json(suggestions))
}

#[derive(Debug, Deserialize)]
pub struct ResolveLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedLocation {
    #[serde(flatten)]
    pub location: CustomerLocation,
    pub distance_km: f64,
    pub eta_minutes: EtaRange,
}

/// Turn a map pick or GPS fix into a delivery address inside the zone
pub async fn resolve_location(
    State(state): State<AppState>,
    Json(payload): Json<ResolveLocationRequest>,
) -> AppResult<Json<ResolvedLocation>> {
    let settings = state.settings.current();
    let candidate = Coordinate {
        latitude: payload.latitude,
        longitude: payload.longitude,
    };
    let accepted = evaluate_candidate(
        state.store_location(),
        candidate,
        settings.max_delivery_radius_km,
    )?;

    let address = match non_blank(payload.label.as_deref()) {
        Some(label) => label.to_string(),
        None => resolve_label(state.geocoder.as_ref(), accepted.coordinate).await,
    };

    Ok(Json(ResolvedLocation {
        location: CustomerLocation {
            coordinate: accepted.coordinate,
            address,
        },
        distance_km: accepted.distance_km,
        eta_minutes: geo::estimated_minutes(accepted.distance_km),
    }))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============ Cart ============

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemRequest {
    pub article_id: i32,
    pub quantity: u32,
}

/// A requested cart line resolved against the catalog.
#[derive(Debug, Clone)]
struct PricedItem {
    article: article::Model,
    quantity: u32,
}

impl PricedItem {
    fn line(&self) -> CartLine {
        CartLine {
            category_id: self.article.category_id,
            unit_price: self.article.price,
            quantity: self.quantity,
        }
    }
}

fn validate_items(items: &[CartItemRequest]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".to_string()));
    }
    if items
        .iter()
        .any(|item| !(1..=MAX_LINE_QUANTITY).contains(&item.quantity))
    {
        return Err(AppError::BadRequest(format!(
            "Quantities must be between 1 and {}",
            MAX_LINE_QUANTITY
        )));
    }
    Ok(())
}

async fn load_cart(state: &AppState, items: &[CartItemRequest]) -> AppResult<Vec<PricedItem>> {
    validate_items(items)?;

    let ids: Vec<i32> = items.iter().map(|item| item.article_id).collect();
    let articles = article::Entity::find()
        .filter(article::Column::Id.is_in(ids))
        .all(&state.db)
        .await?;

    items
        .iter()
        .map(|item| {
            let article = articles
                .iter()
                .find(|a| a.id == item.article_id)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Product {} does not exist", item.article_id))
                })?;
            if !article.available {
                return Err(AppError::Unprocessable(format!(
                    "{} is no longer available",
                    article.name
                )));
            }
            Ok(PricedItem {
                article: article.clone(),
                quantity: item.quantity,
            })
        })
        .collect()
}

async fn minimum_order(state: &AppState) -> AppResult<MinimumOrder> {
    let excluded_category_id = match &state.config.min_order_excluded_category {
        Some(name) => category::Entity::find()
            .filter(category::Column::Name.eq(name.as_str()))
            .one(&state.db)
            .await?
            .map(|c| c.id),
        None => None,
    };

    Ok(MinimumOrder {
        amount: state.config.min_order_amount,
        excluded_category_id,
    })
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub items: Vec<CartItemRequest>,
    pub location: Coordinate,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub subtotal: Decimal,
    #[serde(flatten)]
    pub delivery: FeeQuote,
    pub total: Decimal,
    /// Set while the cart is below the minimum order.
    pub minimum_order: Option<String>,
    pub window: WindowStatus,
}

/// Price a cart for a delivery address
pub async fn quote(
    State(state): State<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<Json<QuoteResponse>> {
    let settings = state.settings.current();
    let store = state.store_location();
    let accepted = evaluate_candidate(store, payload.location, settings.max_delivery_radius_km)?;

    let items = load_cart(&state, &payload.items).await?;
    let lines: Vec<CartLine> = items.iter().map(PricedItem::line).collect();
    let subtotal = cart::subtotal(&lines);
    let minimum = minimum_order(&state).await?;

    let delivery = FeePolicy::new(store, &settings).quote(subtotal, accepted.coordinate);

    Ok(Json(QuoteResponse {
        subtotal,
        total: subtotal + delivery.fee,
        delivery,
        minimum_order: minimum.check(&lines).err().map(|e| e.to_string()),
        window: WindowStatus::evaluate(&state.clock.now(), &settings),
    }))
}

// ============ Orders ============

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub location: Coordinate,
    pub items: Vec<CartItemRequest>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub total: Decimal,
}

impl OrderDetail {
    pub fn new(order: order::Model, items: Vec<order_item::Model>) -> Self {
        let total = order.subtotal + order.delivery_fee;
        Self {
            order,
            items,
            total,
        }
    }
}

/// Per name part; both parts plus a space fit the 160-character column.
const MAX_NAME_CHARS: usize = 79;

/// Nine or ten digits, nothing else.
pub fn is_valid_phone(phone: &str) -> bool {
    (9..=10).contains(&phone.len()) && phone.bytes().all(|b| b.is_ascii_digit())
}

fn validate_customer(payload: &PlaceOrderRequest) -> AppResult<String> {
    let first = payload.first_name.trim();
    let last = payload.last_name.trim();
    if first.is_empty() {
        return Err(AppError::BadRequest("First name is required".to_string()));
    }
    if last.is_empty() {
        return Err(AppError::BadRequest("Last name is required".to_string()));
    }
    if first.chars().count() > MAX_NAME_CHARS || last.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "First and last name may have at most {} characters each",
            MAX_NAME_CHARS
        )));
    }
    if !is_valid_phone(payload.phone.trim()) {
        return Err(AppError::BadRequest(
            "Phone number must have 9 or 10 digits".to_string(),
        ));
    }
    Ok(format!("{} {}", first, last))
}

/// Place an order
pub async fn place_order(
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let customer_name = validate_customer(&payload)?;

    let settings = state.settings.current();
    let store = state.store_location();
    let accepted = evaluate_candidate(store, payload.location, settings.max_delivery_radius_km)?;

    // Authoritative gate, ahead of any catalog lookup
    check_ordering_allowed(&state.clock.now(), &settings)?;

    let items = load_cart(&state, &payload.items).await?;
    let lines: Vec<CartLine> = items.iter().map(PricedItem::line).collect();
    minimum_order(&state).await?.check(&lines)?;

    let subtotal = cart::subtotal(&lines);
    let delivery_fee = FeePolicy::new(store, &settings).compute_fee(subtotal, accepted.coordinate);
    let address = non_blank(Some(payload.address.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| accepted.coordinate.label());

    let txn = state.db.begin().await?;

    let order = order::ActiveModel {
        customer_name: Set(customer_name),
        phone: Set(payload.phone.trim().to_string()),
        address: Set(address),
        latitude: Set(accepted.coordinate.latitude),
        longitude: Set(accepted.coordinate.longitude),
        distance_km: Set(accepted.distance_km),
        status: Set(OrderStatus::Pending),
        verified: Set(false),
        subtotal: Set(subtotal),
        delivery_fee: Set(delivery_fee),
        note: Set(non_blank(payload.note.as_deref()).map(str::to_string)),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut saved_items = Vec::with_capacity(items.len());
    for item in &items {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| AppError::BadRequest("Quantity is too large".to_string()))?;
        let saved = order_item::ActiveModel {
            order_id: Set(order.id),
            article_id: Set(Some(item.article.id)),
            article_name: Set(item.article.name.clone()),
            unit_price: Set(item.article.price),
            quantity: Set(quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        saved_items.push(saved);
    }

    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        %subtotal,
        %delivery_fee,
        distance_km = accepted.distance_km,
        "Order placed"
    );
    state.feed.publish(OrderArrived::from(&order));

    Ok((StatusCode::CREATED, Json(OrderDetail::new(order, saved_items))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_must_be_nine_or_ten_digits() {
        assert!(is_valid_phone("061234567"));
        assert!(is_valid_phone("0612345678"));
        assert!(!is_valid_phone("06123456"));
        assert!(!is_valid_phone("06123456789"));
        assert!(!is_valid_phone("061 234 567"));
        assert!(!is_valid_phone("+38161234"));
    }

    fn request(first: &str, last: &str, phone: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: phone.to_string(),
            address: String::new(),
            location: Coordinate {
                latitude: 43.28,
                longitude: 20.01,
            },
            items: Vec::new(),
            note: None,
        }
    }

    #[test]
    fn customer_name_joins_trimmed_parts() {
        let name = validate_customer(&request(" Ana ", "Jovanović", "0612345678")).unwrap();
        assert_eq!(name, "Ana Jovanović");
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_customer(&request("  ", "Jovanović", "0612345678")).is_err());
        assert!(validate_customer(&request("Ana", "", "0612345678")).is_err());
    }

    #[test]
    fn overlong_names_are_rejected() {
        let long = "a".repeat(MAX_NAME_CHARS + 1);
        assert!(matches!(
            validate_customer(&request(&long, "Jovanović", "0612345678")),
            Err(AppError::BadRequest(_))
        ));

        let longest = "ž".repeat(MAX_NAME_CHARS);
        let name = validate_customer(&request(&longest, &longest, "0612345678")).unwrap();
        assert!(name.chars().count() <= 160);
    }

    fn item(quantity: u32) -> CartItemRequest {
        CartItemRequest {
            article_id: 1,
            quantity,
        }
    }

    #[test]
    fn quantities_are_bounded() {
        assert!(validate_items(&[item(1), item(MAX_LINE_QUANTITY)]).is_ok());
        assert!(validate_items(&[item(0)]).is_err());
        assert!(validate_items(&[item(MAX_LINE_QUANTITY + 1)]).is_err());
        assert!(validate_items(&[item(3_000_000_000)]).is_err());
        assert!(validate_items(&[]).is_err());
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  Njegoševa 5 ")), Some("Njegoševa 5"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
