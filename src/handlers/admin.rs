use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use futures::stream::{self, Stream};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, Iterable, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::delivery::geo::{self, Coordinate, EtaRange};
use crate::delivery::settings::DeliverySettings;
use crate::entities::order::{self, OrderStatus};
use crate::entities::{article, order_item};
use crate::error::{AppError, AppResult};
use crate::handlers::checkout::OrderDetail;
use crate::services::notifications::AlertStatus;
use crate::AppState;

// ============ Dashboard ============

/// Products listed in each top-sellers ranking.
pub const TOP_PRODUCTS: usize = 5;

#[derive(Debug, FromQueryResult)]
pub struct StatusTotals {
    pub status: OrderStatus,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, FromQueryResult)]
struct PeriodTotals {
    orders: i64,
    revenue: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromQueryResult)]
pub struct ProductSales {
    pub article_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub orders: i64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub today_orders: i64,
    pub today_revenue: Decimal,
    /// Every status, zero when no order has it.
    pub orders_by_status: Vec<StatusCount>,
    pub top_by_quantity: Vec<ProductSales>,
    pub top_by_revenue: Vec<ProductSales>,
    pub available_products: u64,
    pub total_products: u64,
}

impl DashboardStats {
    /// Revenue counts order totals (subtotal plus delivery fee) of every order.
    pub fn build(
        by_status: &[StatusTotals],
        today_orders: i64,
        today_revenue: Decimal,
        sales: &[ProductSales],
        available_products: u64,
        total_products: u64,
    ) -> Self {
        let total_orders: i64 = by_status.iter().map(|row| row.orders).sum();
        let total_revenue: Decimal = by_status.iter().map(|row| row.revenue).sum();
        let average_order_value = if total_orders > 0 {
            (total_revenue / Decimal::from(total_orders)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let orders_by_status = OrderStatus::iter()
            .map(|status| StatusCount {
                status,
                orders: by_status
                    .iter()
                    .filter(|row| row.status == status)
                    .map(|row| row.orders)
                    .sum(),
            })
            .collect();

        let mut top_by_quantity = sales.to_vec();
        top_by_quantity.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.article_name.cmp(&b.article_name))
        });
        top_by_quantity.truncate(TOP_PRODUCTS);

        let mut top_by_revenue = sales.to_vec();
        top_by_revenue.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then_with(|| a.article_name.cmp(&b.article_name))
        });
        top_by_revenue.truncate(TOP_PRODUCTS);

        Self {
            total_orders,
            total_revenue,
            average_order_value,
            today_orders,
            today_revenue,
            orders_by_status,
            top_by_quantity,
            top_by_revenue,
            available_products,
            total_products,
        }
    }
}

/// Store-local midnight that starts the day containing `now`.
pub fn start_of_day(now: DateTime<Tz>) -> DateTime<FixedOffset> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(now.timezone()).earliest())
        .unwrap_or(now)
        .fixed_offset()
}

fn order_total_sum() -> SimpleExpr {
    Func::sum(Expr::col(order::Column::Subtotal).add(Expr::col(order::Column::DeliveryFee))).into()
}

/// Sales figures for the admin overview
pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let by_status = order::Entity::find()
        .select_only()
        .column(order::Column::Status)
        .column_as(order::Column::Id.count(), "orders")
        .column_as(order_total_sum(), "revenue")
        .group_by(order::Column::Status)
        .into_model::<StatusTotals>()
        .all(&state.db)
        .await?;

    let today = order::Entity::find()
        .select_only()
        .column_as(order::Column::Id.count(), "orders")
        .column_as(order_total_sum(), "revenue")
        .filter(order::Column::CreatedAt.gte(start_of_day(state.clock.now())))
        .into_model::<PeriodTotals>()
        .one(&state.db)
        .await?
        .unwrap_or(PeriodTotals {
            orders: 0,
            revenue: None,
        });

    let sales = order_item::Entity::find()
        .select_only()
        .column(order_item::Column::ArticleName)
        .column_as(
            SimpleExpr::from(Func::sum(Expr::col(order_item::Column::Quantity))),
            "quantity",
        )
        .column_as(
            SimpleExpr::from(Func::sum(
                Expr::col(order_item::Column::UnitPrice)
                    .mul(Expr::col(order_item::Column::Quantity)),
            )),
            "revenue",
        )
        .group_by(order_item::Column::ArticleName)
        .into_model::<ProductSales>()
        .all(&state.db)
        .await?;

    let available_products = article::Entity::find()
        .filter(article::Column::Available.eq(true))
        .count(&state.db)
        .await?;
    let total_products = article::Entity::find().count(&state.db).await?;

    Ok(Json(DashboardStats::build(
        &by_status,
        today.orders,
        today.revenue.unwrap_or(Decimal::ZERO),
        &sales,
        available_products,
        total_products,
    )))
}

// ============ Order Management ============

#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

async fn find_order(state: &AppState, order_id: i32) -> AppResult<order::Model> {
    order::Entity::find_by_id(order_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// List orders, newest first (admin)
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<OrderDetail>>> {
    let mut query = order::Entity::find();
    if let Some(status) = filter.status {
        query = query.filter(order::Column::Status.eq(status));
    }
    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
    for item in order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .all(&state.db)
        .await?
    {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let responses = orders
        .into_iter()
        .map(|o| {
            let items = items_by_order.remove(&o.id).unwrap_or_default();
            OrderDetail::new(o, items)
        })
        .collect();

    Ok(Json(responses))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> AppResult<Json<OrderDetail>> {
    let order = find_order(&state, order_id).await?;
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(&state.db)
        .await?;

    Ok(Json(OrderDetail::new(order, items)))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> AppResult<StatusCode> {
    let result = order::Entity::delete_by_id(order_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    tracing::info!(order_id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<order::Model>> {
    let order = find_order(&state, order_id).await?;
    let previous = order.status;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(payload.status);
    let updated = active.update(&state.db).await?;

    tracing::info!(order_id, from = ?previous, to = ?updated.status, "Order status changed");
    Ok(Json(updated))
}

/// Mark the customer's phone number as confirmed
pub async fn verify_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> AppResult<Json<order::Model>> {
    let order = find_order(&state, order_id).await?;
    if order.verified {
        return Ok(Json(order));
    }

    let mut active: order::ActiveModel = order.into();
    active.verified = Set(true);
    let updated = active.update(&state.db).await?;

    Ok(Json(updated))
}

// ============ Delivery Route ============

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub from_lat: Option<f64>,
    pub from_lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub order_id: i32,
    pub from: Coordinate,
    /// False when measured from a driver position instead of the store.
    pub from_store: bool,
    pub to: Coordinate,
    pub address: String,
    pub distance_km: f64,
    pub eta_minutes: EtaRange,
}

/// Straight-line distance from the store, or from the driver's current
/// position when given, to the customer.
pub fn route_origin(store: Coordinate, query: &RouteQuery) -> AppResult<(Coordinate, bool)> {
    match (query.from_lat, query.from_lng) {
        (None, None) => Ok((store, true)),
        (Some(latitude), Some(longitude)) => {
            let from = Coordinate::new(latitude, longitude)
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Ok((from, false))
        }
        _ => Err(AppError::BadRequest(
            "from_lat and from_lng must be given together".to_string(),
        )),
    }
}

pub async fn order_route(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Query(query): Query<RouteQuery>,
) -> AppResult<Json<RouteResponse>> {
    let (from, from_store) = route_origin(state.store_location(), &query)?;
    let order = find_order(&state, order_id).await?;

    let to = Coordinate::new(order.latitude, order.longitude)
        .map_err(|e| AppError::Internal(format!("Order {} has {}", order.id, e)))?;
    let distance_km = geo::distance_km(from, to);

    Ok(Json(RouteResponse {
        order_id: order.id,
        from,
        from_store,
        to,
        address: order.address,
        distance_km,
        eta_minutes: geo::estimated_minutes(distance_km),
    }))
}

// ============ Delivery Settings ============

pub async fn get_settings(State(state): State<AppState>) -> Json<DeliverySettings> {
    Json(state.settings.current())
}

/// Validated, persisted, then applied. A rejected save leaves the live
/// settings untouched.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<DeliverySettings>,
) -> AppResult<Json<DeliverySettings>> {
    let saved = state.settings.save(payload).await?;
    Ok(Json(saved))
}

// ============ Live Orders & Alert ============

/// Server-sent stream of newly placed orders
pub async fn order_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(arrived) => {
                    let data = serde_json::to_string(&arrived).unwrap_or_default();
                    let event = Event::default().event("order").data(data);
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Order stream client lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn alert_status(State(state): State<AppState>) -> Json<AlertStatus> {
    Json(state.alert.status())
}

#[derive(Debug, Serialize)]
pub struct AcknowledgeResponse {
    pub acknowledged: bool,
}

pub async fn acknowledge_alert(State(state): State<AppState>) -> Json<AcknowledgeResponse> {
    Json(AcknowledgeResponse {
        acknowledged: state.alert.acknowledge(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE: Coordinate = Coordinate {
        latitude: 43.276415,
        longitude: 20.011664,
    };

    fn totals(status: OrderStatus, orders: i64, revenue: i64) -> StatusTotals {
        StatusTotals {
            status,
            orders,
            revenue: Decimal::from(revenue),
        }
    }

    fn sold(name: &str, quantity: i64, revenue: i64) -> ProductSales {
        ProductSales {
            article_name: name.to_string(),
            quantity,
            revenue: Decimal::from(revenue),
        }
    }

    #[test]
    fn dashboard_sums_orders_and_ranks_products() {
        let by_status = [
            totals(OrderStatus::Pending, 2, 3000),
            totals(OrderStatus::Delivered, 1, 2000),
        ];
        let sales = [
            sold("Hleb", 10, 600),
            sold("Mleko", 4, 560),
            sold("Kafa", 1, 900),
            sold("Jaja", 3, 450),
            sold("Sir", 2, 1400),
            sold("Voda", 6, 300),
        ];

        let stats = DashboardStats::build(&by_status, 1, Decimal::from(1500), &sales, 40, 45);

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, Decimal::from(5000));
        assert_eq!(stats.average_order_value, Decimal::new(166667, 2));
        assert_eq!(stats.today_orders, 1);
        assert_eq!(stats.available_products, 40);

        assert_eq!(stats.orders_by_status.len(), OrderStatus::iter().count());
        let cancelled = stats
            .orders_by_status
            .iter()
            .find(|count| count.status == OrderStatus::Cancelled)
            .unwrap();
        assert_eq!(cancelled.orders, 0);

        let by_quantity: Vec<&str> = stats
            .top_by_quantity
            .iter()
            .map(|p| p.article_name.as_str())
            .collect();
        assert_eq!(by_quantity, ["Hleb", "Voda", "Mleko", "Jaja", "Sir"]);

        let by_revenue: Vec<&str> = stats
            .top_by_revenue
            .iter()
            .map(|p| p.article_name.as_str())
            .collect();
        assert_eq!(by_revenue, ["Sir", "Kafa", "Hleb", "Mleko", "Jaja"]);
    }

    #[test]
    fn empty_dashboard_has_zero_average() {
        let stats = DashboardStats::build(&[], 0, Decimal::ZERO, &[], 0, 0);
        assert_eq!(stats.average_order_value, Decimal::ZERO);
        assert!(stats.top_by_revenue.is_empty());
        assert!(stats.orders_by_status.iter().all(|count| count.orders == 0));
    }

    #[test]
    fn day_starts_at_store_midnight() {
        use chrono::TimeZone;

        let now = chrono_tz::Europe::Belgrade
            .with_ymd_and_hms(2025, 3, 14, 0, 30, 0)
            .unwrap();
        let start = start_of_day(now);
        assert_eq!(start.to_rfc3339(), "2025-03-14T00:00:00+01:00");
    }

    #[test]
    fn route_defaults_to_store() {
        let query = RouteQuery {
            from_lat: None,
            from_lng: None,
        };
        assert_eq!(route_origin(STORE, &query).unwrap(), (STORE, true));
    }

    #[test]
    fn route_from_driver_position() {
        let query = RouteQuery {
            from_lat: Some(43.28),
            from_lng: Some(20.02),
        };
        let (from, from_store) = route_origin(STORE, &query).unwrap();
        assert!(!from_store);
        assert_eq!(from.latitude, 43.28);
    }

    #[test]
    fn route_rejects_half_a_position() {
        let query = RouteQuery {
            from_lat: Some(43.28),
            from_lng: None,
        };
        assert!(matches!(
            route_origin(STORE, &query),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn route_rejects_invalid_position() {
        let query = RouteQuery {
            from_lat: Some(95.0),
            from_lng: Some(20.0),
        };
        assert!(route_origin(STORE, &query).is_err());
    }
}
