use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::entities::{article, category};
use crate::error::{AppError, AppResult};
use crate::AppState;

// ============ Categories ============

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
}

impl CategoryRequest {
    fn validated_name(&self) -> AppResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Category name is required".to_string()));
        }
        Ok(name.to_string())
    }
}

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<category::Model>>> {
    let categories = category::Entity::find()
        .order_by_asc(category::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<category::Model>)> {
    let name = payload.validated_name()?;

    let duplicate = category::Entity::find()
        .filter(category::Column::Name.eq(name.as_str()))
        .one(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
    }

    let created = category::ActiveModel {
        name: Set(name),
        emoji: Set(payload.emoji.trim().to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(category_id = created.id, name = %created.name, "Category created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<category::Model>> {
    let name = payload.validated_name()?;
    let existing = category::Entity::find_by_id(category_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let mut active: category::ActiveModel = existing.into();
    active.name = Set(name);
    active.emoji = Set(payload.emoji.trim().to_string());
    let updated = active.update(&state.db).await?;

    Ok(Json(updated))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> AppResult<StatusCode> {
    let in_use = article::Entity::find()
        .filter(article::Column::CategoryId.eq(category_id))
        .count(&state.db)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Category still has {} products",
            in_use
        )));
    }

    let result = category::Entity::delete_by_id(category_id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Category not found".to_string()));
    }

    tracing::info!(category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ Products ============

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub addition: String,
    pub category_id: i32,
    pub price: Decimal,
    pub unit: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl ProductRequest {
    async fn validate(&self, state: &AppState) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Product name is required".to_string()));
        }
        if self.price < Decimal::ZERO {
            return Err(AppError::BadRequest("Price cannot be negative".to_string()));
        }
        category::Entity::find_by_id(self.category_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid category".to_string()))?;
        Ok(())
    }

    fn unit(&self) -> String {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or("kom")
            .to_string()
    }
}

/// Products on sale, optionally narrowed to one category.
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<article::Model>>> {
    let mut query = article::Entity::find().filter(article::Column::Available.eq(true));
    if let Some(category_id) = filter.category_id {
        query = query.filter(article::Column::CategoryId.eq(category_id));
    }

    let products = query.order_by_asc(article::Column::Name).all(&state.db).await?;
    Ok(Json(products))
}

/// Every product, including ones taken off sale (admin)
pub async fn list_all_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<article::Model>>> {
    let mut query = article::Entity::find();
    if let Some(category_id) = filter.category_id {
        query = query.filter(article::Column::CategoryId.eq(category_id));
    }

    let products = query.order_by_asc(article::Column::Id).all(&state.db).await?;
    Ok(Json(products))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<(StatusCode, Json<article::Model>)> {
    payload.validate(&state).await?;

    let created = article::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        addition: Set(payload.addition.trim().to_string()),
        category_id: Set(payload.category_id),
        price: Set(payload.price),
        unit: Set(payload.unit()),
        available: Set(payload.available),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(article_id = created.id, name = %created.name, "Product created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(article_id): Path<i32>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<Json<article::Model>> {
    payload.validate(&state).await?;
    let existing = article::Entity::find_by_id(article_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let mut active: article::ActiveModel = existing.into();
    active.name = Set(payload.name.trim().to_string());
    active.addition = Set(payload.addition.trim().to_string());
    active.category_id = Set(payload.category_id);
    active.price = Set(payload.price);
    active.unit = Set(payload.unit());
    active.available = Set(payload.available);
    let updated = active.update(&state.db).await?;

    Ok(Json(updated))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(article_id): Path<i32>,
) -> AppResult<StatusCode> {
    let result = article::Entity::delete_by_id(article_id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    tracing::info!(article_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
