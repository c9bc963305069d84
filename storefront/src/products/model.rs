//! Product aggregate and its write inputs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

/// Stored product image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub url: String,
}

/// A product with its category and images
///
/// This is also the snapshot embedded in order line items, so its serialized
/// form is part of the stored order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Image to attach to a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    pub filename: String,
    pub url: String,
}

/// Input for inserting a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category_id: i64,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

impl NewProduct {
    pub(crate) fn validate(&self) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Insert;
        if self.title.trim().is_empty() {
            return Err(RepositoryError::validation_failed(operation, "title is required"));
        }
        validate_price(operation, self.price)?;
        validate_category(operation, self.category_id)
    }
}

/// Partial product update
///
/// `None` leaves a field unchanged; `Some` sets it, including to an empty
/// string or zero. `images: Some(..)` replaces the whole image set.
///
/// ```rust
/// use storefront::products::ProductUpdate;
///
/// let patch = ProductUpdate::default().price(150.0);
/// assert!(patch.title.is_none());
/// assert_eq!(patch.price, Some(150.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i64>,
    pub images: Option<Vec<NewImage>>,
}

impl ProductUpdate {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn images(mut self, images: Vec<NewImage>) -> Self {
        self.images = Some(images);
        self
    }

    pub(crate) fn validate(&self) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Update;
        if let Some(price) = self.price {
            validate_price(operation, price)?;
        }
        if let Some(category_id) = self.category_id {
            validate_category(operation, category_id)?;
        }
        Ok(())
    }
}

fn validate_price(operation: RepositoryOperation, price: f64) -> RepositoryResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(RepositoryError::validation_failed(
            operation,
            format!("price must be a non-negative number, got {price}"),
        ));
    }
    Ok(())
}

fn validate_category(operation: RepositoryOperation, category_id: i64) -> RepositoryResult<()> {
    if category_id <= 0 {
        return Err(RepositoryError::validation_failed(
            operation,
            format!("category id must be positive, got {category_id}"),
        ));
    }
    Ok(())
}
