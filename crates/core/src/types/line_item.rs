//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Price, ProductId, Quantity};

/// A product entry in the cart together with its quantity.
///
/// This is the persisted shape of a cart line:
///
/// ```json
/// {"id": "p1", "title": "Shirt", "image_url": "https://...", "price": 10, "quantity": 2}
/// ```
///
/// `imageUrl` is accepted in place of `image_url` when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product identifier, unique within a cart.
    pub id: ProductId,
    /// Display name.
    pub title: String,
    /// Display image reference.
    #[serde(alias = "imageUrl")]
    pub image_url: String,
    /// Unit price.
    pub price: Price,
    /// Number of units, never zero.
    pub quantity: Quantity,
}

impl LineItem {
    /// Returns a copy of this line with a different quantity.
    #[must_use]
    pub fn with_quantity(&self, quantity: Quantity) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }

    /// Unit price multiplied by quantity.
    #[must_use]
    pub fn line_price(&self) -> Decimal {
        self.price.times(self.quantity.get())
    }
}

/// A product about to be added to the cart.
///
/// Carries everything a [`LineItem`] does except the quantity, which the
/// cart always sets to one on insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub title: String,
    /// Display image reference.
    #[serde(alias = "imageUrl")]
    pub image_url: String,
    /// Unit price.
    pub price: Price,
}

impl NewLineItem {
    /// Create a new candidate line.
    #[must_use]
    pub fn new(
        id: ProductId,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: Price,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            image_url: image_url.into(),
            price,
        }
    }

    /// Turn the candidate into a line with a quantity of one.
    #[must_use]
    pub fn into_line_item(self) -> LineItem {
        LineItem {
            id: self.id,
            title: self.title,
            image_url: self.image_url,
            price: self.price,
            quantity: Quantity::ONE,
        }
    }
}

/// Drops the quantity.
impl From<LineItem> for NewLineItem {
    fn from(item: LineItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            image_url: item.image_url,
            price: item.price,
        }
    }
}
