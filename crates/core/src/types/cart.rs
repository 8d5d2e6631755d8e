//! Cart lines and the cart collection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::ProductId;
use super::price::Price;
use super::quantity::{leading_integer, parse_qty};

/// Catalog data needed to put a product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_ref: Option<String>,
    /// Last known remaining stock. `None` means the product is not inventoried.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl ProductSnapshot {
    /// Whether the ledger tracks stock for this product.
    #[must_use]
    pub const fn tracks_stock(&self) -> bool {
        self.stock.is_some()
    }
}

/// One distinct product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Quantity claimed by this session. Always >= 1.
    pub qty: u32,
    /// Remaining remote stock observed after this line's last reservation.
    ///
    /// `None` means the product is untracked and the reservation protocol
    /// never engages for it.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Create a line from a catalog snapshot.
    ///
    /// `qty` is clamped to at least 1.
    #[must_use]
    pub fn from_product(product: &ProductSnapshot, qty: u32, stock: Option<u32>) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image_ref: product.image_ref.clone(),
            qty: qty.max(1),
            stock,
            added_at: Utc::now(),
        }
    }

    /// Whether the ledger tracks stock for this line.
    #[must_use]
    pub const fn tracks_stock(&self) -> bool {
        self.stock.is_some()
    }

    /// Price of this line (`price * qty`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.line_total(self.qty)
    }
}

/// The ordered collection of cart lines, keyed by product id.
///
/// Insertion order is preserved for display. Deserialization normalizes
/// each line of what a hand-edited or stale file may contain: quantities
/// that are missing, non-numeric or below 1 become 1, negative stock becomes
/// 0, and repeated product ids keep only their first line. A line without a
/// readable product id is dropped; the rest of the cart still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from raw lines, applying the cart invariants.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for mut line in lines {
            if cart.contains(line.id) {
                continue;
            }
            line.qty = line.qty.max(1);
            cart.lines.push(line);
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Look up the line for a product mutably.
    pub fn line_mut(&mut self, id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.id == id)
    }

    /// Whether the cart has a line for this product.
    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.line(id).is_some()
    }

    /// Add `qty` units of a product, creating the line if needed.
    ///
    /// The line's cached stock is replaced with `stock`.
    pub fn merge(&mut self, product: &ProductSnapshot, qty: u32, stock: Option<u32>) {
        if let Some(line) = self.line_mut(product.id) {
            line.qty = line.qty.saturating_add(qty).max(1);
            line.stock = stock;
        } else {
            self.lines.push(CartLine::from_product(product, qty, stock));
        }
    }

    /// Remove the line for a product, returning it if present.
    pub fn remove(&mut self, id: ProductId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| line.id == id)?;
        Some(self.lines.remove(index))
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines (badge count).
    #[must_use]
    pub fn total_qty(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.qty)).sum()
    }

    /// Sum of line totals.
    ///
    /// Returns `None` for an empty cart or when lines are priced in
    /// different currencies.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        let currency = self.lines.first()?.price.currency_code;
        if self
            .lines
            .iter()
            .any(|line| line.price.currency_code != currency)
        {
            return None;
        }
        let amount: Decimal = self.lines.iter().map(|line| line.line_total().amount).sum();
        Some(Price::new(amount, currency))
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Vec<Value>> for Cart {
    fn from(raw: Vec<Value>) -> Self {
        Self::from_lines(
            raw.into_iter()
                .filter_map(|value| serde_json::from_value::<StoredLine>(value).ok())
                .map(CartLine::from)
                .collect(),
        )
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

/// A persisted line before normalization.
#[derive(Deserialize)]
struct StoredLine {
    id: ProductId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: Price,
    #[serde(default)]
    image_ref: Option<String>,
    #[serde(default)]
    qty: Value,
    #[serde(default)]
    stock: Value,
    #[serde(default = "Utc::now")]
    added_at: DateTime<Utc>,
}

impl From<StoredLine> for CartLine {
    fn from(stored: StoredLine) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            price: stored.price,
            image_ref: stored.image_ref,
            qty: stored_qty(&stored.qty),
            stock: stored_stock(&stored.stock),
            added_at: stored.added_at,
        }
    }
}

fn stored_qty(value: &Value) -> u32 {
    match value {
        Value::Number(n) => parse_qty(&n.to_string()),
        Value::String(s) => parse_qty(s),
        _ => 1,
    }
}

/// `null` (or absent) stays untracked; anything else is tracked, floored at 0.
fn stored_stock(value: &Value) -> Option<u32> {
    let text = match value {
        Value::Null => return None,
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Some(0),
    };
    match leading_integer(&text) {
        Some((false, stock)) => Some(u32::try_from(stock).unwrap_or(u32::MAX)),
        _ => Some(0),
    }
}
