//! JSON file cart store.
//!
//! The cart is one JSON array. Saves write a sibling temporary file and
//! rename it over the cart file, so readers see either the old cart or the
//! new one, never a partial write.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use veloure_core::Cart;

use super::{CartStore, StoreError};

/// Cart store backed by a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileCartStore {
    path: PathBuf,
}

impl JsonFileCartStore {
    /// Create a store at `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cart document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CartStore for JsonFileCartStore {
    fn load(&self) -> Result<Cart, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Cart::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Cart::new());
        }

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => Ok(cart),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable cart file, starting with an empty cart"
                );
                Ok(Cart::new())
            }
        }
    }

    fn save(&mut self, cart: &Cart) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(cart)?;
        let temp = self.temp_path();
        fs::write(&temp, body)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use veloure_core::{CurrencyCode, Price, ProductId, ProductSnapshot};

    use super::*;

    fn scarf() -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(11),
            name: "Silk Scarf".to_string(),
            price: Price::new(Decimal::new(4500, 2), CurrencyCode::USD),
            image_ref: Some("scarf.jpg".to_string()),
            stock: Some(4),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartStore::new(dir.path().join("cart.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileCartStore::new(dir.path().join("nested/cart.json"));
        let mut cart = Cart::new();
        cart.merge(&scarf(), 2, Some(2));

        store.save(&cart).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, cart);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileCartStore::new(&path);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_non_array_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        fs::write(&path, r#"{"items": []}"#).unwrap();

        let store = JsonFileCartStore::new(&path);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_one_malformed_line_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        fs::write(
            &path,
            r#"[
                {"id": 11, "name": "Silk Scarf", "price": {"amount": "45.00", "currency_code": "USD"}, "qty": 3, "stock": 2},
                {"id": 12, "name": "Wool Beret", "price": {"amount": "30.00", "currency_code": "USD"}, "qty": -1, "stock": 5}
            ]"#,
        )
        .unwrap();
        let mut store = JsonFileCartStore::new(&path);

        let cart = store.load().unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.line(ProductId::new(11)).unwrap().qty, 3);
        assert_eq!(cart.line(ProductId::new(12)).unwrap().qty, 1);

        // Saving the repaired cart keeps both tracked lines.
        store.save(&cart).unwrap();
        assert_eq!(store.load().unwrap(), cart);
    }

    #[test]
    fn test_save_replaces_whole_cart() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileCartStore::new(dir.path().join("cart.json"));
        let mut cart = Cart::new();
        cart.merge(&scarf(), 1, Some(3));
        store.save(&cart).unwrap();

        store.save(&Cart::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
    }
}
