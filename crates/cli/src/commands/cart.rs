//! Cart commands.
//!
//! The cart document lives at `VELOURE_CART_PATH`. Mutations run through
//! `CartService`, so tracked products reserve against the catalog ledger
//! exactly as any other session would.

use veloure_cart::db::ProductRepository;
use veloure_cart::{
    AddOptions, CartConfig, CartService, CartStore, JsonFileCartStore, PgStockLedger,
};
use veloure_core::{Cart, ProductId};

use super::{CliError, connect};

type CliCart = CartService<PgStockLedger, JsonFileCartStore>;

async fn open(config: &CartConfig) -> Result<CliCart, CliError> {
    let pool = connect(config).await?;
    Ok(CartService::new(
        PgStockLedger::new(pool),
        JsonFileCartStore::new(config.cart_path.clone()),
        config.retry.clone(),
    ))
}

/// Print the cart without contacting the ledger.
///
/// # Errors
///
/// Returns `CliError::Cart` if the cart file cannot be read.
pub fn show(config: &CartConfig) -> Result<(), CliError> {
    let cart = JsonFileCartStore::new(config.cart_path.clone())
        .load()
        .map_err(veloure_cart::CartError::from)?;
    print_cart(&cart);
    Ok(())
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns `CliError::Stock` if the ledger failed and nothing was added.
pub async fn add(
    config: &CartConfig,
    id: ProductId,
    qty: i64,
    source: Option<String>,
) -> Result<(), CliError> {
    let mut service = open(config).await?;
    let product = ProductRepository::new(service.engine().ledger().pool())
        .get(id)
        .await?
        .ok_or(CliError::ProductNotFound(id))?;

    let outcome = service
        .add_to_cart(&product, qty, AddOptions { source })
        .await?;

    #[allow(clippy::print_stdout)]
    {
        if outcome.added_qty > 0 {
            println!("Added {} x {}", outcome.added_qty, product.name);
        } else if outcome.error.is_none() {
            println!("{} is out of stock", product.name);
        }
        if let Some(remaining) = outcome.remaining_stock {
            println!("  {remaining} left in stock");
        }
    }
    print_cart(&outcome.cart);

    match outcome.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Change a line's quantity.
///
/// # Errors
///
/// Returns `CliError::NotInCart` if the product has no line.
/// Returns `CliError::Stock` if the ledger reported a failure.
pub async fn update(config: &CartConfig, id: ProductId, qty: i64) -> Result<(), CliError> {
    let mut service = open(config).await?;
    if !service.cart()?.contains(id) {
        return Err(CliError::NotInCart(id));
    }

    let outcome = service.update_qty(id, qty).await?;
    print_cart(&outcome.cart);

    match outcome.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Remove a line, returning its units to the ledger when possible.
///
/// # Errors
///
/// Returns `CliError::Cart` if the cart cannot be saved.
pub async fn remove(config: &CartConfig, id: ProductId) -> Result<(), CliError> {
    let mut service = open(config).await?;
    let cart = service.remove_from_cart(id).await?;
    print_cart(&cart);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in cart.lines() {
        let stock = line
            .stock
            .map_or_else(|| "untracked".to_string(), |s| format!("{s} left"));
        println!(
            "{:>6}  {:<32} {:>4} x {:<10} = {:<10} ({stock})",
            line.id.to_string(),
            line.name,
            line.qty,
            line.price.to_string(),
            line.line_total().to_string(),
        );
    }
    match cart.subtotal() {
        Some(subtotal) => println!("Subtotal: {subtotal} ({} items)", cart.total_qty()),
        None => println!("{} items (mixed currencies)", cart.total_qty()),
    }
}
