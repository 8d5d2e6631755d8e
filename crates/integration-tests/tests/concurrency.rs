//! Integration tests for sessions racing for the same stock.
//!
//! The in-memory ledger sleeps before every call so that concurrent
//! reservations interleave between their read and their write.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use veloure_cart::{AddOptions, ReservationEngine};
use veloure_core::ProductId;
use veloure_integration_tests::{ledger_with, product, session, test_policy};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_unit_goes_to_exactly_one_reservation() {
    let bag = product(1, "Leather Weekender", Some(1));
    let ledger = ledger_with(&[&bag]).await;
    ledger.set_latency(Duration::from_millis(10)).await;
    let engine = ReservationEngine::new(Arc::clone(&ledger), test_policy());

    let (a, b) = tokio::join!(engine.reserve(bag.id, 1), engine.reserve(bag.id, 1));

    let mut reserved = [a.reserved, b.reserved];
    reserved.sort_unstable();
    assert_eq!(reserved, [0, 1]);
    assert!(a.error.is_none());
    assert!(b.error.is_none());
    assert_eq!(ledger.stock(bag.id).await, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_shoppers_one_unit() {
    let bag = product(1, "Leather Weekender", Some(1));
    let ledger = ledger_with(&[&bag]).await;
    ledger.set_latency(Duration::from_millis(10)).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let mut shopper = session(&ledger);
            let bag = bag.clone();
            tokio::spawn(async move {
                shopper
                    .add_to_cart(&bag, 1, AddOptions::default())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut added = Vec::new();
    for handle in handles {
        added.push(handle.await.unwrap().added_qty);
    }
    added.sort_unstable();

    assert_eq!(added, vec![0, 1]);
    assert_eq!(ledger.stock(bag.id).await, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_shoppers_never_oversell() {
    let id = ProductId::new(7);
    let scarf = product(7, "Cashmere Scarf", Some(10));
    let ledger = ledger_with(&[&scarf]).await;
    ledger.set_latency(Duration::from_millis(2)).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mut shopper = session(&ledger);
            let scarf = scarf.clone();
            tokio::spawn(async move {
                shopper
                    .add_to_cart(&scarf, 3, AddOptions::default())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut total_added = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        // A shopper's cart holds exactly what it was granted.
        let in_cart = outcome.cart.line(id).map_or(0, |line| line.qty);
        assert_eq!(in_cart, outcome.added_qty);
        total_added += outcome.added_qty;
    }

    let remaining = ledger.stock(id).await.unwrap();
    assert!(total_added <= 10);
    assert_eq!(total_added + remaining, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_release_and_reserve_balance() {
    let id = ProductId::new(3);
    let boots = product(3, "Suede Boots", Some(4));
    let ledger = ledger_with(&[&boots]).await;
    ledger.set_latency(Duration::from_millis(5)).await;
    let engine = ReservationEngine::new(Arc::clone(&ledger), test_policy());

    let (reserve, release) = tokio::join!(engine.reserve(id, 2), engine.release(id, 3));

    let mut expected = 4;
    if reserve.error.is_none() {
        expected -= reserve.reserved;
    }
    if release.error.is_none() {
        expected += 3;
    }
    assert_eq!(ledger.stock(id).await, Some(expected));
}
