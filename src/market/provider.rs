use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::market::book::Book;
use crate::types::{MarketMeta, Order, PriceSample};

// ─── Consumed interfaces (venue-neutral) ────────────────────────────────────

/// Market-data side of a venue. Implementations live outside the core
/// (REST/WS adapters); the tick engine only sees these calls.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Top-N book for one outcome token. Called per market per tick.
    async fn get_orderbook(&self, token_id: &str) -> Result<Book>;

    /// Markets currently listed for trading.
    async fn active_markets(&self) -> Result<Vec<MarketMeta>>;

    /// Market lookup by condition id.
    async fn get_market(&self, condition_id: &str) -> Result<MarketMeta>;

    /// Latest reference-exchange observation for an asset.
    async fn reference_price(&self, asset: &str) -> Result<PriceSample>;

    /// Mid of one token's book. Defaults to a fresh book fetch.
    async fn get_mid(&self, token_id: &str) -> Result<f64> {
        Ok(self.get_orderbook(token_id).await?.mid())
    }

    /// Quoted spread of one token's book. Defaults to a fresh book fetch.
    async fn get_spread(&self, token_id: &str) -> Result<f64> {
        Ok(self.get_orderbook(token_id).await?.spread())
    }
}

/// Routing result from the venue.
#[derive(Clone, Debug)]
pub struct PlaceAck {
    pub success: bool,
    pub venue_order_id: Option<String>,
    pub err_msg: Option<String>,
}

/// Venue-held position, used by reconciliation.
#[derive(Clone, Debug)]
pub struct ExternalPosition {
    pub token_id: String,
    pub size: f64,
    pub avg_price: f64,
}

/// Order-routing side of a venue.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    async fn place(&self, order: &Order) -> Result<PlaceAck>;
    async fn cancel(&self, venue_order_id: &str) -> Result<bool>;
    async fn cancel_all(&self, symbol: &str) -> Result<bool>;
    async fn get_positions(&self) -> Result<Vec<ExternalPosition>>;
}

// ─── Simulated venue (paper mode + tests) ───────────────────────────────────

#[derive(Default)]
struct SimInner {
    markets: Vec<MarketMeta>,
    books: HashMap<String, Book>,
    refs: HashMap<String, PriceSample>,
    failing_tokens: HashSet<String>,
    placed: Vec<Order>,
    cancelled: Vec<String>,
    cancel_all_calls: u32,
}

/// In-memory venue double. Books and reference prices are injected by the
/// test or the paper-mode driver; routing always acks.
pub struct SimulatedVenue {
    inner: Mutex<SimInner>,
}

impl SimulatedVenue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SimInner::default()),
        }
    }

    pub fn add_market(&self, meta: MarketMeta) {
        self.inner.lock().unwrap().markets.push(meta);
    }

    pub fn set_book(&self, token_id: &str, book: Book) {
        self.inner.lock().unwrap().books.insert(token_id.to_string(), book);
    }

    pub fn remove_book(&self, token_id: &str) {
        self.inner.lock().unwrap().books.remove(token_id);
    }

    pub fn set_reference(&self, asset: &str, price: f64, volume: f64, ts_ms: i64) {
        self.inner.lock().unwrap().refs.insert(
            asset.to_string(),
            PriceSample { price, volume, ts_ms },
        );
    }

    /// Make `get_orderbook` fail for a token (simulates transient I/O).
    pub fn fail_token(&self, token_id: &str) {
        self.inner.lock().unwrap().failing_tokens.insert(token_id.to_string());
    }

    pub fn heal_token(&self, token_id: &str) {
        self.inner.lock().unwrap().failing_tokens.remove(token_id);
    }

    pub fn placed_orders(&self) -> Vec<Order> {
        self.inner.lock().unwrap().placed.clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled.clone()
    }

    pub fn cancel_all_calls(&self) -> u32 {
        self.inner.lock().unwrap().cancel_all_calls
    }
}

#[async_trait]
impl MarketDataProvider for SimulatedVenue {
    async fn get_orderbook(&self, token_id: &str) -> Result<Book> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_tokens.contains(token_id) {
            return Err(anyhow!("connection reset fetching book for {token_id}"));
        }
        inner
            .books
            .get(token_id)
            .cloned()
            .ok_or_else(|| anyhow!("no book for token {token_id}"))
    }

    async fn active_markets(&self) -> Result<Vec<MarketMeta>> {
        Ok(self.inner.lock().unwrap().markets.clone())
    }

    async fn get_market(&self, condition_id: &str) -> Result<MarketMeta> {
        self.inner
            .lock()
            .unwrap()
            .markets
            .iter()
            .find(|m| m.condition_id == condition_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown condition {condition_id}"))
    }

    async fn reference_price(&self, asset: &str) -> Result<PriceSample> {
        self.inner
            .lock()
            .unwrap()
            .refs
            .get(asset)
            .copied()
            .ok_or_else(|| anyhow!("no reference price for {asset}"))
    }
}

#[async_trait]
impl OrderRouter for SimulatedVenue {
    async fn place(&self, order: &Order) -> Result<PlaceAck> {
        let mut inner = self.inner.lock().unwrap();
        inner.placed.push(order.clone());
        Ok(PlaceAck {
            success: true,
            venue_order_id: Some(format!("sim-{}", order.id)),
            err_msg: None,
        })
    }

    async fn cancel(&self, venue_order_id: &str) -> Result<bool> {
        self.inner
            .lock()
            .unwrap()
            .cancelled
            .push(venue_order_id.to_string());
        Ok(true)
    }

    async fn cancel_all(&self, _symbol: &str) -> Result<bool> {
        self.inner.lock().unwrap().cancel_all_calls += 1;
        Ok(true)
    }

    async fn get_positions(&self) -> Result<Vec<ExternalPosition>> {
        Ok(Vec::new())
    }
}
