use std::{cmp::Ordering, collections::HashSet};

use alloy::primitives::Address;
use fastnum::UD256;
use itertools::Itertools;

use crate::types::{Order, OrderId, OrderSide, Trade};

/// Order history of the exchange, as replayed from Order/Trade/Cancel events.
///
/// Each sequence preserves delivery order, repeated deliveries of the same
/// order are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderLog {
    all: Vec<Order>,
    filled: Vec<Trade>,
    cancelled: Vec<Order>,
    all_loaded: bool,
    filled_loaded: bool,
    cancelled_loaded: bool,
}

/// Open orders split by side, each side sorted by price, highest first.
#[derive(Clone, Debug, Default)]
pub struct OrderBook<'a> {
    pub buy: Vec<&'a Order>,
    pub sell: Vec<&'a Order>,
}

impl OrderLog {
    /// All orders ever posted.
    pub fn all(&self) -> &[Order] {
        &self.all
    }

    pub fn filled(&self) -> &[Trade] {
        &self.filled
    }

    pub fn cancelled(&self) -> &[Order] {
        &self.cancelled
    }

    /// Indicates if the historical log has been loaded for all three kinds.
    pub fn is_loaded(&self) -> bool {
        self.all_loaded && self.filled_loaded && self.cancelled_loaded
    }

    pub(crate) fn set_all(&mut self, orders: Vec<Order>) {
        self.all = orders;
        self.all_loaded = true;
    }

    pub(crate) fn set_filled(&mut self, trades: Vec<Trade>) {
        self.filled = trades;
        self.filled_loaded = true;
    }

    pub(crate) fn set_cancelled(&mut self, orders: Vec<Order>) {
        self.cancelled = orders;
        self.cancelled_loaded = true;
    }

    pub(crate) fn add_order(&mut self, order: Order) -> bool {
        if self.all.iter().any(|o| o.id() == order.id()) {
            return false;
        }
        self.all.push(order);
        true
    }

    pub(crate) fn add_filled(&mut self, trade: Trade) -> bool {
        if self.filled.iter().any(|t| t.id() == trade.id()) {
            return false;
        }
        self.filled.push(trade);
        true
    }

    pub(crate) fn add_cancelled(&mut self, order: Order) -> bool {
        if self.cancelled.iter().any(|o| o.id() == order.id()) {
            return false;
        }
        self.cancelled.push(order);
        true
    }

    fn closed_ids(&self) -> HashSet<OrderId> {
        self.filled
            .iter()
            .map(Trade::id)
            .chain(self.cancelled.iter().map(Order::id))
            .collect()
    }

    /// Orders neither filled nor cancelled, in posting order.
    pub fn open_orders(&self) -> Vec<&Order> {
        let closed = self.closed_ids();
        self.all
            .iter()
            .filter(|o| !closed.contains(&o.id()))
            .collect()
    }

    pub fn order_book(&self) -> OrderBook<'_> {
        let (buy, sell): (Vec<_>, Vec<_>) = self
            .open_orders()
            .into_iter()
            .sorted_by(|a, b| by_price_desc(a.price(), b.price()))
            .partition(|o| o.side() == OrderSide::Buy);
        OrderBook { buy, sell }
    }

    /// Trades, most recent first.
    pub fn trade_history(&self) -> Vec<&Trade> {
        self.filled
            .iter()
            .sorted_by_key(|t| std::cmp::Reverse(t.order().timestamp()))
            .collect()
    }

    /// Price of the most recent trade.
    pub fn last_price(&self) -> Option<UD256> {
        self.filled
            .iter()
            .max_by_key(|t| t.order().timestamp())
            .map(|t| t.order().price())
    }

    /// Open orders posted by the account.
    pub fn open_orders_of(&self, account: Address) -> Vec<&Order> {
        self.open_orders()
            .into_iter()
            .filter(|o| o.trader() == account)
            .collect()
    }

    /// Trades the account took either side of, most recent first.
    pub fn trades_of(&self, account: Address) -> Vec<&Trade> {
        self.trade_history()
            .into_iter()
            .filter(|t| t.involves(account))
            .collect()
    }
}

fn by_price_desc(a: UD256, b: UD256) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
