use alloy::primitives::{Address, U256};
use fastnum::UD256;

use crate::{
    abi::{ETHER_ADDRESS, exchange::Exchange},
    num,
};

use super::OrderId;

/// Side of the order from the token's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum OrderSide {
    /// Gives native currency to get token.
    #[display("buy")]
    Buy,

    /// Gives token to get native currency.
    #[display("sell")]
    Sell,
}

/// Order posted to the exchange, immutable once observed.
#[derive(Clone, derive_more::Debug, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    trader: Address,
    token_get: Address,
    #[debug("{amount_get}")]
    amount_get: U256,
    token_give: Address,
    #[debug("{amount_give}")]
    amount_give: U256,
    timestamp: u64,
}

/// Filled order along with the account that filled it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    order: Order,
    filled_by: Address,
}

/// Deposit to or withdrawal from an exchange balance.
#[derive(Clone, derive_more::Debug, PartialEq, Eq)]
pub struct Transfer {
    pub token: Address,
    pub user: Address,
    #[debug("{amount}")]
    pub amount: U256,
    /// Exchange balance of the user after the transfer.
    #[debug("{balance}")]
    pub balance: U256,
}

impl Order {
    pub fn new(
        id: OrderId,
        trader: Address,
        token_get: Address,
        amount_get: U256,
        token_give: Address,
        amount_give: U256,
        timestamp: u64,
    ) -> Self {
        Self {
            id,
            trader,
            token_get,
            amount_get,
            token_give,
            amount_give,
            timestamp,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Account that posted the order.
    pub fn trader(&self) -> Address {
        self.trader
    }

    pub fn token_get(&self) -> Address {
        self.token_get
    }

    pub fn amount_get(&self) -> U256 {
        self.amount_get
    }

    pub fn token_give(&self) -> Address {
        self.token_give
    }

    pub fn amount_give(&self) -> U256 {
        self.amount_give
    }

    /// Block timestamp the order was posted at, in seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn side(&self) -> OrderSide {
        if self.token_give == ETHER_ADDRESS {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Native currency leg of the order, in wei.
    pub fn ether_amount(&self) -> U256 {
        match self.side() {
            OrderSide::Buy => self.amount_give,
            OrderSide::Sell => self.amount_get,
        }
    }

    /// Token leg of the order, in token base units.
    pub fn token_amount(&self) -> U256 {
        match self.side() {
            OrderSide::Buy => self.amount_get,
            OrderSide::Sell => self.amount_give,
        }
    }

    /// Price of one token in native currency.
    pub fn price(&self) -> UD256 {
        num::price(self.ether_amount(), self.token_amount())
    }
}

impl Trade {
    pub fn new(order: Order, filled_by: Address) -> Self {
        Self { order, filled_by }
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn id(&self) -> OrderId {
        self.order.id
    }

    /// Account that filled the order.
    pub fn filled_by(&self) -> Address {
        self.filled_by
    }

    /// Indicates if the account is either side of the trade.
    pub fn involves(&self, account: Address) -> bool {
        self.order.trader == account || self.filled_by == account
    }

    /// Side of the trade as seen by the account, if it participated.
    /// The filler takes the opposite side of the posted order.
    pub fn side_for(&self, account: Address) -> Option<OrderSide> {
        if self.order.trader == account {
            Some(self.order.side())
        } else if self.filled_by == account {
            Some(match self.order.side() {
                OrderSide::Buy => OrderSide::Sell,
                OrderSide::Sell => OrderSide::Buy,
            })
        } else {
            None
        }
    }
}

impl From<&Exchange::Order> for Order {
    fn from(e: &Exchange::Order) -> Self {
        Self::new(
            e.id,
            e.user,
            e.tokenGet,
            e.amountGet,
            e.tokenGive,
            e.amountGive,
            e.timestamp.saturating_to(),
        )
    }
}

impl From<&Exchange::Cancel> for Order {
    fn from(e: &Exchange::Cancel) -> Self {
        Self::new(
            e.id,
            e.user,
            e.tokenGet,
            e.amountGet,
            e.tokenGive,
            e.amountGive,
            e.timestamp.saturating_to(),
        )
    }
}

impl From<&Exchange::Trade> for Trade {
    fn from(e: &Exchange::Trade) -> Self {
        Self::new(
            Order::new(
                e.id,
                e.user,
                e.tokenGet,
                e.amountGet,
                e.tokenGive,
                e.amountGive,
                e.timestamp.saturating_to(),
            ),
            e.userFill,
        )
    }
}

impl From<&Exchange::Deposit> for Transfer {
    fn from(e: &Exchange::Deposit) -> Self {
        Self {
            token: e.token,
            user: e.user,
            amount: e.amount,
            balance: e.balance,
        }
    }
}

impl From<&Exchange::Withdraw> for Transfer {
    fn from(e: &Exchange::Withdraw) -> Self {
        Self {
            token: e.token,
            user: e.user,
            amount: e.amount,
            balance: e.balance,
        }
    }
}
