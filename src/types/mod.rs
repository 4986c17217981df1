mod event;
mod order;
mod request;

pub use event::*;
pub use order::{Order, OrderSide, Trade, Transfer};
pub use request::{OrderParams, OrderRequest};

use alloy::primitives::U256;

/// Exchange-assigned ID of an order, unique for the exchange deployment.
pub type OrderId = U256;

/// Generation of the contract binding updates are tagged with.
pub type Epoch = u64;
