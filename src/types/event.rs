use alloy::{primitives::TxHash, sol_types::SolEvent};

use crate::abi::exchange::Exchange::{self, ExchangeEvents};

use super::{Order, Trade, Transfer};

/// Kinds of events emitted by the exchange contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Order,
    Cancel,
    Trade,
    Deposit,
    Withdraw,
}

/// Decoded exchange event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeEvent {
    /// Order posted.
    Order(Order),

    /// Order cancelled by its owner.
    Cancel(Order),

    /// Order filled.
    Trade(Trade),

    /// Funds credited to an exchange balance.
    Deposit(Transfer),

    /// Funds withdrawn from an exchange balance.
    Withdraw(Transfer),
}

/// Event along with transaction context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext<T> {
    pub(crate) tx_hash: TxHash,
    pub(crate) block_number: u64,
    pub(crate) log_index: u64,
    pub(crate) event: T,
}

impl EventKind {
    /// Topic 0 of the logs of this kind.
    pub fn signature_hash(&self) -> alloy::primitives::B256 {
        match self {
            EventKind::Order => Exchange::Order::SIGNATURE_HASH,
            EventKind::Cancel => Exchange::Cancel::SIGNATURE_HASH,
            EventKind::Trade => Exchange::Trade::SIGNATURE_HASH,
            EventKind::Deposit => Exchange::Deposit::SIGNATURE_HASH,
            EventKind::Withdraw => Exchange::Withdraw::SIGNATURE_HASH,
        }
    }
}

impl ExchangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ExchangeEvent::Order(_) => EventKind::Order,
            ExchangeEvent::Cancel(_) => EventKind::Cancel,
            ExchangeEvent::Trade(_) => EventKind::Trade,
            ExchangeEvent::Deposit(_) => EventKind::Deposit,
            ExchangeEvent::Withdraw(_) => EventKind::Withdraw,
        }
    }
}

impl From<ExchangeEvents> for ExchangeEvent {
    fn from(value: ExchangeEvents) -> Self {
        match value {
            ExchangeEvents::Order(e) => ExchangeEvent::Order(Order::from(&e)),
            ExchangeEvents::Cancel(e) => ExchangeEvent::Cancel(Order::from(&e)),
            ExchangeEvents::Trade(e) => ExchangeEvent::Trade(Trade::from(&e)),
            ExchangeEvents::Deposit(e) => ExchangeEvent::Deposit(Transfer::from(&e)),
            ExchangeEvents::Withdraw(e) => ExchangeEvent::Withdraw(Transfer::from(&e)),
        }
    }
}

impl<T> EventContext<T> {
    pub fn new(tx_hash: TxHash, block_number: u64, log_index: u64, event: T) -> Self {
        Self {
            tx_hash,
            block_number,
            log_index,
            event,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    pub fn event(&self) -> &T {
        &self.event
    }

    pub fn into_event(self) -> T {
        self.event
    }

    pub(crate) fn map<O>(self, f: impl FnOnce(T) -> O) -> EventContext<O> {
        EventContext {
            tx_hash: self.tx_hash,
            block_number: self.block_number,
            log_index: self.log_index,
            event: f(self.event),
        }
    }
}
