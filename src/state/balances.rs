use std::fmt;

use alloy::primitives::U256;
use fastnum::UD256;

use crate::num;

/// Balances of the active account, always read as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Native currency held by the wallet, in wei.
    pub wallet_ether: U256,

    /// Token held by the wallet, in base units.
    pub wallet_token: U256,

    /// Native currency deposited to the exchange, in wei.
    pub exchange_ether: U256,

    /// Token deposited to the exchange, in base units.
    pub exchange_token: U256,
}

impl BalanceSnapshot {
    pub fn new(
        wallet_ether: U256,
        wallet_token: U256,
        exchange_ether: U256,
        exchange_token: U256,
    ) -> Self {
        Self {
            wallet_ether,
            wallet_token,
            exchange_ether,
            exchange_token,
        }
    }

    /// Balances in whole units, in the order wallet ether, wallet token,
    /// exchange ether, exchange token.
    pub fn units(&self) -> [UD256; 4] {
        let conv = num::Converter::wei();
        [
            conv.from_unsigned(self.wallet_ether),
            conv.from_unsigned(self.wallet_token),
            conv.from_unsigned(self.exchange_ether),
            conv.from_unsigned(self.exchange_token),
        ]
    }
}

impl fmt::Display for BalanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [wallet_ether, wallet_token, exchange_ether, exchange_token] = self.units();
        write!(
            f,
            "wallet: {wallet_ether} ETH, {wallet_token} token; exchange: {exchange_ether} ETH, {exchange_token} token"
        )
    }
}
