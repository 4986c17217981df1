use alloy::primitives::{Address, U256};
use fastnum::UD256;

use crate::{abi::ETHER_ADDRESS, num};

use super::OrderSide;

/// Request to post a limit order for the token against native currency.
#[derive(Clone, Copy, derive_more::Debug)]
pub struct OrderRequest {
    side: OrderSide,
    /// Amount of token to buy/sell.
    #[debug("{amount}")]
    amount: UD256,
    /// Price of one token in native currency.
    #[debug("{price}")]
    price: UD256,
}

/// Arguments of the exchange `makeOrder` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderParams {
    pub token_get: Address,
    pub amount_get: U256,
    pub token_give: Address,
    pub amount_give: U256,
}

impl OrderRequest {
    pub fn new(side: OrderSide, amount: UD256, price: UD256) -> Self {
        Self {
            side,
            amount,
            price,
        }
    }

    pub fn buy(amount: UD256, price: UD256) -> Self {
        Self::new(OrderSide::Buy, amount, price)
    }

    pub fn sell(amount: UD256, price: UD256) -> Self {
        Self::new(OrderSide::Sell, amount, price)
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn amount(&self) -> UD256 {
        self.amount
    }

    pub fn price(&self) -> UD256 {
        self.price
    }

    /// Prepare `makeOrder` arguments for the given token, with both legs
    /// converted to 18-decimal fixed point.
    pub fn prepare(&self, token: Address) -> OrderParams {
        let conv = num::Converter::wei();
        let token_leg = conv.to_unsigned(self.amount);
        let ether_leg = conv.to_unsigned(self.amount * self.price);
        match self.side {
            OrderSide::Buy => OrderParams {
                token_get: token,
                amount_get: token_leg,
                token_give: ETHER_ADDRESS,
                amount_give: ether_leg,
            },
            OrderSide::Sell => OrderParams {
                token_get: ETHER_ADDRESS,
                amount_get: ether_leg,
                token_give: token,
                amount_give: token_leg,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use fastnum::udec256;

    use super::*;

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");

    #[test]
    fn test_buy_order_params() {
        let params = OrderRequest::buy(udec256!(100), udec256!(0.02)).prepare(TOKEN);
        assert_eq!(params.token_get, TOKEN);
        assert_eq!(params.amount_get, U256::from(100_000_000_000_000_000_000u128));
        assert_eq!(params.token_give, ETHER_ADDRESS);
        assert_eq!(params.amount_give, U256::from(2_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_sell_order_params() {
        let params = OrderRequest::sell(udec256!(10), udec256!(0.5)).prepare(TOKEN);
        assert_eq!(params.token_get, ETHER_ADDRESS);
        assert_eq!(params.amount_get, U256::from(5_000_000_000_000_000_000u128));
        assert_eq!(params.token_give, TOKEN);
        assert_eq!(params.amount_give, U256::from(10_000_000_000_000_000_000u128));
    }
}
