//! Transaction dispatching.
//!
//! Every operation requires a wallet account and is reported to the store
//! as soon as the transaction hash is known. Confirmations are not awaited,
//! their effects arrive through the event subscription.

use alloy::primitives::{Address, TxHash, U256};
use fastnum::UD256;
use tracing::{info, warn};

use crate::{
    binding::Contracts,
    error::ExchangeError,
    num,
    state::{Alert, DepositPhase, StateUpdate, Store, TxAction},
    types::{OrderId, OrderRequest, OrderSide},
};

/// Submits exchange transactions on behalf of the store's wallet account.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    store: Store,
    contracts: Contracts,
}

impl Dispatcher {
    pub fn new(store: Store, contracts: Contracts) -> Self {
        Self { store, contracts }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Posts a buy or sell order for the token.
    pub async fn make_order(&self, request: OrderRequest) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let action = match request.side() {
            OrderSide::Buy => TxAction::MakeBuyOrder,
            OrderSide::Sell => TxAction::MakeSellOrder,
        };
        let params = request.prepare(self.contracts.token.address());
        let result = self.contracts.exchange.make_order(from, params).await;
        self.report(action, result).await
    }

    pub async fn make_buy_order(
        &self,
        amount: UD256,
        price: UD256,
    ) -> Result<TxHash, ExchangeError> {
        self.make_order(OrderRequest::buy(amount, price)).await
    }

    pub async fn make_sell_order(
        &self,
        amount: UD256,
        price: UD256,
    ) -> Result<TxHash, ExchangeError> {
        self.make_order(OrderRequest::sell(amount, price)).await
    }

    pub async fn cancel_order(&self, id: OrderId) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let result = self.contracts.exchange.cancel_order(from, id).await;
        self.report(TxAction::CancelOrder, result).await
    }

    /// Fills the order, paying the fee quoted by the exchange for the account.
    pub async fn fill_order(&self, id: OrderId) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let result = match self.contracts.exchange.calc_fee(from).await {
            Ok(fee) => self.contracts.exchange.fill_order(from, id, fee).await,
            Err(e) => Err(e),
        };
        self.report(TxAction::FillOrder, result).await
    }

    pub async fn deposit_ether(&self, amount: UD256) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let result = self
            .contracts
            .exchange
            .deposit_ether(from, to_wei(amount))
            .await;
        self.report(TxAction::DepositEther, result).await
    }

    pub async fn withdraw_ether(&self, amount: UD256) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let result = self
            .contracts
            .exchange
            .withdraw_ether(from, to_wei(amount))
            .await;
        self.report(TxAction::WithdrawEther, result).await
    }

    /// Approves the exchange to spend the amount of token, then deposits it.
    ///
    /// The deposit is submitted as soon as the approval hash is known,
    /// without waiting for the approval to be confirmed.
    ///
    /// Returns the deposit transaction hash.
    pub async fn deposit_token(&self, amount: UD256) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let (token, exchange) = (
            self.contracts.token.address(),
            self.contracts.exchange.address(),
        );
        let amount = to_wei(amount);

        self.store
            .dispatch(StateUpdate::TokenDeposit(DepositPhase::Approving))
            .await;
        let approve = self.contracts.token.approve(from, exchange, amount).await;
        self.report(TxAction::ApproveToken, approve).await?;

        let result = self
            .contracts
            .exchange
            .deposit_token(from, token, amount)
            .await;
        self.report(TxAction::DepositToken, result).await
    }

    pub async fn withdraw_token(&self, amount: UD256) -> Result<TxHash, ExchangeError> {
        let from = self.require_account().await?;
        let result = self
            .contracts
            .exchange
            .withdraw_token(from, self.contracts.token.address(), to_wei(amount))
            .await;
        self.report(TxAction::WithdrawToken, result).await
    }

    async fn require_account(&self) -> Result<Address, ExchangeError> {
        match self.store.account().await {
            Some(account) => Ok(account),
            None => {
                self.store
                    .dispatch(StateUpdate::Alert(Alert::PleaseLogin))
                    .await;
                Err(ExchangeError::AccountMissing)
            }
        }
    }

    async fn report(
        &self,
        action: TxAction,
        result: Result<TxHash, ExchangeError>,
    ) -> Result<TxHash, ExchangeError> {
        match &result {
            Ok(hash) => {
                info!(%action, %hash, "Transaction submitted");
                self.store
                    .dispatch(StateUpdate::Submitted(action, *hash))
                    .await;
            }
            Err(e) => {
                warn!(%action, %e, "Transaction failed");
                self.store.dispatch(StateUpdate::Failed(action)).await;
                self.store
                    .dispatch(StateUpdate::Alert(Alert::TransactionFailed(
                        action,
                        e.to_string(),
                    )))
                    .await;
            }
        }
        result
    }
}

fn to_wei(amount: UD256) -> U256 {
    num::Converter::wei().to_unsigned(amount)
}
