use alloy::primitives::Address;

use crate::types::Epoch;

use super::{BalanceSnapshot, DepositPhase, OrderLog, StateUpdate, TxAction};

/// Application state, a projection of the wallet account, network,
/// exchange event log and balance reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    epoch: Epoch,
    account: Option<Address>,
    network: Option<u64>,
    token: Option<Address>,
    exchange: Option<Address>,
    balances: BalanceSnapshot,
    balances_loading: bool,
    orders: OrderLog,
    order_cancelling: bool,
    order_filling: bool,
    buy_order_making: bool,
    sell_order_making: bool,
    token_deposit: Option<DepositPhase>,
}

impl AppState {
    /// Binding generation the state is being updated by.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub(crate) fn next_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        self.epoch
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn network(&self) -> Option<u64> {
        self.network
    }

    pub fn token(&self) -> Option<Address> {
        self.token
    }

    pub fn exchange(&self) -> Option<Address> {
        self.exchange
    }

    /// Indicates if both contracts are bound.
    pub fn contracts_loaded(&self) -> bool {
        self.token.is_some() && self.exchange.is_some()
    }

    pub fn balances(&self) -> &BalanceSnapshot {
        &self.balances
    }

    pub fn balances_loading(&self) -> bool {
        self.balances_loading
    }

    pub fn orders(&self) -> &OrderLog {
        &self.orders
    }

    pub fn order_cancelling(&self) -> bool {
        self.order_cancelling
    }

    pub fn order_filling(&self) -> bool {
        self.order_filling
    }

    pub fn buy_order_making(&self) -> bool {
        self.buy_order_making
    }

    pub fn sell_order_making(&self) -> bool {
        self.sell_order_making
    }

    pub fn token_deposit(&self) -> Option<DepositPhase> {
        self.token_deposit
    }

    /// Applies the update.
    pub fn apply(&mut self, update: &StateUpdate) {
        match update {
            StateUpdate::AccountLoaded(account) => {
                if self.account != *account {
                    self.balances = BalanceSnapshot::default();
                    self.token_deposit = None;
                }
                self.account = *account;
            }
            StateUpdate::NetworkLoaded(chain_id) => {
                if self.network != Some(*chain_id) {
                    self.token = None;
                    self.exchange = None;
                    self.orders = OrderLog::default();
                    self.balances = BalanceSnapshot::default();
                }
                self.network = Some(*chain_id);
            }
            StateUpdate::ContractsLoaded { token, exchange } => {
                self.token = Some(*token);
                self.exchange = Some(*exchange);
            }
            StateUpdate::ContractsCleared => {
                self.token = None;
                self.exchange = None;
            }
            StateUpdate::AllOrdersLoaded(orders) => self.orders.set_all(orders.clone()),
            StateUpdate::FilledOrdersLoaded(trades) => self.orders.set_filled(trades.clone()),
            StateUpdate::CancelledOrdersLoaded(orders) => {
                self.orders.set_cancelled(orders.clone())
            }
            StateUpdate::OrderMade(order) => {
                self.buy_order_making = false;
                self.sell_order_making = false;
                self.orders.add_order(order.clone());
            }
            StateUpdate::OrderCancelled(order) => {
                self.order_cancelling = false;
                self.orders.add_cancelled(order.clone());
            }
            StateUpdate::OrderFilled(trade) => {
                self.order_filling = false;
                self.orders.add_filled(trade.clone());
            }
            StateUpdate::Deposited(transfer) => {
                self.balances_loading = false;
                if Some(transfer.user) == self.account && Some(transfer.token) == self.token {
                    self.token_deposit = None;
                }
            }
            StateUpdate::Withdrawn(_) => self.balances_loading = false,
            StateUpdate::BalancesLoaded(balances) => {
                self.balances = *balances;
                self.balances_loading = false;
            }
            StateUpdate::Submitted(action, hash) => match action {
                TxAction::MakeBuyOrder => self.buy_order_making = true,
                TxAction::MakeSellOrder => self.sell_order_making = true,
                TxAction::CancelOrder => self.order_cancelling = true,
                TxAction::FillOrder => self.order_filling = true,
                TxAction::DepositEther | TxAction::WithdrawEther | TxAction::WithdrawToken => {
                    self.balances_loading = true
                }
                TxAction::ApproveToken => {
                    self.token_deposit = Some(DepositPhase::ApprovePending(*hash))
                }
                TxAction::DepositToken => {
                    self.token_deposit = Some(DepositPhase::DepositSubmitted(*hash));
                    self.balances_loading = true;
                }
            },
            StateUpdate::Failed(action) => {
                if matches!(action, TxAction::ApproveToken | TxAction::DepositToken) {
                    self.token_deposit = None;
                }
            }
            StateUpdate::TokenDeposit(phase) => self.token_deposit = Some(*phase),
            StateUpdate::Alert(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{TxHash, U256, address};

    use super::*;
    use crate::{abi::ETHER_ADDRESS, types::Order};

    const ALICE: Address = address!("0x0000000000000000000000000000000000000a11");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");
    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
    const EXCHANGE: Address = address!("0x00000000000000000000000000000000000000bb");

    fn order(id: u64) -> Order {
        Order::new(
            U256::from(id),
            ALICE,
            TOKEN,
            U256::from(100),
            ETHER_ADDRESS,
            U256::from(1),
            id,
        )
    }

    fn loaded() -> AppState {
        let mut state = AppState::default();
        for update in [
            StateUpdate::AccountLoaded(Some(ALICE)),
            StateUpdate::NetworkLoaded(42),
            StateUpdate::ContractsLoaded {
                token: TOKEN,
                exchange: EXCHANGE,
            },
            StateUpdate::AllOrdersLoaded(vec![order(1)]),
            StateUpdate::FilledOrdersLoaded(vec![]),
            StateUpdate::CancelledOrdersLoaded(vec![]),
            StateUpdate::BalancesLoaded(BalanceSnapshot::new(
                U256::from(1),
                U256::from(2),
                U256::from(3),
                U256::from(4),
            )),
        ] {
            state.apply(&update);
        }
        state
    }

    #[test]
    fn test_account_change_clears_balances() {
        let mut state = loaded();
        state.apply(&StateUpdate::AccountLoaded(Some(ALICE)));
        assert_eq!(state.balances().exchange_token, U256::from(4));

        state.apply(&StateUpdate::AccountLoaded(Some(BOB)));
        assert_eq!(state.account(), Some(BOB));
        assert_eq!(*state.balances(), BalanceSnapshot::default());
        assert!(state.contracts_loaded());
    }

    #[test]
    fn test_network_change_clears_contracts_and_orders() {
        let mut state = loaded();
        state.apply(&StateUpdate::NetworkLoaded(42));
        assert!(state.contracts_loaded());
        assert!(state.orders().is_loaded());

        state.apply(&StateUpdate::NetworkLoaded(1));
        assert!(!state.contracts_loaded());
        assert!(!state.orders().is_loaded());
        assert!(state.orders().all().is_empty());
    }

    #[test]
    fn test_pending_flags_cleared_by_events() {
        let mut state = loaded();
        state.apply(&StateUpdate::Submitted(TxAction::MakeBuyOrder, TxHash::ZERO));
        state.apply(&StateUpdate::Submitted(TxAction::CancelOrder, TxHash::ZERO));
        assert!(state.buy_order_making());
        assert!(state.order_cancelling());

        state.apply(&StateUpdate::OrderMade(order(2)));
        state.apply(&StateUpdate::OrderMade(order(2)));
        assert!(!state.buy_order_making());
        assert_eq!(state.orders().all().len(), 2);

        state.apply(&StateUpdate::OrderCancelled(order(1)));
        assert!(!state.order_cancelling());
        assert_eq!(state.orders().open_orders().len(), 1);
    }

    #[test]
    fn test_token_deposit_phases() {
        let mut state = loaded();
        let (approve, deposit) = (TxHash::repeat_byte(1), TxHash::repeat_byte(2));
        state.apply(&StateUpdate::TokenDeposit(DepositPhase::Approving));
        state.apply(&StateUpdate::Submitted(TxAction::ApproveToken, approve));
        assert_eq!(
            state.token_deposit(),
            Some(DepositPhase::ApprovePending(approve))
        );
        state.apply(&StateUpdate::Submitted(TxAction::DepositToken, deposit));
        assert_eq!(
            state.token_deposit(),
            Some(DepositPhase::DepositSubmitted(deposit))
        );
        assert!(state.balances_loading());

        state.apply(&StateUpdate::Deposited(crate::types::Transfer {
            token: TOKEN,
            user: ALICE,
            amount: U256::from(10),
            balance: U256::from(10),
        }));
        assert_eq!(state.token_deposit(), None);
        assert!(!state.balances_loading());
    }
}
