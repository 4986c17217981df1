use alloy::primitives::{Address, TxHash};

use crate::types::{Order, Trade, Transfer};

use super::BalanceSnapshot;

/// State-changing transaction kinds the client submits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TxAction {
    #[display("make buy order")]
    MakeBuyOrder,
    #[display("make sell order")]
    MakeSellOrder,
    #[display("cancel order")]
    CancelOrder,
    #[display("fill order")]
    FillOrder,
    #[display("deposit ether")]
    DepositEther,
    #[display("withdraw ether")]
    WithdrawEther,
    #[display("approve token")]
    ApproveToken,
    #[display("deposit token")]
    DepositToken,
    #[display("withdraw token")]
    WithdrawToken,
}

/// Progress of the two-step token deposit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositPhase {
    /// Allowance approval requested from the wallet.
    Approving,

    /// Approval submitted, deposit about to be requested.
    ApprovePending(TxHash),

    /// Deposit submitted, waiting for the Deposit event.
    DepositSubmitted(TxHash),
}

/// User-facing signal.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Alert {
    #[display("Please install a wallet provider")]
    InstallWallet,

    #[display("Please login with your wallet")]
    PleaseLogin,

    #[display("Please login/switch network with your wallet")]
    ConnectOrSwitchNetwork,

    #[display("There was an error! ({_0}: {_1})")]
    TransactionFailed(TxAction, String),
}

/// Update of the application state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateUpdate {
    AccountLoaded(Option<Address>),
    NetworkLoaded(u64),
    ContractsLoaded { token: Address, exchange: Address },
    ContractsCleared,

    AllOrdersLoaded(Vec<Order>),
    FilledOrdersLoaded(Vec<Trade>),
    CancelledOrdersLoaded(Vec<Order>),

    /// Order event observed.
    OrderMade(Order),
    /// Cancel event observed.
    OrderCancelled(Order),
    /// Trade event observed.
    OrderFilled(Trade),
    /// Deposit event observed.
    Deposited(Transfer),
    /// Withdraw event observed.
    Withdrawn(Transfer),

    BalancesLoaded(BalanceSnapshot),

    /// Transaction hash is known, confirmation is pending.
    Submitted(TxAction, TxHash),
    /// Transaction submission failed.
    Failed(TxAction),
    TokenDeposit(DepositPhase),

    Alert(Alert),
}
