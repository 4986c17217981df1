//! Contract bindings for the token and exchange contracts.

use alloy::primitives::{Address, address};

/// Pseudo-token address the exchange uses to account native currency.
pub const ETHER_ADDRESS: Address = address!("0x0000000000000000000000000000000000000000");

#[allow(clippy::too_many_arguments)]
pub mod token {
    alloy::sol!(
        /// ERC-20 token traded on the exchange.
        #[derive(Debug)]
        #[sol(rpc)]
        contract Token {
            event Transfer(address indexed from, address indexed to, uint256 value);
            event Approval(address indexed owner, address indexed spender, uint256 value);

            function name() external view returns (string);
            function symbol() external view returns (string);
            function decimals() external view returns (uint256);
            function totalSupply() external view returns (uint256);
            function balanceOf(address owner) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
            function approve(address spender, uint256 value) external returns (bool);
            function transfer(address to, uint256 value) external returns (bool);
        }
    );
}

#[allow(clippy::too_many_arguments)]
pub mod exchange {
    alloy::sol!(
        /// Custodial exchange holding balances and matching posted orders.
        #[derive(Debug)]
        #[sol(rpc)]
        contract Exchange {
            event Deposit(address token, address user, uint256 amount, uint256 balance);
            event Withdraw(address token, address user, uint256 amount, uint256 balance);
            event Order(
                uint256 id,
                address user,
                address tokenGet,
                uint256 amountGet,
                address tokenGive,
                uint256 amountGive,
                uint256 timestamp
            );
            event Cancel(
                uint256 id,
                address user,
                address tokenGet,
                uint256 amountGet,
                address tokenGive,
                uint256 amountGive,
                uint256 timestamp
            );
            event Trade(
                uint256 id,
                address user,
                address tokenGet,
                uint256 amountGet,
                address tokenGive,
                uint256 amountGive,
                address userFill,
                uint256 timestamp
            );

            function feeAccount() external view returns (address);
            function orderCount() external view returns (uint256);
            function orderCancelled(uint256 id) external view returns (bool);
            function orderFilled(uint256 id) external view returns (bool);
            function calcFee() external view returns (uint256);
            function balanceOf(address token, address user) external view returns (uint256);

            function depositEther() external payable;
            function withdrawEther(uint256 amount) external;
            function depositToken(address token, uint256 amount) external;
            function withdrawToken(address token, uint256 amount) external;
            function makeOrder(
                address tokenGet,
                uint256 amountGet,
                address tokenGive,
                uint256 amountGive
            ) external;
            function cancelOrder(uint256 id) external;
            function fillOrder(uint256 id) external payable;
        }
    );
}
