//! Common contract interfaces shared across protocols.
//!
//! ERC20 tokens and the WETH-style wrapper used to turn the chain's native
//! asset into a depositable token.

use alloy::sol;

// ERC20 interface for token interactions
sol! {
    /// Standard ERC20 interface (subset for supply/borrow needs)
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

// Wrapped native token (WSEI on Sei). Unlike canonical WETH, `deposit`
// takes the amount explicitly alongside msg.value.
sol! {
    #[sol(rpc)]
    interface IWrappedNative {
        function deposit(uint256 amount) external payable;
    }
}
