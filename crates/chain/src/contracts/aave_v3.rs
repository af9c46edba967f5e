//! AAVE V3 pool interface (Yei Finance is an AAVE V3 fork).
//!
//! Only the user-facing entry points the looper needs: supply, borrow,
//! repay, withdraw, eMode selection and the account-data view.

use alloy::sol;

sol! {
    /// AAVE V3 Pool user interface
    #[sol(rpc)]
    interface IPool {
        function supply(
            address asset,
            uint256 amount,
            address onBehalfOf,
            uint16 referralCode
        ) external;

        function borrow(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            uint16 referralCode,
            address onBehalfOf
        ) external;

        function repay(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            address onBehalfOf
        ) external returns (uint256);

        function withdraw(
            address asset,
            uint256 amount,
            address to
        ) external returns (uint256);

        function setUserEMode(uint8 categoryId) external;

        function getUserEMode(address user) external view returns (uint256);

        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

/// Variable interest rate mode.
pub const VARIABLE_RATE_MODE: u64 = 2;

/// Referral code sent with supply/borrow.
pub const REFERRAL_CODE: u16 = 0;
