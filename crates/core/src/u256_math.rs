//! Fixed-point helpers for the borrow computation.
//!
//! Amounts stay in integer base units end to end; floating point appears
//! only when a WAD ratio is descaled for a threshold comparison or when a
//! configured decimal amount is converted once at startup.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Safety haircut applied to every computed borrow (1%).
pub const BORROW_HAIRCUT_BPS: u16 = 100;

/// Apply basis points reduction.
/// Returns: value * (10000 - basis_points) / 10000
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u16.saturating_sub(basis_points));
    value.saturating_mul(factor) / BPS_DENOMINATOR
}

/// Take a basis-point fraction of a value, rounding down.
/// Returns: value * basis_points / 10000
#[inline(always)]
pub fn bps_of(value: U256, basis_points: u16) -> U256 {
    value.saturating_mul(U256::from(basis_points)) / BPS_DENOMINATOR
}

/// Convert a fraction in (0, 1] to basis points, rounding down so the
/// result never exceeds the fraction. The epsilon absorbs binary
/// representation error (0.29 * 10000 = 2899.9999999999995).
#[inline]
pub fn fraction_to_bps(fraction: f64) -> u16 {
    (fraction * 10_000.0 + 1e-6).floor().clamp(0.0, 10_000.0) as u16
}

/// Convert WAD (18 decimals) to f64.
/// `U256::MAX` is the protocol's "no debt" health factor and maps to infinity.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad == U256::MAX {
        return f64::INFINITY;
    }
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let mut acc = 0.0f64;
        for limb in limbs.iter().rev() {
            acc = acc * (u64::MAX as f64 + 1.0) + *limb as f64;
        }
        acc / 1e18
    }
}

/// Convert a decimal amount to integer base units.
/// Non-positive and non-finite values map to zero.
#[inline]
pub fn to_base_units(value: f64, decimals: u8) -> U256 {
    if !value.is_finite() || value <= 0.0 {
        return U256::ZERO;
    }
    U256::from((value * 10f64.powi(decimals as i32)) as u128)
}

/// Convert integer base units to a decimal amount (display only).
#[inline]
pub fn from_base_units(value: U256, decimals: u8) -> f64 {
    wad_to_f64(value) * 1e18 / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_basis_points() {
        // 1% reduction (100 bps)
        let value = U256::from(1000u64);
        assert_eq!(apply_basis_points(value, 100), U256::from(990u64));

        // Rounds down
        assert_eq!(apply_basis_points(U256::from(80u64), 100), U256::from(79u64));

        // 0% reduction
        assert_eq!(apply_basis_points(value, 0), U256::from(1000u64));
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(U256::from(100u64), 8000), U256::from(80u64));
        assert_eq!(bps_of(U256::from(179u64), 8000), U256::from(143u64));
        assert_eq!(bps_of(U256::from(179u64), 10000), U256::from(179u64));
    }

    #[test]
    fn test_fraction_to_bps() {
        assert_eq!(fraction_to_bps(0.8), 8000);
        assert_eq!(fraction_to_bps(0.93), 9300);
        assert_eq!(fraction_to_bps(1.0), 10000);
        assert_eq!(fraction_to_bps(0.29), 2900);
    }

    #[test]
    fn test_fraction_to_bps_never_rounds_up() {
        assert_eq!(fraction_to_bps(0.79996), 7999);
        assert_eq!(fraction_to_bps(0.00004), 0);

        let collateral = WAD;
        let ceiling = U256::from(799_960_000_000_000_000u64);
        let borrowable = bps_of(collateral, fraction_to_bps(0.79996));
        assert!(borrowable <= ceiling);
        assert_eq!(borrowable, U256::from(799_900_000_000_000_000u64));
    }

    #[test]
    fn test_wad_to_f64() {
        let wad = U256::from(1000u64) * WAD;
        assert!((wad_to_f64(wad) - 1000.0).abs() < 0.001);

        let hf = (WAD * U256::from(15u64)) / U256::from(10u64);
        assert!((wad_to_f64(hf) - 1.5).abs() < 1e-12);

        assert_eq!(wad_to_f64(U256::MAX), f64::INFINITY);
    }

    #[test]
    fn test_base_units() {
        assert_eq!(to_base_units(0.5, 18), U256::from(500_000_000_000_000_000u128));
        assert_eq!(to_base_units(0.1, 6), U256::from(100_000u64));
        assert_eq!(to_base_units(0.0, 18), U256::ZERO);
        assert_eq!(to_base_units(-1.0, 18), U256::ZERO);

        let two = U256::from(2u64) * WAD;
        assert!((from_base_units(two, 18) - 2.0).abs() < 1e-12);
    }
}
