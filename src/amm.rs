//! Constant-product math for V2 pairs
//!
//! Mirrors UniswapV2Library exactly: 0.3% fee applied to the input, truncating
//! integer division. Every operation is checked, so oversized inputs from
//! adversarial calldata produce `None` instead of an overflow panic.

use ethers::types::U256;

/// Fee multiplier numerator (0.3% fee)
pub const FEE_NUMERATOR: u64 = 997;
pub const FEE_DENOMINATOR: u64 = 1000;

/// `amount_in * 997 * reserve_out / (reserve_in * 1000 + amount_in * 997)`
#[inline]
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Option<U256> {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return None;
    }

    let amount_in_with_fee = amount_in.checked_mul(U256::from(FEE_NUMERATOR))?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))?
        .checked_add(amount_in_with_fee)?;

    Some(numerator / denominator)
}

/// Input required to receive exactly `amount_out`, rounded up like the router
#[inline]
pub fn get_amount_in(amount_out: U256, reserve_in: U256, reserve_out: U256) -> Option<U256> {
    if amount_out.is_zero() || reserve_in.is_zero() || amount_out >= reserve_out {
        return None;
    }

    let numerator = reserve_in
        .checked_mul(amount_out)?
        .checked_mul(U256::from(FEE_DENOMINATOR))?;
    let denominator = (reserve_out - amount_out).checked_mul(U256::from(FEE_NUMERATOR))?;

    (numerator / denominator).checked_add(U256::one())
}

/// Profit-maximizing input for a two-pool cycle.
///
/// The cycle sells token S into the first pool for T (reserves `s_in`,
/// `t_out`), then sells T into the second pool for S (reserves `t_in`,
/// `s_out`). The two pools collapse into one virtual pair `(ea, eb)` and the
/// optimum is `(sqrt(997000 * ea * eb) - 1000 * ea) / 997`. Returns `None`
/// when no positive input is profitable.
pub fn optimal_cycle_input(s_in: U256, t_out: U256, t_in: U256, s_out: U256) -> Option<U256> {
    let fee_num = U256::from(FEE_NUMERATOR);
    let fee_den = U256::from(FEE_DENOMINATOR);

    let denominator = t_in
        .checked_mul(fee_den)?
        .checked_add(t_out.checked_mul(fee_num)?)?;
    if denominator.is_zero() {
        return None;
    }

    let ea = s_in.checked_mul(t_in)?.checked_mul(fee_den)? / denominator;
    let eb = s_out.checked_mul(t_out)?.checked_mul(fee_num)? / denominator;
    if ea.is_zero() || eb.is_zero() {
        return None;
    }

    let root = ea
        .checked_mul(eb)?
        .checked_mul(fee_num * fee_den)?
        .integer_sqrt();
    let floor = ea.checked_mul(fee_den)?;
    if root <= floor {
        return None;
    }

    let input = (root - floor) / fee_num;
    (!input.is_zero()).then_some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(amount_in: u64, reserve_in: u64, reserve_out: u64) -> Option<U256> {
        get_amount_out(U256::from(amount_in), U256::from(reserve_in), U256::from(reserve_out))
    }

    #[test]
    fn test_amount_out_hand_computed() {
        // 99_700_000 / 1_099_700 = 90.66
        assert_eq!(out(100, 1000, 1000), Some(U256::from(90)));
        // 1_994_000_000_000 / 1_000_997_000 = 1992.01
        assert_eq!(out(1000, 1_000_000, 2_000_000), Some(U256::from(1992)));
        // 49_850_000_000 / 9_985_000 = 4992.48
        assert_eq!(out(5000, 5000, 10_000), Some(U256::from(4992)));
        // 997 / 1997 truncates to zero
        assert_eq!(out(1, 1, 1), Some(U256::zero()));
    }

    #[test]
    fn test_amount_out_rejects_zero_reserves() {
        assert_eq!(out(100, 0, 1000), None);
        assert_eq!(out(100, 1000, 0), None);
        assert_eq!(out(0, 1000, 1000), None);
    }

    #[test]
    fn test_amount_out_overflow_is_none() {
        assert_eq!(get_amount_out(U256::MAX, U256::from(1000), U256::from(1000)), None);
    }

    #[test]
    fn test_amount_in_inverts_amount_out() {
        // 90_000_000 / 907_270 = 99.19, plus one
        assert_eq!(
            get_amount_in(U256::from(90), U256::from(1000), U256::from(1000)),
            Some(U256::from(100))
        );
        assert_eq!(get_amount_in(U256::from(1000), U256::from(1000), U256::from(1000)), None);
    }

    #[test]
    fn test_optimal_cycle_input_balanced_pools() {
        let r = U256::from(1_000_000u64);
        assert_eq!(optimal_cycle_input(r, r, r, r), None);
    }

    #[test]
    fn test_optimal_cycle_input_beats_neighbours() {
        // S is cheap in the second pool: 1 S = 1 T in the first, 1 T = 1.2 S in the second
        let s_in = U256::from(1_000_000_000u64);
        let t_out = U256::from(1_000_000_000u64);
        let t_in = U256::from(1_000_000_000u64);
        let s_out = U256::from(1_200_000_000u64);

        let x = optimal_cycle_input(s_in, t_out, t_in, s_out).unwrap();
        let profit = |input: U256| {
            let mid = get_amount_out(input, s_in, t_out).unwrap();
            let back = get_amount_out(mid, t_in, s_out).unwrap();
            back.saturating_sub(input)
        };

        assert!(profit(x) > U256::zero());
        assert!(profit(x) >= profit(x / 2));
        assert!(profit(x) >= profit(x * 2));
    }
}
