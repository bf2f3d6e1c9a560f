//! Cross-pool arbitrage after a victim swap

use ethers::types::{Address, U256};

use crate::amm;
use crate::types::{ClassifiedSwap, PoolState};

/// Best round trip found against one alternate pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrageCandidate {
    /// Pool the WETH is sold into first
    pub buy_pool: Address,
    /// Pool the intermediate token is sold back into
    pub sell_pool: Address,
    pub input: U256,
    pub output: U256,
    pub profit: U256,
}

/// Reserves of `pool` once the victim swap has executed, or `None` if the
/// swap would revert at current reserves.
pub fn apply_victim(pool: &PoolState, swap: &ClassifiedSwap) -> Option<PoolState> {
    let token_in = swap.token_in();
    let (reserve_in, reserve_out) = pool.reserves_for(token_in)?;

    if swap.method.is_exact_input() {
        let out = amm::get_amount_out(swap.amount_in, reserve_in, reserve_out)?;
        if out < swap.amount_out_min {
            return None;
        }
        pool.after_trade(token_in, swap.amount_in, out)
    } else {
        let needed = amm::get_amount_in(swap.amount_out_min, reserve_in, reserve_out)?;
        if needed > swap.amount_in {
            return None;
        }
        pool.after_trade(token_in, needed, swap.amount_out_min)
    }
}

/// WETH → token on `first`, token → WETH on `second`, at the optimal size
pub fn round_trip(first: &PoolState, second: &PoolState, weth: Address) -> Option<ArbitrageCandidate> {
    let token = first.other(weth)?;
    let (s_in, t_out) = first.reserves_for(weth)?;
    let (t_in, s_out) = second.reserves_for(token)?;

    let input = amm::optimal_cycle_input(s_in, t_out, t_in, s_out)?;
    let mid = amm::get_amount_out(input, s_in, t_out)?;
    let output = amm::get_amount_out(mid, t_in, s_out)?;
    if output <= input {
        return None;
    }

    Some(ArbitrageCandidate {
        buy_pool: first.pool_address,
        sell_pool: second.pool_address,
        input,
        output,
        profit: output - input,
    })
}

/// Highest-profit round trip between the post-trade victim pool and any
/// alternate, trying both directions. Ties keep the earlier alternate.
pub fn best_arbitrage(
    victim_after: &PoolState,
    alternates: &[PoolState],
    weth: Address,
) -> Option<ArbitrageCandidate> {
    let mut best: Option<ArbitrageCandidate> = None;

    for alternate in alternates {
        if alternate.pool_address == victim_after.pool_address || !alternate.is_live() {
            continue;
        }
        let candidates = [
            round_trip(victim_after, alternate, weth),
            round_trip(alternate, victim_after, weth),
        ];
        for candidate in candidates.into_iter().flatten() {
            if best.as_ref().map_or(true, |b| candidate.profit > b.profit) {
                best = Some(candidate);
            }
        }
    }

    best
}
