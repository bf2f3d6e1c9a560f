//! Sandwich sizing around a WETH → token swap

use ethers::types::{Address, U256};

use crate::amm;
use crate::types::{ClassifiedSwap, PoolState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandwichCandidate {
    pub pool: Address,
    pub front_run_in: U256,
    pub back_run_out: U256,
    pub profit: U256,
}

/// Native-currency size of a swap, when it can be read off the calldata
pub fn trade_value_wei(swap: &ClassifiedSwap, weth: Address) -> Option<U256> {
    if swap.method.is_eth_input() {
        Some(swap.value_wei)
    } else if swap.token_in() == weth {
        Some(swap.amount_in)
    } else if swap.token_out() == weth {
        Some(swap.amount_out_min)
    } else {
        None
    }
}

/// Whether the victim still clears its slippage bound on `pool`
fn victim_clears(pool: &PoolState, swap: &ClassifiedSwap) -> bool {
    let Some((reserve_in, reserve_out)) = pool.reserves_for(swap.token_in()) else {
        return false;
    };
    if swap.method.is_exact_input() {
        amm::get_amount_out(swap.amount_in, reserve_in, reserve_out)
            .map_or(false, |out| out >= swap.amount_out_min)
    } else {
        amm::get_amount_in(swap.amount_out_min, reserve_in, reserve_out)
            .map_or(false, |needed| needed <= swap.amount_in)
    }
}

/// Pool after a front-run of `front_run_in` and the tokens it bought, when
/// the victim still clears on it. A front-run too small to buy a whole token
/// unit still counts; it moves the price without funding a back-run.
fn front_run(pool: &PoolState, swap: &ClassifiedSwap, front_run_in: U256) -> Option<(U256, PoolState)> {
    let bought = pool.amount_out(swap.token_in(), front_run_in)?;
    let after_front = pool.after_trade(swap.token_in(), front_run_in, bought)?;
    victim_clears(&after_front, swap).then_some((bought, after_front))
}

/// Execute front-run, victim, back-run and return the back-run output
fn simulate(pool: &PoolState, swap: &ClassifiedSwap, front_run_in: U256) -> Option<(U256, U256)> {
    let (bought, after_front) = front_run(pool, swap, front_run_in)?;
    let after_victim = super::arbitrage::apply_victim(&after_front, swap)?;
    let back_run_out = after_victim.amount_out(swap.token_out(), bought)?;
    Some((bought, back_run_out))
}

/// Largest front-run that keeps the victim inside its slippage bound, found
/// by binary search over the WETH reserve. The search only asks whether the
/// victim clears, which is monotone in the front-run size. Only `[WETH, token]` paths are
/// sized; the victim must be buying with WETH for the front-run to be funded
/// in wei.
pub fn estimate_sandwich(pool: &PoolState, swap: &ClassifiedSwap, weth: Address) -> Option<SandwichCandidate> {
    if swap.path.len() != 2 || swap.token_in() != weth || !pool.contains(swap.token_out()) {
        return None;
    }
    if !victim_clears(pool, swap) {
        return None;
    }

    let (weth_reserve, _) = pool.reserves_for(weth)?;
    let mut low = U256::zero();
    let mut high = weth_reserve;
    while low < high {
        let mid = low + (high - low + U256::one()) / 2;
        if front_run(pool, swap, mid).is_some() {
            low = mid;
        } else {
            high = mid - U256::one();
        }
    }

    if low.is_zero() {
        return None;
    }
    let (_, back_run_out) = simulate(pool, swap, low)?;
    if back_run_out <= low {
        return None;
    }

    Some(SandwichCandidate {
        pool: pool.pool_address,
        front_run_in: low,
        back_run_out,
        profit: back_run_out - low,
    })
}
