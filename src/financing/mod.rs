//! Flash-loan financing cost model
//!
//! Decides whether an opportunity still pays once the lender's premium and
//! the execution gas are taken out. Integer arithmetic only.

use ethers::types::{I256, U256};

use crate::config::FinancingConfig;
use crate::types::{FinancingVerdict, Opportunity};

/// Aave V3 flash-loan premium, in basis points
pub const DEFAULT_FEE_BPS: u32 = 5;
/// Gas for borrow, swaps and repay
pub const DEFAULT_GAS_UNITS: u64 = 200_000;

const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancingModel {
    pub fee_bps: u32,
    pub gas_units: u64,
}

impl Default for FinancingModel {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            gas_units: DEFAULT_GAS_UNITS,
        }
    }
}

impl From<&FinancingConfig> for FinancingModel {
    fn from(config: &FinancingConfig) -> Self {
        Self {
            fee_bps: config.fee_bps,
            gas_units: config.gas_units,
        }
    }
}

impl FinancingModel {
    pub fn new(fee_bps: u32, gas_units: u64) -> Self {
        Self { fee_bps, gas_units }
    }

    /// Premium owed on `amount`, rounded down. `None` on overflow.
    pub fn flash_loan_fee(&self, amount: U256) -> Option<U256> {
        amount
            .checked_mul(U256::from(self.fee_bps))
            .map(|scaled| scaled / U256::from(BPS_DENOMINATOR))
    }

    pub fn gas_cost(&self, gas_price_wei: U256, gas_units: u64) -> Option<U256> {
        gas_price_wei.checked_mul(U256::from(gas_units))
    }

    /// Verdict at the model's default gas estimate
    pub fn evaluate(
        &self,
        opportunity: &Opportunity,
        flash_loan_amount: U256,
        gas_price_wei: U256,
    ) -> FinancingVerdict {
        self.evaluate_with_gas(opportunity, flash_loan_amount, gas_price_wei, self.gas_units)
    }

    /// Profitable only when gross profit strictly exceeds fee plus gas.
    /// Break-even is not profitable. A cost that does not fit in 256 bits
    /// is reported as `U256::MAX` with the lowest net profit.
    pub fn evaluate_with_gas(
        &self,
        opportunity: &Opportunity,
        flash_loan_amount: U256,
        gas_price_wei: U256,
        gas_units: u64,
    ) -> FinancingVerdict {
        let fee_wei = self.flash_loan_fee(flash_loan_amount);
        let gas_cost_wei = self.gas_cost(gas_price_wei, gas_units);
        let cost = fee_wei
            .zip(gas_cost_wei)
            .and_then(|(fee, gas)| fee.checked_add(gas))
            .and_then(|cost| I256::try_from(cost).ok());

        let net_profit_wei = cost
            .and_then(|cost| opportunity.estimated_profit_wei.checked_sub(cost))
            .unwrap_or(I256::MIN);

        FinancingVerdict {
            profitable: cost.is_some() && net_profit_wei > I256::zero(),
            net_profit_wei,
            fee_wei: fee_wei.unwrap_or(U256::MAX),
            gas_cost_wei: gas_cost_wei.unwrap_or(U256::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpportunityKind;
    use ethers::types::{Address, H256};

    const GWEI: u64 = 1_000_000_000;

    fn opportunity(profit: i128, capital: u128) -> Opportunity {
        Opportunity {
            kind: OpportunityKind::Arbitrage,
            trigger_tx_hash: H256::repeat_byte(1),
            estimated_profit_wei: I256::from(profit),
            required_capital_wei: U256::from(capital),
            involved_pools: vec![Address::repeat_byte(0xb1), Address::repeat_byte(0xb2)],
            observed_at_block: 1,
        }
    }

    #[test]
    fn test_fee_is_five_bps() {
        let model = FinancingModel::default();
        assert_eq!(model.flash_loan_fee(U256::from(10_000u64)), Some(U256::from(5u64)));
        // rounds down
        assert_eq!(model.flash_loan_fee(U256::from(1_999u64)), Some(U256::zero()));
    }

    #[test]
    fn test_break_even_is_not_profitable() {
        let model = FinancingModel::default();
        let amount = U256::from(10u128.pow(21));
        // fee 5e17, gas 200k * 10 gwei = 2e15
        let cost = 500_000_000_000_000_000i128 + 2_000_000_000_000_000i128;

        let even = model.evaluate(&opportunity(cost, 10u128.pow(21)), amount, U256::from(10 * GWEI));
        assert!(!even.profitable);
        assert_eq!(even.net_profit_wei, I256::zero());
        assert_eq!(even.fee_wei, U256::from(500_000_000_000_000_000u128));
        assert_eq!(even.gas_cost_wei, U256::from(2_000_000_000_000_000u128));

        let above = model.evaluate(&opportunity(cost + 1, 10u128.pow(21)), amount, U256::from(10 * GWEI));
        assert!(above.profitable);
        assert_eq!(above.net_profit_wei, I256::one());
    }

    #[test]
    fn test_loss_reports_negative_net() {
        let model = FinancingModel::default();
        let verdict = model.evaluate(&opportunity(1_000, 0), U256::zero(), U256::from(GWEI));
        assert!(!verdict.profitable);
        assert!(verdict.net_profit_wei < I256::zero());
    }

    #[test]
    fn test_custom_gas_units() {
        let model = FinancingModel::new(9, 100_000);
        let verdict = model.evaluate_with_gas(&opportunity(0, 0), U256::zero(), U256::from(GWEI), 21_000);
        assert_eq!(verdict.gas_cost_wei, U256::from(21_000 * GWEI));
        assert_eq!(verdict.fee_wei, U256::zero());
    }

    #[test]
    fn test_overflowing_gas_cost_is_unprofitable() {
        let model = FinancingModel::default();
        assert_eq!(model.gas_cost(U256::MAX, 2), None);

        let verdict = model.evaluate(&opportunity(i128::MAX, 0), U256::zero(), U256::MAX);
        assert!(!verdict.profitable);
        assert_eq!(verdict.net_profit_wei, I256::MIN);
        assert_eq!(verdict.gas_cost_wei, U256::MAX);
    }

    #[test]
    fn test_overflowing_fee_is_unprofitable() {
        let model = FinancingModel::default();
        // U256::MAX * 5 overflows before the division by 10_000
        assert_eq!(model.flash_loan_fee(U256::MAX), None);
        let largest = U256::MAX / U256::from(5u64);
        assert_eq!(
            model.flash_loan_fee(largest),
            Some(largest * U256::from(5u64) / U256::from(10_000u64))
        );

        let verdict = model.evaluate(&opportunity(i128::MAX, 0), U256::MAX, U256::from(GWEI));
        assert!(!verdict.profitable);
        assert_eq!(verdict.fee_wei, U256::MAX);
        assert_eq!(verdict.net_profit_wei, I256::MIN);
    }

    #[test]
    fn test_cost_above_signed_range_is_unprofitable() {
        let model = FinancingModel::new(0, 1);
        // fits in U256 but not in I256
        let gas_price = U256::MAX / U256::from(2u64) + U256::one();
        let verdict = model.evaluate(&opportunity(i128::MAX, 0), U256::zero(), gas_price);
        assert!(!verdict.profitable);
        assert_eq!(verdict.net_profit_wei, I256::MIN);
        assert_eq!(verdict.gas_cost_wei, gas_price);
    }
}
