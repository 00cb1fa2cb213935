//! Fill model for backtesting.
//!
//! Turns priced orders into fills, worsening market fills by a fixed slippage.

use fxbt_core::config::ExecutionConfig;
use fxbt_core::{Fill, FillStatus, Order, OrderType};
use rust_decimal::Decimal;

/// Executes orders synchronously. Always answers with a fill; rejection is
/// reported through the fill status.
pub trait FillSimulator {
    fn execute(&mut self, order: &Order) -> Fill;
}

/// Configuration for the simulated execution.
#[derive(Debug, Clone, Default)]
pub struct FillModelConfig {
    /// Price offset against the trader on market orders.
    pub slippage: Decimal,
}

impl From<&ExecutionConfig> for FillModelConfig {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            slippage: config.slippage,
        }
    }
}

/// Fill simulator working off the order's resolved price.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecution {
    config: FillModelConfig,
}

impl SimulatedExecution {
    /// Create a new simulated execution.
    pub fn new(config: FillModelConfig) -> Self {
        Self { config }
    }

    /// Fill price for an order: buys pay the slippage, sells give it up.
    pub fn fill_price(&self, order: &Order) -> Decimal {
        match order.order_type {
            OrderType::Limit => order.price,
            OrderType::Market if order.units < Decimal::ZERO => order.price - self.config.slippage,
            OrderType::Market => order.price + self.config.slippage,
        }
    }
}

impl FillSimulator for SimulatedExecution {
    fn execute(&mut self, order: &Order) -> Fill {
        let price = self.fill_price(order);
        let status = if order.units.is_zero() || price <= Decimal::ZERO {
            FillStatus::Rejected
        } else {
            FillStatus::Filled
        };

        Fill {
            reference: order.reference.clone(),
            pair: order.pair,
            units: order.units,
            price,
            status,
            timestamp: order.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn make_order(order_type: OrderType, units: Decimal, price: Decimal) -> Order {
        Order {
            reference: "ord-1".to_string(),
            pair: "EURUSD".parse().unwrap(),
            units,
            order_type,
            timestamp: Utc::now(),
            price,
        }
    }

    fn model(slippage: Decimal) -> SimulatedExecution {
        SimulatedExecution::new(FillModelConfig { slippage })
    }

    #[test]
    fn test_market_buy() {
        let mut exec = model(dec!(0.0002));
        let fill = exec.execute(&make_order(OrderType::Market, dec!(1000), dec!(1.1050)));

        // Price should be ask + slippage
        assert_eq!(fill.price, dec!(1.1052));
        assert_eq!(fill.status, FillStatus::Filled);
        assert_eq!(fill.units, dec!(1000));
        assert_eq!(fill.reference, "ord-1");
    }

    #[test]
    fn test_market_sell() {
        let mut exec = model(dec!(0.0002));
        let fill = exec.execute(&make_order(OrderType::Market, dec!(-1000), dec!(1.1048)));

        // Price should be bid - slippage
        assert_eq!(fill.price, dec!(1.1046));
    }

    #[test]
    fn test_limit_fills_at_limit() {
        let mut exec = model(dec!(0.0002));
        let fill = exec.execute(&make_order(OrderType::Limit, dec!(-500), dec!(1.2)));
        assert_eq!(fill.price, dec!(1.2));
        assert_eq!(fill.status, FillStatus::Filled);
    }

    #[test]
    fn test_zero_units_rejected() {
        let mut exec = SimulatedExecution::default();
        let fill = exec.execute(&make_order(OrderType::Market, Decimal::ZERO, dec!(1.1)));
        assert_eq!(fill.status, FillStatus::Rejected);
    }
}
