use std::collections::BTreeMap;

use crate::config::schema::default_price_plans;
use crate::model::Plan;

/// Maps provider price IDs to plans. Unknown prices get the lowest tier.
#[derive(Debug, Clone)]
pub struct PlanTable {
    prices: BTreeMap<String, Plan>,
}

impl PlanTable {
    pub fn new(prices: BTreeMap<String, Plan>) -> Self {
        Self { prices }
    }

    pub fn plan_for_price(&self, price_id: Option<&str>) -> Plan {
        price_id
            .and_then(|id| self.prices.get(id))
            .copied()
            .unwrap_or(Plan::LOWEST)
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        Self::new(default_price_plans())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = PlanTable::default();
        assert_eq!(table.plan_for_price(Some("price_professional")), Plan::Professional);
        assert_eq!(table.plan_for_price(Some("price_enterprise")), Plan::Enterprise);
        assert_eq!(table.plan_for_price(Some("price_unknown")), Plan::Starter);
        assert_eq!(table.plan_for_price(None), Plan::Starter);
    }
}
