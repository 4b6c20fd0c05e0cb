use crate::domain::supplier::SupplierId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ProductId = i64;

/// Purchase price is estimated as this share of the list price when no explicit price is set.
const LIST_PRICE_COST_RATIO: Decimal = Decimal::from_parts(66, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default = "default_manage_stock")]
    pub manage_stock: bool,
    pub stock_quantity: i64,
    #[serde(default)]
    pub inbound_quantity: i64,
    #[serde(default)]
    pub min_order_quantity: Option<i64>,
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub list_price: Option<Decimal>,
    pub created_on: NaiveDate,
}

fn default_manage_stock() -> bool {
    true
}

impl Product {
    /// On-hand stock, never negative (backorders are not stock).
    pub fn on_hand(&self) -> i64 {
        self.stock_quantity.max(0)
    }

    pub fn inbound(&self) -> i64 {
        self.inbound_quantity.max(0)
    }

    pub fn moq(&self) -> i64 {
        self.min_order_quantity.filter(|q| *q >= 1).unwrap_or(1)
    }

    pub fn unit_cost(&self) -> Decimal {
        if let Some(price) = self.purchase_price.filter(|p| !p.is_sign_negative()) {
            return price;
        }
        self.list_price
            .filter(|p| !p.is_sign_negative())
            .map(|p| (p * LIST_PRICE_COST_RATIO).round_dp(2))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn age_days(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.created_on).num_days().max(0)
    }
}
