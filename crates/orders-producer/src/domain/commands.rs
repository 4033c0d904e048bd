//! Commands for order submission.

use rust_decimal::Decimal;

/// Submit a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOrder {
    /// Customer placing the order.
    pub customer_name: String,
    /// Order total. Not range- or currency-checked.
    pub amount: Decimal,
}
