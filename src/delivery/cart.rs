use std::fmt;

use rust_decimal::Decimal;

/// Largest quantity accepted on one cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// One priced line of a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub category_id: i32,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

pub fn subtotal(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::total).sum()
}

/// Smallest cart the store will deliver, optionally ignoring one category
/// (cigarettes) when counting towards it.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumOrder {
    pub amount: Decimal,
    pub excluded_category_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BelowMinimum {
    pub minimum: Decimal,
    pub counted: Decimal,
    pub excludes_category: bool,
}

impl fmt::Display for BelowMinimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Minimum order is {}", self.minimum)?;
        if self.excludes_category {
            f.write_str(" (excluding cigarettes)")?;
        }
        f.write_str(".")
    }
}

impl std::error::Error for BelowMinimum {}

impl MinimumOrder {
    pub fn counted_amount(&self, lines: &[CartLine]) -> Decimal {
        lines
            .iter()
            .filter(|line| Some(line.category_id) != self.excluded_category_id)
            .map(CartLine::total)
            .sum()
    }

    pub fn check(&self, lines: &[CartLine]) -> Result<(), BelowMinimum> {
        let counted = self.counted_amount(lines);
        if counted < self.amount {
            return Err(BelowMinimum {
                minimum: self.amount,
                counted,
                excludes_category: self.excluded_category_id.is_some(),
            });
        }
        Ok(())
    }
}
