//! The menu catalog and bill computation.
//!
//! Bills are computed server-side from the submitted quantity selections:
//! a line is kept iff its quantity is strictly positive, its amount is
//! `qty * price`, and the grand total is the sum of the line amounts.

use serde::{Deserialize, Serialize};

use crate::order::OrderItem;

#[derive(Clone, Debug, Serialize)]
pub struct MenuItem {
    pub id: u32,
    pub name: String,
    pub price: u64,
}

/// The kiosk menu with rupee prices.
pub fn default_catalog() -> Vec<MenuItem> {
    [
        ("Veg Biryani", 80),
        ("Chicken Roll", 70),
        ("Masala Dosa", 60),
        ("Paneer Tikka", 120),
        ("Veg Thali", 100),
        ("Filter Coffee", 25),
    ]
    .iter()
    .enumerate()
    .map(|(i, (name, price))| MenuItem {
        id: i as u32 + 1,
        name: (*name).to_string(),
        price: *price,
    })
    .collect()
}

/// One quantity selection as submitted by a client.
#[derive(Clone, Debug, Deserialize)]
pub struct Selection {
    pub name: String,
    #[serde(default)]
    pub qty: u32,
    #[serde(default)]
    pub price: u64,
}

/// Computed bill: the positive-quantity lines and their grand total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bill {
    pub lines: Vec<OrderItem>,
    pub total: u64,
}

impl Bill {
    pub fn compute(selections: &[Selection]) -> Self {
        let lines: Vec<OrderItem> = selections
            .iter()
            .filter(|s| s.qty > 0)
            .map(|s| OrderItem {
                name: s.name.trim().to_string(),
                qty: s.qty,
                price: s.price,
                amount: u64::from(s.qty) * s.price,
            })
            .collect();

        let total = lines.iter().map(|l| l.amount).sum();

        Self { lines, total }
    }

    /// Bill preview lines as shown to the customer before confirming.
    pub fn formatted_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| {
                format!(
                    "{} - Qty: {} × ₹{} = ₹{}",
                    l.name, l.qty, l.price, l.amount
                )
            })
            .collect()
    }

    pub fn grand_total_line(&self) -> String {
        format!("Grand Total: ₹{}", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(name: &str, qty: u32, price: u64) -> Selection {
        Selection {
            name: name.into(),
            qty,
            price,
        }
    }

    #[test]
    fn total_is_the_sum_of_line_amounts() {
        let bill = Bill::compute(&[
            selection("Veg Biryani", 1, 80),
            selection("Chicken Roll", 2, 70),
        ]);

        assert_eq!(bill.lines.len(), 2);
        assert_eq!(bill.lines[0].amount, 80);
        assert_eq!(bill.lines[1].amount, 140);
        assert_eq!(bill.total, 220);
        assert_eq!(
            bill.total,
            bill.lines.iter().map(|l| l.amount).sum::<u64>()
        );
    }

    #[test]
    fn zero_quantity_lines_are_excluded() {
        let bill = Bill::compute(&[
            selection("Veg Biryani", 0, 80),
            selection("Masala Dosa", 1, 60),
        ]);

        assert_eq!(bill.lines.len(), 1);
        assert_eq!(bill.lines[0].name, "Masala Dosa");
        assert_eq!(bill.total, 60);
    }

    #[test]
    fn empty_selection_has_total_zero() {
        let bill = Bill::compute(&[]);
        assert!(bill.lines.is_empty());
        assert_eq!(bill.total, 0);
    }

    #[test]
    fn preview_lines_use_the_kiosk_format() {
        let bill = Bill::compute(&[
            selection("Veg Biryani", 1, 80),
            selection("Chicken Roll", 2, 70),
        ]);

        assert_eq!(
            bill.formatted_lines(),
            vec![
                "Veg Biryani - Qty: 1 × ₹80 = ₹80",
                "Chicken Roll - Qty: 2 × ₹70 = ₹140",
            ]
        );
        assert_eq!(bill.grand_total_line(), "Grand Total: ₹220");
    }
}
