use serde::Serialize;

use crate::models::{DepositMode, DepositSettings, LineItem};

/// Share of the grand total requested up front when the deposit is derived
/// automatically.
const AUTO_DEPOSIT_RATE: f64 = 0.4;

/// Monetary summary of a quote, all figures in integer minor units. This is
/// what every save persists alongside the snapshot, keeping the row's
/// `total_cents` equal to the computed grand total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuoteTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub fees_cents: i64,
    pub total_cents: i64,
    pub deposit_cents: i64,
}

pub fn line_total_cents(item: &LineItem) -> i64 {
    round_cents(item.qty * item.unit_price_cents as f64)
}

/// Recomputes all totals from the current line items and settings.
///
/// Subtotal sums every line regardless of taxability; tax applies only to
/// lines flagged taxable; fees may be a negative adjustment but the grand
/// total never goes below zero. An `auto` deposit is 40% of the grand
/// total, a `custom` deposit is taken verbatim (it may exceed the total).
pub fn compute_totals(
    items: &[LineItem],
    tax_rate: f64,
    fees_cents: i64,
    deposit: &DepositSettings,
) -> QuoteTotals {
    let mut subtotal_cents = 0;
    let mut taxable_base_cents = 0;
    for item in items {
        let line = line_total_cents(item);
        subtotal_cents += line;
        if item.taxable {
            taxable_base_cents += line;
        }
    }

    let tax_cents = round_cents(taxable_base_cents as f64 * tax_rate / 100.0);
    let total_cents = (subtotal_cents + tax_cents + fees_cents).max(0);

    let deposit_cents = match deposit.mode {
        DepositMode::Auto => round_cents(total_cents as f64 * AUTO_DEPOSIT_RATE),
        DepositMode::Custom => deposit.amount_cents,
    };

    QuoteTotals {
        subtotal_cents,
        tax_cents,
        fees_cents,
        total_cents,
        deposit_cents,
    }
}

// Half-away-from-zero, with non-finite inputs folding to zero so malformed
// editor state can never poison a stored total.
fn round_cents(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: f64, unit_price_cents: i64, taxable: bool) -> LineItem {
        LineItem {
            description: String::new(),
            qty,
            unit_price_cents,
            taxable,
        }
    }

    fn auto_deposit() -> DepositSettings {
        DepositSettings {
            mode: DepositMode::Auto,
            amount_cents: 0,
        }
    }

    #[test]
    fn mixed_taxable_items_match_reference_figures() {
        let items = vec![item(3.0, 1000, true), item(1.0, 500, false)];
        let totals = compute_totals(&items, 13.0, 0, &auto_deposit());

        assert_eq!(totals.subtotal_cents, 3500);
        assert_eq!(totals.tax_cents, 390);
        assert_eq!(totals.total_cents, 3890);
        assert_eq!(totals.deposit_cents, 1556);
    }

    #[test]
    fn empty_item_list_still_applies_fees() {
        let totals = compute_totals(&[], 13.0, 200, &auto_deposit());
        assert_eq!(totals.subtotal_cents, 0);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 200);
        assert_eq!(totals.deposit_cents, 80);
    }

    #[test]
    fn empty_quote_is_all_zeroes() {
        let totals = compute_totals(&[], 0.0, 0, &auto_deposit());
        assert_eq!(
            totals,
            QuoteTotals {
                subtotal_cents: 0,
                tax_cents: 0,
                fees_cents: 0,
                total_cents: 0,
                deposit_cents: 0,
            }
        );
    }

    #[test]
    fn toggling_taxable_changes_tax_but_not_subtotal() {
        let taxed = compute_totals(&[item(2.0, 1000, true)], 10.0, 0, &auto_deposit());
        let untaxed = compute_totals(&[item(2.0, 1000, false)], 10.0, 0, &auto_deposit());

        assert_eq!(taxed.subtotal_cents, untaxed.subtotal_cents);
        assert_eq!(taxed.tax_cents, 200);
        assert_eq!(untaxed.tax_cents, 0);
    }

    #[test]
    fn fractional_quantities_round_half_away_from_zero() {
        // 1.5 * 333 = 499.5 -> 500
        let totals = compute_totals(&[item(1.5, 333, false)], 0.0, 0, &auto_deposit());
        assert_eq!(totals.subtotal_cents, 500);
    }

    #[test]
    fn negative_fees_never_push_the_total_below_zero() {
        let totals = compute_totals(&[item(1.0, 1000, false)], 0.0, -2500, &auto_deposit());
        assert_eq!(totals.total_cents, 0);
        assert_eq!(totals.deposit_cents, 0);
    }

    #[test]
    fn custom_deposit_is_taken_verbatim() {
        let deposit = DepositSettings {
            mode: DepositMode::Custom,
            amount_cents: 999_999,
        };
        let totals = compute_totals(&[item(1.0, 1000, false)], 0.0, 0, &deposit);
        // May exceed the grand total; no validation by design.
        assert_eq!(totals.deposit_cents, 999_999);
        assert_eq!(totals.total_cents, 1000);
    }

    #[test]
    fn auto_deposit_tracks_the_grand_total() {
        let totals = compute_totals(&[item(2.0, 1945, true)], 13.0, 150, &auto_deposit());
        let expected = (totals.total_cents as f64 * 0.4).round() as i64;
        assert_eq!(totals.deposit_cents, expected);
    }
}
