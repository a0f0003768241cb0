//! Per-token USD costs by model family. Used for logging and cost
//! accounting only; unknown models cost zero rather than erroring.

use rust_decimal::Decimal;

/// (input, output) cost per token for a model id.
pub(crate) fn cost_per_token(model: &str) -> (Decimal, Decimal) {
    // Values are per-token (provider pricing is per million tokens).
    if model.contains("opus") {
        (Decimal::new(15, 6), Decimal::new(75, 6))
    } else if model.contains("sonnet") {
        (Decimal::new(3, 6), Decimal::new(15, 6))
    } else if model.contains("haiku") {
        (Decimal::new(8, 7), Decimal::new(4, 6))
    } else if model.contains("gpt-4o-mini") {
        (Decimal::new(15, 8), Decimal::new(6, 7))
    } else if model.contains("gpt-4o") {
        (Decimal::new(25, 7), Decimal::new(1, 5))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    }
}
