//! Bisection root finder for inverting monotone money functions.
//!
//! Used to turn a desired net amount back into the gross amount that
//! produces it. The function being inverted only needs to be non-decreasing
//! across each continuous piece and to bracket the target at the bounds.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Midpoints are kept to this many decimal places.
const MIDPOINT_DP: u32 = 6;

/// Search stops once the bracket is narrower than this.
const MIN_WIDTH: Decimal = dec!(0.000001);

/// Bisection stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectionOptions {
    /// Accept a point whose output is within this distance of the target.
    pub tolerance: Decimal,
    pub max_iterations: u32,
}

impl Default for BisectionOptions {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.01),
            max_iterations: 50,
        }
    }
}

/// Result of a bisection search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectionOutcome {
    /// Best input found.
    pub value: Decimal,
    /// Function output at `value`.
    pub achieved: Decimal,
    pub iterations: u32,
    /// False when the iteration cap was hit before reaching the tolerance.
    pub converged: bool,
}

/// Finds `x` in `[lower, upper]` with `f(x)` within tolerance of `target`.
///
/// `f` must be non-decreasing where it is continuous, with
/// `f(lower) <= target <= f(upper)`. When the tolerance is never met the
/// closest point seen is returned with `converged` set to false.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use au_tax_core::calculations::solver::{bisect, BisectionOptions};
///
/// // Gross that leaves 700 after a flat 30% tax.
/// let outcome = bisect(
///     dec!(700),
///     dec!(700),
///     dec!(1400),
///     BisectionOptions::default(),
///     |gross| gross * dec!(0.7),
/// );
///
/// assert!(outcome.converged);
/// assert!((outcome.value - dec!(1000)).abs() < dec!(0.02));
/// ```
pub fn bisect<F>(
    target: Decimal,
    lower: Decimal,
    upper: Decimal,
    options: BisectionOptions,
    mut f: F,
) -> BisectionOutcome
where
    F: FnMut(Decimal) -> Decimal,
{
    let at_lower = f(lower);
    if (at_lower - target).abs() <= options.tolerance {
        return BisectionOutcome {
            value: lower,
            achieved: at_lower,
            iterations: 0,
            converged: true,
        };
    }

    let mut lo = lower;
    let mut hi = upper;
    let mut best = BisectionOutcome {
        value: lower,
        achieved: at_lower,
        iterations: 0,
        converged: false,
    };

    for iteration in 1..=options.max_iterations {
        let mid = ((lo + hi) / Decimal::TWO).round_dp(MIDPOINT_DP);
        let achieved = f(mid);
        let error = achieved - target;

        if error.abs() < (best.achieved - target).abs() {
            best.value = mid;
            best.achieved = achieved;
        }
        best.iterations = iteration;

        if error.abs() <= options.tolerance {
            debug!(goal = %target, value = %mid, iterations = iteration, "bisection converged");
            best.value = mid;
            best.achieved = achieved;
            best.converged = true;
            return best;
        }

        if error < Decimal::ZERO {
            lo = mid;
        } else {
            hi = mid;
        }

        if hi - lo <= MIN_WIDTH {
            break;
        }
    }

    warn!(
        goal = %target,
        best = %best.value,
        achieved = %best.achieved,
        iterations = best.iterations,
        "bisection did not reach tolerance; returning best estimate"
    );
    best
}
