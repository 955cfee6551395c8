//! Early-window penalty.
//!
//! The early window of an activity runs from its release time to the end of
//! its head-start window. Starting inside it is allowed but discouraged; the
//! deeper into the window (the closer to the release time), the larger the
//! penalty:
//!
//! ```text
//! fraction = (head_start_end - clock) / (head_start_end - release_time)
//! penalty  = min_penalty + (max_penalty - min_penalty) * curve(fraction)
//! ```

use rust_decimal::Decimal;

use crate::dispatching::{ResolvedWeight, Score};
use crate::models::Activity;

/// Penalty to subtract for starting `activity` at `clock`. Zero outside the window.
pub(super) fn penalty(activity: &Activity, clock: i64, weight: &ResolvedWeight) -> Score {
    let (Some(release), Some(end)) = (activity.release_time, activity.head_start_end) else {
        return Decimal::ZERO;
    };
    if end <= release || clock < release || clock >= end {
        return Decimal::ZERO;
    }
    let fraction = Decimal::from(end - clock) / Decimal::from(end - release);
    let span = weight.max_penalty.saturating_sub(weight.min_penalty);
    weight
        .min_penalty
        .saturating_add(span.saturating_mul(weight.penalty_curve.shape(fraction)))
}
