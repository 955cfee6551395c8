//! Alternate-resource adjustment.
//!
//! Re-centers a rule score around how the candidate resource compares with
//! the other resources that could run the same activity:
//!
//! ```text
//! average  = (best + worst) / 2      over the other eligible resources
//! adjusted = (base - average) * resource_multiplier
//! ```
//!
//! With no other eligible resource, `best = worst = base` and the adjusted
//! score is zero.

use rust_decimal::Decimal;

use super::BoundRule;
use crate::dispatching::{Score, SimulationContext};
use crate::error::DispatchResult;
use crate::models::{Activity, Resource};

/// Returns the adjusted score, or `None` when the adjustment does not apply
/// (zero multiplier or locked activity) and the base score stands.
pub(super) fn adjust(
    bound: &BoundRule,
    base: Score,
    multiplier: Score,
    activity: &Activity,
    resource: &Resource,
    context: &SimulationContext,
) -> DispatchResult<Option<Score>> {
    if multiplier.is_zero() || activity.locked {
        return Ok(None);
    }

    let mut best: Option<Score> = None;
    let mut worst: Option<Score> = None;
    for &other_id in &activity.eligible_resources {
        if other_id == resource.id {
            continue;
        }
        let Some(other) = context.resource(other_id) else {
            continue;
        };
        let score = bound.evaluate(activity, other, context)?;
        best = Some(best.map_or(score, |b| b.max(score)));
        worst = Some(worst.map_or(score, |w| w.min(score)));
    }

    let best = best.unwrap_or(base);
    let worst = worst.unwrap_or(base);
    let average = best / Decimal::TWO + worst / Decimal::TWO;
    Ok(Some(base.saturating_sub(average).saturating_mul(multiplier)))
}
