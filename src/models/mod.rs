//! Dispatching domain models.
//!
//! The entities the scoring engine consumes and produces. Identities are
//! integer object ids so they double as deterministic tie-breaks.
//!
//! # Domain Mappings
//!
//! | u-dispatch | Manufacturing | Healthcare | Logistics |
//! |------------|--------------|------------|-----------|
//! | Activity | Operation | Procedure | Transport Leg |
//! | Resource | Machine/Line | Room/Doctor | Truck/Dock |
//! | Schedule | Dispatch Plan | OR Schedule | Loading Plan |

mod activity;
mod factor;
mod resource;
mod schedule;

pub use activity::{Activity, ActivityId, ActivityPool};
pub use factor::FactorScore;
pub use resource::{Resource, ResourceId};
pub use schedule::{Assignment, Schedule};
