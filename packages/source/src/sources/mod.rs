//! Concrete utility feed implementations.
//!
//! Each module implements the [`OutageSource`](crate::OutageSource) trait for
//! one utility's snapshot format.

pub mod pge;
pub mod pse;
pub mod scl;
pub mod snopud;

use outage_map_outage_models::Utility;

use crate::OutageSource;

static PSE: pse::PseSource = pse::PseSource::new();
static SCL: scl::SclSource = scl::SclSource::new();
static SNOPUD: snopud::SnopudSource = snopud::SnopudSource::new();
static PGE: pge::PgeSource = pge::PgeSource::new();

/// Returns the adapter for `utility`.
#[must_use]
pub fn source_for(utility: Utility) -> &'static dyn OutageSource {
    match utility {
        Utility::Pse => &PSE,
        Utility::Scl => &SCL,
        Utility::Snopud => &SNOPUD,
        Utility::Pge => &PGE,
    }
}
