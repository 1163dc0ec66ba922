//! Portal client: everything a team's machine does around the claim transaction.

pub mod cache;
pub mod duplicates;
pub mod flow;
pub mod identity;
pub mod stats;

pub use cache::{CachedEnrollment, LocalEnrollmentCache, STORAGE_KEY};
pub use duplicates::check_duplicates;
pub use flow::{ClaimFlow, ClaimState, Landing, MemberForm, Portal, Route, SECTIONS};
pub use identity::{
    ConfiguredIdentityOracle, Identity, IdentityOracle, IdentitySubscription, Session,
};
pub use stats::{StatsPoller, DEFAULT_STATS_INTERVAL};
