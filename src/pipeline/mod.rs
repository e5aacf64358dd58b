//! Pipeline entry points for harvester operations.
//!
//! - `run_followers`: Harvest one user's followers from one platform
//! - `PaginationDriver`: The checkpointing pagination state machine

pub mod driver;
pub mod followers;

pub use driver::{Backoff, DriverOutcome, DriverSettings, PaginationDriver};
pub use followers::{FollowersRequest, OutputMode, run_followers};
