//! Ports: the seams between the queue and its collaborators.
//!
//! - [`Clock`] abstracts time so tests can pin it.
//! - [`TaskRunner`] is the outbound seam: the embedding SDK supplies one
//!   remote call per task type. The queue never builds HTTP requests or
//!   knows endpoints.

pub mod clock;
pub mod runner;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::runner::TaskRunner;
