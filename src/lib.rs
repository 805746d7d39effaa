//! rudder - rule-driven traffic router
//!
//! Inbound connections are classified against an ordered rule table and
//! handed to one of several outbound strategies: direct connect, reject, an
//! encrypted tunnel, or a latency-probed group of tunnels. Routing tables are
//! hot-swapped atomically, traffic is metered, and structured log events fan
//! out to control-plane subscribers.
//!
//! # Architecture
//!
//! ```text
//!        +----------------+
//!        |   hub/ (API)   |
//!        +-------+--------+
//!                |
//!        +-------v--------+      +-------------+
//!        |    tunnel/     +------>  statistic/ |
//!        +-------+--------+      +-------------+
//!                |
//!     +----------+-----------+-----------+
//!     |          |           |           |
//! +---v---+ +----v----+ +----v-----+ +---v--------+
//! | rule/ | | config/ | | outbound/| | observable/|
//! +-------+ +---------+ +----+-----+ +------------+
//!                             |
//!                        +----v----+
//!                        | proxy/  |
//!                        | (groups)|
//!                        +---------+
//! ```

pub mod common;
pub mod config;
pub mod hub;
pub mod observable;
pub mod outbound;
pub mod proxy;
pub mod rule;
pub mod statistic;
pub mod tunnel;

pub use common::{Addr, Error, Network, Result};
pub use tunnel::Tunnel;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
