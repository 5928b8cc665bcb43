//! # brainbet — Focus-Timer Backend
//!
//! Pausable, optionally-countdown focus sessions per user. Finished sessions
//! pay coins into a wallet: one base coin per full 180-second block, scaled
//! by the user's level multiplier.
//!
//! - [`timer`]: pure state machine over [`timer::Session`], driven by an explicit `now`
//! - [`reward`]: block counting, level multipliers, fixed-point [`reward::Coins`]
//! - [`session`]: transactional operations tying the two to the store
//! - [`db`]: PostgreSQL storage
//! - [`server`]: HTTP surface, bearer-token identity, probes and metrics

pub mod db;
pub mod error;
pub mod identity;
pub mod prom_metrics;
pub mod reward;
pub mod server;
pub mod session;
pub mod timer;

pub use error::{AuthError, ServiceError, TimerError};
pub use reward::{award, level_to_multiplier, Award, Coins, Multiplier};
pub use session::{RewardPolicy, TimerService};
pub use timer::{Session, TimerStatus};
