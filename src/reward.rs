//! # Reward — Coin Payout for Focused Time
//!
//! Converts the final elapsed seconds of a session into coins:
//!
//! ```text
//! full_blocks  = elapsed_seconds / 180          (partial blocks earn nothing)
//! base_coins   = full_blocks
//! multiplier   = 1.0 (L<=1), 1.2 (L=2), 1.3 + 0.1*(L-3) (L>=3)
//! earned_coins = base_coins * multiplier        (two decimals)
//! ```
//!
//! All amounts are carried as integer hundredths. A multiplier always has
//! exactly two decimals and `base_coins` is whole, so `earned_coins` is exact
//! and the two-decimal rounding never has a half-way case to resolve. Wallet
//! balances are sums of hundredths, so repeated awards cannot drift.

use serde::{Serialize, Serializer};
use std::fmt;

/// Seconds of focused time that make up one reward unit.
pub const REWARD_BLOCK_SECONDS: i64 = 180;

/// A coin amount in hundredths ("cents").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coins(i64);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    pub const fn from_cents(cents: i64) -> Self {
        Coins(cents)
    }

    pub const fn from_whole(coins: i64) -> Self {
        Coins(coins.saturating_mul(100))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Decimal presentation for JSON responses.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn saturating_add(self, other: Coins) -> Coins {
        Coins(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Level multiplier in hundredths (`120` == 1.2x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multiplier(i64);

impl Multiplier {
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Multiplier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Map a user level to its payout multiplier.
///
/// Total over all integers: anything at or below 1 pays 1.0x. Strictly
/// increasing from level 1 upwards.
pub fn level_to_multiplier(level: i32) -> Multiplier {
    let hundredths = match level {
        i32::MIN..=1 => 100,
        2 => 120,
        l => 130i64.saturating_add(10i64.saturating_mul(l as i64 - 3)),
    };
    Multiplier(hundredths)
}

/// Payout breakdown for one finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Award {
    #[serde(skip)]
    pub full_blocks: i64,
    pub base_coins: Coins,
    pub level: i32,
    pub multiplier: Multiplier,
    pub earned_coins: Coins,
}

impl Award {
    /// The same breakdown with nothing paid out (invalidated session).
    pub fn forfeited(self) -> Award {
        Award {
            earned_coins: Coins::ZERO,
            ..self
        }
    }
}

/// Compute the payout for `elapsed_seconds` of focused time at `level`.
pub fn award(elapsed_seconds: i64, level: i32) -> Award {
    let full_blocks = elapsed_seconds.max(0) / REWARD_BLOCK_SECONDS;
    let multiplier = level_to_multiplier(level);
    Award {
        full_blocks,
        base_coins: Coins::from_whole(full_blocks),
        level,
        multiplier,
        earned_coins: Coins::from_cents(full_blocks.saturating_mul(multiplier.hundredths())),
    }
}
