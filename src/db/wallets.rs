//! Wallet balances, stored as integer hundredths.
//!
//! Wallets are created lazily on first read or credit. Balances only grow,
//! through session payouts.

use anyhow::Result;
use sqlx::PgConnection;

use super::Database;
use crate::reward::Coins;

/// Add `amount` to the user's balance and return the new total.
///
/// A single upsert, so concurrent credits for the same user never lose an
/// update even outside the slot lock.
pub async fn credit(conn: &mut PgConnection, user_id: &str, amount: Coins) -> Result<Coins> {
    let cents: i64 = sqlx::query_scalar(
        "INSERT INTO wallets (user_id, coins_cents) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET
           coins_cents = wallets.coins_cents + EXCLUDED.coins_cents,
           updated_at = NOW()
         RETURNING coins_cents",
    )
    .bind(user_id)
    .bind(amount.cents())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Coins::from_cents(cents))
}

/// Current balance, creating an empty wallet if the user has none.
pub async fn balance(conn: &mut PgConnection, user_id: &str) -> Result<Coins> {
    credit(conn, user_id, Coins::ZERO).await
}

impl Database {
    pub async fn get_wallet_balance(&self, user_id: &str) -> Result<Coins> {
        let mut conn = self.pool.acquire().await?;
        balance(&mut conn, user_id).await
    }
}
