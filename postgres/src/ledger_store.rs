//! `PostgreSQL` award log.

use crate::error::map_sqlx_error;
use salon_loyalty_core::ledger::{KeyState, LedgerFuture};
use salon_loyalty_core::{
    AppendOutcome, AwardEvent, AwardEventId, AwardReason, Balance, BookingId, Currency,
    LedgerError, LedgerStore, SalonId, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Award log backed by the `award_events` table.
///
/// # Concurrency
///
/// `append` takes `pg_advisory_xact_lock` on the event's key before reading
/// the key's history, so two appends for the same key serialize and exactly
/// one credit is admitted. Appends for different keys do not contend.
#[derive(Clone, Debug)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when a migration fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(format!("migration failed: {e}")))
    }

    #[tracing::instrument(skip_all, fields(user_id = %event.user_id, reason = %event.reason))]
    async fn append_inner(&self, event: AwardEvent) -> Result<AppendOutcome, LedgerError> {
        event.validate()?;
        let key = event.key();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.lock_name())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let history = sqlx::query(
            "SELECT reason, amount FROM award_events
             WHERE user_id = $1
               AND booking_id IS NOT DISTINCT FROM $2
               AND currency = $3
               AND salon_id IS NOT DISTINCT FROM $4
             ORDER BY seq",
        )
        .bind(key.user_id.as_str())
        .bind(key.booking_id.as_ref().map(BookingId::as_str))
        .bind(key.currency.as_str())
        .bind(key.salon_id.as_ref().map(SalonId::as_str))
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let entries = history
            .iter()
            .map(|row| {
                let reason: String = row.try_get("reason").map_err(map_sqlx_error)?;
                let amount: i64 = row.try_get("amount").map_err(map_sqlx_error)?;
                Ok((AwardReason::parse(&reason)?, amount))
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        if !KeyState::from_entries(entries).admits(event.reason) {
            tracing::debug!(key = %key, "Append rejected as duplicate");
            return Ok(AppendOutcome::RejectedDuplicate);
        }

        sqlx::query(
            "INSERT INTO award_events
                 (id, user_id, booking_id, currency, salon_id, amount, reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id.as_uuid())
        .bind(event.user_id.as_str())
        .bind(event.booking_id.as_ref().map(BookingId::as_str))
        .bind(event.currency.as_str())
        .bind(event.salon_id.as_ref().map(SalonId::as_str))
        .bind(event.amount)
        .bind(event.reason.as_str())
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(key = %key, amount = event.amount, "Award event appended");
        Ok(AppendOutcome::Accepted)
    }

    async fn load_inner(&self, user_id: UserId) -> Result<Vec<AwardEvent>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, user_id, booking_id, currency, salon_id, amount, reason, created_at
             FROM award_events
             WHERE user_id = $1
             ORDER BY seq",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_event).collect()
    }

    async fn balance_inner(&self, user_id: UserId) -> Result<Balance, LedgerError> {
        let rows = sqlx::query(
            "SELECT currency, salon_id,
                    SUM(amount)::BIGINT AS total,
                    BOOL_OR(reason = 'signup_bonus') AS has_signup
             FROM award_events
             WHERE user_id = $1
             GROUP BY currency, salon_id",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut balance = Balance::default();
        for row in &rows {
            let currency: String = row.try_get("currency").map_err(map_sqlx_error)?;
            let salon_id: Option<String> = row.try_get("salon_id").map_err(map_sqlx_error)?;
            let total: i64 = row.try_get("total").map_err(map_sqlx_error)?;
            let has_signup: bool = row.try_get("has_signup").map_err(map_sqlx_error)?;

            match (Currency::parse(&currency)?, salon_id) {
                (Currency::Coin, _) => {
                    balance.coins = balance.coins.checked_add(total).ok_or_else(|| {
                        LedgerError::Storage(format!("coin balance of {user_id} overflows"))
                    })?;
                    balance.signup_recorded |= has_signup;
                }
                (Currency::SalonPoint, Some(salon)) if total != 0 => {
                    balance.points_by_salon.insert(SalonId::new(salon), total);
                }
                (Currency::SalonPoint, _) => {}
            }
        }
        Ok(balance)
    }
}

fn row_to_event(row: &PgRow) -> Result<AwardEvent, LedgerError> {
    let booking_id: Option<String> = row.try_get("booking_id").map_err(map_sqlx_error)?;
    let salon_id: Option<String> = row.try_get("salon_id").map_err(map_sqlx_error)?;
    let currency: String = row.try_get("currency").map_err(map_sqlx_error)?;
    let reason: String = row.try_get("reason").map_err(map_sqlx_error)?;
    let user_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;

    Ok(AwardEvent {
        id: AwardEventId::from_uuid(row.try_get("id").map_err(map_sqlx_error)?),
        user_id: UserId::new(user_id),
        booking_id: booking_id.map(BookingId::new),
        currency: Currency::parse(&currency)?,
        salon_id: salon_id.map(SalonId::new),
        amount: row.try_get("amount").map_err(map_sqlx_error)?,
        reason: AwardReason::parse(&reason)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
    })
}

impl LedgerStore for PostgresLedgerStore {
    fn append(&self, event: AwardEvent) -> LedgerFuture<'_, AppendOutcome> {
        Box::pin(self.append_inner(event))
    }

    fn load_events(&self, user_id: UserId) -> LedgerFuture<'_, Vec<AwardEvent>> {
        Box::pin(self.load_inner(user_id))
    }

    fn read_balance(&self, user_id: UserId) -> LedgerFuture<'_, Balance> {
        Box::pin(self.balance_inner(user_id))
    }
}
