use async_trait::async_trait;
use chrono::Utc;
use derive_new::new;
use kernel::model::{
    booking::{
        event::{CancelBooking, CreateBooking, MarkNoShow, UpdatePaymentStatus},
        Booking, BookingStatus, Earning, PaymentStatus,
    },
    id::{BookingId, EarningId, SlotId, UserId},
    pricing::Quote,
    slot::Slot,
};
use kernel::repository::booking::BookingRepository;
use shared::{
    config::BookingPolicy,
    error::{AppError, AppResult},
};

use crate::database::{
    model::{
        booking::{BookingRow, EarningRow},
        slot::SlotRow,
    },
    ConnectionPool,
};

#[derive(new)]
pub struct BookingRepositoryImpl {
    db: ConnectionPool,
    policy: BookingPolicy,
}

#[async_trait]
impl BookingRepository for BookingRepositoryImpl {
    // 予約作成。事前条件は決まった順に検査し、最初の違反で区別可能な
    // エラーを返す。重複判定から INSERT までを SERIALIZABLE トランザク
    // ションで行い、コミット時の直列化失敗・排他制約違反も事前チェック
    // と同じ予約重複エラーとして返す。
    async fn create(&self, event: CreateBooking) -> AppResult<Booking> {
        let now = Utc::now();

        // (a)〜(d) 時間帯そのものの検査
        event.window.validate(now, &self.policy)?;

        let mut tx = self.db.begin().await?;
        self.set_transaction_serializable(&mut tx).await?;

        // (e) スロットの存在・所有区分・ステータスの検査
        let slot = {
            let row: Option<SlotRow> = sqlx::query_as(
                r#"
                    SELECT
                        slot_id, community_code, name, address, description,
                        owner_id, kind, shareable, status, hourly_rate, daily_rate,
                        available_from, available_until
                    FROM slots
                    WHERE slot_id = $1
                "#,
            )
            .bind(event.slot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            let slot: Slot = row
                .ok_or_else(|| {
                    AppError::EntityNotFound(format!(
                        "スロット（{}）が見つかりませんでした。",
                        event.slot_id
                    ))
                })?
                .try_into()?;
            // 他コミュニティのスロットは ID を知っていても予約できない。
            // 存在も知らせない。
            if slot.community_code != event.community_code {
                return Err(AppError::EntityNotFound(format!(
                    "スロット（{}）が見つかりませんでした。",
                    event.slot_id
                )));
            }
            slot.can_book(event.renter_id)?;
            slot
        };

        // (f) confirmed の予約との重なり判定
        //     半開区間: existing.start < new.end AND new.start < existing.end
        let overlap = sqlx::query(
            r#"
                SELECT booking_id
                FROM bookings
                WHERE slot_id = $1
                  AND status = 'confirmed'
                  AND start_time < $3
                  AND $2 < end_time
                LIMIT 1
            "#,
        )
        .bind(event.slot_id)
        .bind(event.window.start_time)
        .bind(event.window.end_time)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if overlap.is_some() {
            return Err(booking_conflict(event.slot_id));
        }

        // (g) 金額の確定。ここで計算した額を予約に凍結する
        let quote = Quote::compute(
            slot.hourly_rate,
            slot.daily_rate,
            event.window.duration_hours(),
            self.policy.platform_fee_rate,
        )?;

        let booking_id = BookingId::new();
        let res = sqlx::query(
            r#"
                INSERT INTO bookings
                (booking_id, slot_id, renter_id, community_code,
                start_time, end_time, status, total_amount,
                hourly_rate_snapshot, payment_status, booked_at)
                VALUES ($1, $2, $3, $4, $5, $6, 'confirmed', $7, $8, 'pending', $9)
            "#,
        )
        .bind(booking_id)
        .bind(event.slot_id)
        .bind(event.renter_id)
        .bind(&event.community_code)
        .bind(event.window.start_time)
        .bind(event.window.end_time)
        .bind(quote.total_amount)
        .bind(quote.hourly_rate_snapshot)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_conflict(e, event.slot_id))?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No booking record has been created".into(),
            ));
        }

        // 確定した予約と同一トランザクションで収益レコードを作る
        let res = sqlx::query(
            r#"
                INSERT INTO earnings
                (earning_id, booking_id, slot_id, owner_id,
                amount, platform_fee, owner_payout)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(EarningId::new())
        .bind(booking_id)
        .bind(event.slot_id)
        .bind(slot.owner_id)
        .bind(quote.total_amount)
        .bind(quote.platform_fee)
        .bind(quote.owner_payout)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No earning record has been created".into(),
            ));
        }

        // 並行する予約リクエストとの競合はここで顕在化する
        tx.commit()
            .await
            .map_err(|e| map_commit_conflict(e, event.slot_id))?;

        Ok(Booking {
            booking_id,
            slot_id: event.slot_id,
            renter_id: event.renter_id,
            community_code: event.community_code,
            window: event.window,
            status: BookingStatus::Confirmed,
            total_amount: quote.total_amount,
            hourly_rate_snapshot: quote.hourly_rate_snapshot,
            payment_status: PaymentStatus::Pending,
            booked_at: now,
        })
    }

    async fn cancel(&self, event: CancelBooking) -> AppResult<Booking> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut booking = self.find_for_update(&mut tx, event.booking_id).await?;
        booking.ensure_cancellable(event.requested_by, event.role, now, self.policy.grace_hours)?;

        // 履歴を残すため削除はせず cancelled へ遷移させる
        self.transition(&mut tx, event.booking_id, BookingStatus::Cancelled)
            .await?;

        tx.commit().await.map_err(AppError::TransactionError)?;

        booking.status = BookingStatus::Cancelled;
        Ok(booking)
    }

    async fn mark_no_show(&self, event: MarkNoShow) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let booking = self.find_for_update(&mut tx, event.booking_id).await?;

        // no_show の記録は管理者かスロット所有者のみ
        let slot_owner: Option<Option<UserId>> =
            sqlx::query_scalar("SELECT owner_id FROM slots WHERE slot_id = $1")
                .bind(booking.slot_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::SpecificOperationError)?;
        let slot_owner = slot_owner.flatten();

        if !event.role.is_admin() && slot_owner != Some(event.requested_by) {
            return Err(AppError::ForbiddenOperation(
                "no_show の記録は管理者かスロット所有者のみ行えます。".into(),
            ));
        }
        if !booking.status.can_transition_to(BookingStatus::NoShow) {
            return Err(AppError::UnprocessableEntity(format!(
                "この予約は no_show にできない状態です（status = {}）。",
                booking.status.as_ref()
            )));
        }

        self.transition(&mut tx, event.booking_id, BookingStatus::NoShow)
            .await?;

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(())
    }

    // 終了時刻を過ぎた confirmed 予約を completed に落とすスイープ。
    // 条件を満たす行しか触らないため冪等で、並行実行しても安全。
    async fn complete_elapsed(&self) -> AppResult<u64> {
        let res = sqlx::query(
            r#"
                UPDATE bookings
                SET status = 'completed'
                WHERE status = 'confirmed'
                  AND end_time <= now()
            "#,
        )
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(res.rows_affected())
    }

    async fn update_payment_status(&self, event: UpdatePaymentStatus) -> AppResult<()> {
        let res = sqlx::query(
            r#"
                UPDATE bookings
                SET payment_status = $2
                WHERE booking_id = $1
            "#,
        )
        .bind(event.booking_id)
        .bind(event.payment_status.as_ref())
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "予約（{}）が見つかりませんでした。",
                event.booking_id
            )));
        }

        Ok(())
    }

    async fn find_by_id(&self, booking_id: BookingId) -> AppResult<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
                SELECT
                    booking_id, slot_id, renter_id, community_code,
                    start_time, end_time, status, total_amount,
                    hourly_rate_snapshot, payment_status, booked_at
                FROM bookings
                WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.ok_or_else(|| {
            AppError::EntityNotFound(format!("予約（{}）が見つかりませんでした。", booking_id))
        })?
        .try_into()
    }

    async fn find_active_by_user(&self, renter_id: UserId) -> AppResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
                SELECT
                    booking_id, slot_id, renter_id, community_code,
                    start_time, end_time, status, total_amount,
                    hourly_rate_snapshot, payment_status, booked_at
                FROM bookings
                WHERE renter_id = $1
                  AND status IN ('pending', 'confirmed')
                ORDER BY start_time ASC
            "#,
        )
        .bind(renter_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn find_history_by_slot(&self, slot_id: SlotId) -> AppResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
                SELECT
                    booking_id, slot_id, renter_id, community_code,
                    start_time, end_time, status, total_amount,
                    hourly_rate_snapshot, payment_status, booked_at
                FROM bookings
                WHERE slot_id = $1
                ORDER BY start_time DESC
            "#,
        )
        .bind(slot_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn find_earnings_by_owner(&self, owner_id: UserId) -> AppResult<Vec<Earning>> {
        let rows: Vec<EarningRow> = sqlx::query_as(
            r#"
                SELECT
                    earning_id, booking_id, slot_id, owner_id,
                    amount, platform_fee, owner_payout
                FROM earnings
                WHERE owner_id = $1
                ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(rows.into_iter().map(Earning::from).collect())
    }
}

impl BookingRepositoryImpl {
    async fn set_transaction_serializable(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> AppResult<()> {
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(())
    }

    async fn find_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        booking_id: BookingId,
    ) -> AppResult<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
                SELECT
                    booking_id, slot_id, renter_id, community_code,
                    start_time, end_time, status, total_amount,
                    hourly_rate_snapshot, payment_status, booked_at
                FROM bookings
                WHERE booking_id = $1
                FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.ok_or_else(|| {
            AppError::EntityNotFound(format!("予約（{}）が見つかりませんでした。", booking_id))
        })?
        .try_into()
    }

    async fn transition(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        booking_id: BookingId,
        next: BookingStatus,
    ) -> AppResult<()> {
        let res = sqlx::query("UPDATE bookings SET status = $2 WHERE booking_id = $1")
            .bind(booking_id)
            .bind(next.as_ref())
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No booking record has been updated".into(),
            ));
        }

        Ok(())
    }
}

fn booking_conflict(slot_id: SlotId) -> AppError {
    AppError::SlotTimeConflict(format!(
        "スロット（{}）は指定時間帯にすでに予約が存在します。",
        slot_id
    ))
}

// 直列化失敗（40001）と排他制約違反（23P01）は並行予約の競合なので、
// 事前チェックで検出した重複と同じエラーに揃える。
fn is_conflict_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("23P01"))
        }
        _ => false,
    }
}

fn map_conflict(e: sqlx::Error, slot_id: SlotId) -> AppError {
    if is_conflict_violation(&e) {
        booking_conflict(slot_id)
    } else {
        AppError::SpecificOperationError(e)
    }
}

fn map_commit_conflict(e: sqlx::Error, slot_id: SlotId) -> AppError {
    if is_conflict_violation(&e) {
        booking_conflict(slot_id)
    } else {
        AppError::TransactionError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use kernel::model::{
        booking::BookingWindow,
        role::Role,
        slot::{event::CreateSlot, SlotKind},
    };
    use kernel::repository::slot::SlotRepository;
    use rust_decimal_macros::dec;

    use crate::repository::slot::SlotRepositoryImpl;

    fn repos(pool: sqlx::PgPool) -> (SlotRepositoryImpl, BookingRepositoryImpl) {
        let db = ConnectionPool::new(pool);
        (
            SlotRepositoryImpl::new(db.clone()),
            BookingRepositoryImpl::new(db, BookingPolicy::default()),
        )
    }

    async fn shared_slot(repo: &SlotRepositoryImpl) -> AppResult<SlotId> {
        repo.create(CreateSlot::new(
            "maple-court".into(),
            "B1-12".into(),
            "1-2-3 Sakura-dori".into(),
            String::new(),
            None,
            SlotKind::Resident,
            false,
            Some(dec!(10)),
            Some(dec!(150)),
            None,
            None,
        ))
        .await
    }

    fn booking_for(slot_id: SlotId, renter_id: UserId, start: DateTime<Utc>, hours: i64) -> CreateBooking {
        CreateBooking::new(
            slot_id,
            renter_id,
            "maple-court".into(),
            BookingWindow::new(start, start + Duration::hours(hours)),
        )
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_create_booking_freezes_price(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool.clone());
        let slot_id = shared_slot(&slots).await?;
        let renter = UserId::new();
        let start = Utc::now() + Duration::hours(2);

        let booking = bookings.create(booking_for(slot_id, renter, start, 23)).await?;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.total_amount, dec!(230));
        assert_eq!(booking.hourly_rate_snapshot, Some(dec!(10)));

        // 料金改定後も既存予約の金額は変わらない
        sqlx::query("UPDATE slots SET hourly_rate = 99 WHERE slot_id = $1")
            .bind(slot_id)
            .execute(&pool)
            .await?;
        let found = bookings.find_by_id(booking.booking_id).await?;
        assert_eq!(found.total_amount, dec!(230));

        // 収益レコードも同時に作成されている
        let (amount, platform_fee, owner_payout): (
            rust_decimal::Decimal,
            rust_decimal::Decimal,
            rust_decimal::Decimal,
        ) = sqlx::query_as(
            "SELECT amount, platform_fee, owner_payout FROM earnings WHERE booking_id = $1",
        )
        .bind(booking.booking_id)
        .fetch_one(&pool)
        .await?;
        assert_eq!(amount, dec!(230));
        assert_eq!(platform_fee, dec!(23));
        assert_eq!(owner_payout, dec!(207));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_overlap_is_rejected_and_back_to_back_allowed(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool);
        let slot_id = shared_slot(&slots).await?;
        let start = Utc::now() + Duration::hours(2);

        bookings
            .create(booking_for(slot_id, UserId::new(), start, 2))
            .await?;

        // [start+1h, start+3h) は重なるので拒否
        let res = bookings
            .create(booking_for(slot_id, UserId::new(), start + Duration::hours(1), 2))
            .await;
        assert!(matches!(res, Err(AppError::SlotTimeConflict(_))));

        // ちょうど接する [start+2h, start+4h) は成功する
        bookings
            .create(booking_for(slot_id, UserId::new(), start + Duration::hours(2), 2))
            .await?;

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_cancelled_booking_frees_the_window(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool);
        let slot_id = shared_slot(&slots).await?;
        let renter = UserId::new();
        let start = Utc::now() + Duration::hours(2);

        let booking = bookings.create(booking_for(slot_id, renter, start, 2)).await?;
        // キャンセルは遷移後の予約を返す
        let cancelled = bookings
            .cancel(CancelBooking::new(booking.booking_id, renter, Role::Member))
            .await?;
        assert_eq!(cancelled.booking_id, booking.booking_id);
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // cancelled は時間帯を塞がないので同じ枠を取り直せる
        bookings
            .create(booking_for(slot_id, UserId::new(), start, 2))
            .await?;

        let stored = bookings.find_by_id(booking.booking_id).await?;
        assert_eq!(stored.status, BookingStatus::Cancelled);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_booking_requires_matching_community(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool);
        let slot_id = shared_slot(&slots).await?;
        let start = Utc::now() + Duration::hours(2);

        // 別コミュニティのメンバーからはスロットの存在ごと見えない
        let foreign = CreateBooking::new(
            slot_id,
            UserId::new(),
            "elm-heights".into(),
            BookingWindow::new(start, start + Duration::hours(2)),
        );
        assert!(matches!(
            bookings.create(foreign).await,
            Err(AppError::EntityNotFound(_))
        ));

        bookings
            .create(booking_for(slot_id, UserId::new(), start, 2))
            .await?;

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_owned_slot_rejects_other_renters(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool);
        let owner = UserId::new();
        let slot_id = slots
            .create(CreateSlot::new(
                "maple-court".into(),
                "B2-07".into(),
                "1-2-3 Sakura-dori".into(),
                String::new(),
                Some(owner),
                SlotKind::Resident,
                false,
                Some(dec!(10)),
                None,
                None,
                None,
            ))
            .await?;
        let start = Utc::now() + Duration::hours(2);

        let res = bookings
            .create(booking_for(slot_id, UserId::new(), start, 2))
            .await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation(_))));

        // 所有者本人は予約できる
        bookings.create(booking_for(slot_id, owner, start, 2)).await?;

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_failed_precondition_leaves_no_rows(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool.clone());
        let slot_id = shared_slot(&slots).await?;
        let start = Utc::now() + Duration::hours(2);

        // 最大予約時間の超過
        let res = bookings
            .create(booking_for(slot_id, UserId::new(), start, 24 * 31))
            .await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));

        let bookings_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&pool)
            .await?;
        let earnings_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM earnings")
            .fetch_one(&pool)
            .await?;
        assert_eq!(bookings_count, 0);
        assert_eq!(earnings_count, 0);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_cancel_respects_grace_period(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool.clone());
        let slot_id = shared_slot(&slots).await?;
        let renter = UserId::new();

        // 開始から30分 / 90分経過した予約を直接シードする（作成時検査を
        // 通らないため）。互いに重ならないよう1時間枠で接するように置く。
        // 基準時刻を一度だけ取得し、2件の枠が厳密に接するようにする。
        let now = Utc::now();
        let seed = |start_offset_min: i64| {
            let booking_id = BookingId::new();
            let start = now - Duration::minutes(start_offset_min);
            let pool = pool.clone();
            async move {
                sqlx::query(
                    r#"
                        INSERT INTO bookings
                        (booking_id, slot_id, renter_id, community_code,
                        start_time, end_time, status, total_amount,
                        hourly_rate_snapshot, payment_status, booked_at)
                        VALUES ($1, $2, $3, 'maple-court', $4, $5, 'confirmed', 20, 10, 'pending', now())
                    "#,
                )
                .bind(booking_id)
                .bind(slot_id)
                .bind(renter)
                .bind(start)
                .bind(start + Duration::hours(1))
                .execute(&pool)
                .await
                .map(|_| booking_id)
            }
        };

        let within_grace = seed(30).await?;
        let past_grace = seed(90).await?;

        bookings
            .cancel(CancelBooking::new(within_grace, renter, Role::Member))
            .await?;

        let res = bookings
            .cancel(CancelBooking::new(past_grace, renter, Role::Member))
            .await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation(_))));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_complete_elapsed_is_idempotent(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let (slots, bookings) = repos(pool.clone());
        let slot_id = shared_slot(&slots).await?;

        sqlx::query(
            r#"
                INSERT INTO bookings
                (booking_id, slot_id, renter_id, community_code,
                start_time, end_time, status, total_amount,
                hourly_rate_snapshot, payment_status, booked_at)
                VALUES ($1, $2, $3, 'maple-court', now() - interval '5 hours',
                now() - interval '1 hour', 'confirmed', 40, 10, 'pending', now())
            "#,
        )
        .bind(BookingId::new())
        .bind(slot_id)
        .bind(UserId::new())
        .execute(&pool)
        .await?;

        assert_eq!(bookings.complete_elapsed().await?, 1);
        assert_eq!(bookings.complete_elapsed().await?, 0);

        Ok(())
    }
}
