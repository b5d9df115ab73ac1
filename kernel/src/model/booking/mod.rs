use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use shared::{
    config::BookingPolicy,
    error::{AppError, AppResult},
};
use strum::{AsRefStr, EnumString};

use crate::model::{
    id::{BookingId, EarningId, SlotId, UserId},
    role::Role,
};

pub mod event;

// 予約のステートマシン。遷移表にない遷移はすべて拒否する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }

    // confirmed のみが時間帯を占有する。pending を占有扱いにしないのは
    // 無期限ホールドを避けるための方針による。
    pub fn blocks_window(self) -> bool {
        self == BookingStatus::Confirmed
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }
}

// 決済ステータスは予約とは独立のライフサイクル。外部の決済側が更新する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

// 半開区間 [start_time, end_time) の予約枠
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BookingWindow {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    // 半開区間同士の重なり判定。ちょうど接する枠は重ならない。
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn duration_hours(&self) -> Decimal {
        let minutes = (self.end_time - self.start_time).num_minutes();
        Decimal::from(minutes) / Decimal::from(60)
    }

    // 予約作成の事前条件 (a)〜(d)。この順に検査し、最初の違反で打ち切る。
    pub fn validate(&self, now: DateTime<Utc>, policy: &BookingPolicy) -> AppResult<()> {
        if self.start_time <= now {
            return Err(AppError::UnprocessableEntity(
                "予約開始日時は未来の日時にしてください。".into(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(AppError::UnprocessableEntity(
                "予約終了日時は開始日時より後にしてください。".into(),
            ));
        }
        let hours = self.duration_hours();
        if hours < Decimal::from(policy.min_duration_hours) {
            return Err(AppError::UnprocessableEntity(format!(
                "予約時間は{}時間以上にしてください。",
                policy.min_duration_hours
            )));
        }
        if hours > Decimal::from(policy.max_duration_hours) {
            return Err(AppError::UnprocessableEntity(format!(
                "予約時間は{}時間以内にしてください。",
                policy.max_duration_hours
            )));
        }
        if self.start_time > now + Duration::days(policy.max_advance_days) {
            return Err(AppError::UnprocessableEntity(format!(
                "予約開始日時は{}日先までにしてください。",
                policy.max_advance_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Booking {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub renter_id: UserId,
    pub community_code: String,
    pub window: BookingWindow,
    pub status: BookingStatus,
    // 金額は作成時に確定し、以後スロット側の料金改定の影響を受けない
    pub total_amount: Decimal,
    pub hourly_rate_snapshot: Option<Decimal>,
    pub payment_status: PaymentStatus,
    pub booked_at: DateTime<Utc>,
}

impl Booking {
    // キャンセル可能な期限。開始時刻から grace_hours 後までは認める。
    pub fn cancellable_until(&self, grace_hours: i64) -> DateTime<Utc> {
        self.window.start_time + Duration::hours(grace_hours)
    }

    pub fn ensure_cancellable(
        &self,
        actor_id: UserId,
        role: Role,
        now: DateTime<Utc>,
        grace_hours: i64,
    ) -> AppResult<()> {
        if actor_id != self.renter_id && !role.is_admin() {
            return Err(AppError::ForbiddenOperation(
                "予約のキャンセルは予約者本人のみ行えます。".into(),
            ));
        }
        if !self.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(AppError::UnprocessableEntity(format!(
                "この予約はキャンセルできない状態です（status = {}）。",
                self.status.as_ref()
            )));
        }
        if now >= self.cancellable_until(grace_hours) {
            return Err(AppError::ForbiddenOperation(
                "キャンセル可能な時間を過ぎています。".into(),
            ));
        }
        Ok(())
    }
}

// 確定済み予約から派生する収益レコード。作成後は不変。
#[derive(Debug)]
pub struct Earning {
    pub earning_id: EarningId,
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub owner_id: Option<UserId>,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub owner_payout: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn window(start_in_min: i64, len_min: i64, now: DateTime<Utc>) -> BookingWindow {
        BookingWindow::new(
            now + Duration::minutes(start_in_min),
            now + Duration::minutes(start_in_min + len_min),
        )
    }

    #[test]
    fn back_to_back_windows_do_not_overlap() {
        let now = Utc::now();
        let first = window(0, 120, now);
        let second = BookingWindow::new(first.end_time, first.end_time + Duration::hours(2));
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn partially_overlapping_windows_overlap() {
        let now = Utc::now();
        let first = window(0, 120, now);
        let second = window(60, 120, now);
        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }

    #[test]
    fn contained_window_overlaps() {
        let now = Utc::now();
        let outer = window(0, 240, now);
        let inner = window(60, 60, now);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn duration_allows_fractional_hours() {
        let now = Utc::now();
        assert_eq!(window(0, 90, now).duration_hours(), dec!(1.5));
    }

    #[test]
    fn validate_rejects_past_start() {
        let now = Utc::now();
        let policy = BookingPolicy::default();
        let w = BookingWindow::new(now - Duration::minutes(5), now + Duration::hours(2));
        assert!(matches!(
            w.validate(now, &policy),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let now = Utc::now();
        let policy = BookingPolicy::default();
        let w = BookingWindow::new(now + Duration::hours(2), now + Duration::hours(1));
        assert!(w.validate(now, &policy).is_err());
    }

    #[test]
    fn validate_enforces_duration_bounds() {
        let now = Utc::now();
        let policy = BookingPolicy {
            min_duration_hours: 1,
            max_duration_hours: 48,
            ..BookingPolicy::default()
        };
        assert!(window(60, 30, now).validate(now, &policy).is_err());
        assert!(window(60, 49 * 60, now).validate(now, &policy).is_err());
        assert!(window(60, 120, now).validate(now, &policy).is_ok());
    }

    #[test]
    fn validate_enforces_advance_limit() {
        let now = Utc::now();
        let policy = BookingPolicy {
            max_advance_days: 7,
            ..BookingPolicy::default()
        };
        let w = window(8 * 24 * 60, 120, now);
        assert!(w.validate(now, &policy).is_err());
        let w = window(6 * 24 * 60, 120, now);
        assert!(w.validate(now, &policy).is_ok());
    }

    #[test]
    fn transition_table_only_allows_documented_paths() {
        use BookingStatus::*;
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));

        // 終端状態からの遷移は存在しない
        for terminal in [Cancelled, Completed, NoShow] {
            for next in [Pending, Confirmed, Cancelled, Completed, NoShow] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Completed.can_transition_to(NoShow));
        assert!(!NoShow.can_transition_to(Completed));
    }

    #[test]
    fn only_confirmed_blocks_the_window() {
        use BookingStatus::*;
        assert!(Confirmed.blocks_window());
        for status in [Pending, Cancelled, Completed, NoShow] {
            assert!(!status.blocks_window());
        }
    }

    fn booking(start_offset_min: i64, now: DateTime<Utc>) -> Booking {
        let window = BookingWindow::new(
            now + Duration::minutes(start_offset_min),
            now + Duration::minutes(start_offset_min) + Duration::hours(2),
        );
        Booking {
            booking_id: BookingId::new(),
            slot_id: SlotId::new(),
            renter_id: UserId::new(),
            community_code: "maple-court".into(),
            window,
            status: BookingStatus::Confirmed,
            total_amount: dec!(20),
            hourly_rate_snapshot: Some(dec!(10)),
            payment_status: PaymentStatus::Pending,
            booked_at: now,
        }
    }

    #[test]
    fn cancel_allowed_within_grace_after_start() {
        let now = Utc::now();
        // 開始から30分経過。grace 1時間ならまだキャンセルできる
        let b = booking(-30, now);
        assert!(b.ensure_cancellable(b.renter_id, Role::Member, now, 1).is_ok());
    }

    #[test]
    fn cancel_rejected_past_grace() {
        let now = Utc::now();
        let b = booking(-90, now);
        assert!(matches!(
            b.ensure_cancellable(b.renter_id, Role::Member, now, 1),
            Err(AppError::ForbiddenOperation(_))
        ));
    }

    #[test]
    fn cancel_requires_renter_or_admin() {
        let now = Utc::now();
        let b = booking(60, now);
        let stranger = UserId::new();
        assert!(matches!(
            b.ensure_cancellable(stranger, Role::Member, now, 1),
            Err(AppError::ForbiddenOperation(_))
        ));
        assert!(b.ensure_cancellable(stranger, Role::Admin, now, 1).is_ok());
    }

    #[test]
    fn cancel_rejected_for_terminal_status() {
        let now = Utc::now();
        let mut b = booking(60, now);
        b.status = BookingStatus::Completed;
        assert!(matches!(
            b.ensure_cancellable(b.renter_id, Role::Member, now, 1),
            Err(AppError::UnprocessableEntity(_))
        ));
    }
}
