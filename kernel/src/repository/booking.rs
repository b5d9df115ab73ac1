use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    booking::{
        event::{CancelBooking, CreateBooking, MarkNoShow, UpdatePaymentStatus},
        Booking, Earning,
    },
    id::{BookingId, SlotId, UserId},
};

#[async_trait]
pub trait BookingRepository: Send + Sync {
    // 予約を作成する。事前条件の検査・重複判定・金額確定・収益レコードの
    // 挿入までを単一のトランザクションで行う。
    async fn create(&self, event: CreateBooking) -> AppResult<Booking>;
    // 猶予時間内のキャンセル。レコードは削除せず cancelled に遷移し、
    // 遷移後の予約を返す。
    async fn cancel(&self, event: CancelBooking) -> AppResult<Booking>;
    async fn mark_no_show(&self, event: MarkNoShow) -> AppResult<()>;
    // 終了時刻を過ぎた confirmed 予約を completed に落とし、件数を返す
    async fn complete_elapsed(&self) -> AppResult<u64>;
    async fn update_payment_status(&self, event: UpdatePaymentStatus) -> AppResult<()>;
    async fn find_by_id(&self, booking_id: BookingId) -> AppResult<Booking>;
    // ユーザーの現在の予約（pending / confirmed）を取得する
    async fn find_active_by_user(&self, renter_id: UserId) -> AppResult<Vec<Booking>>;
    // スロットの予約履歴（終端状態も含む）を取得する
    async fn find_history_by_slot(&self, slot_id: SlotId) -> AppResult<Vec<Booking>>;
    // スロット所有者の収益レコードを取得する
    async fn find_earnings_by_owner(&self, owner_id: UserId) -> AppResult<Vec<Earning>>;
}
