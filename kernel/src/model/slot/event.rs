use chrono::{DateTime, Utc};
use derive_new::new;
use rust_decimal::Decimal;
use shared::error::AppResult;

use crate::model::{
    id::{SlotId, UserId},
    role::Role,
    slot::{validate_rates, validate_window, SlotKind, SlotStatus},
};

#[derive(Debug, new)]
pub struct CreateSlot {
    pub community_code: String,
    pub name: String,
    pub address: String,
    pub description: String,
    pub owner_id: Option<UserId>,
    pub kind: SlotKind,
    pub shareable: bool,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

impl CreateSlot {
    pub fn validate(&self) -> AppResult<()> {
        validate_rates(self.hourly_rate, self.daily_rate)?;
        validate_window(self.available_from, self.available_until)
    }
}

// メタデータの更新は last-writer-wins。None のフィールドは据え置き。
#[derive(Debug, new)]
pub struct UpdateSlot {
    pub slot_id: SlotId,
    pub requested_by: UserId,
    pub role: Role,
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub shareable: Option<bool>,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
}

#[derive(Debug, new)]
pub struct UpdateSlotStatus {
    pub slot_id: SlotId,
    pub requested_by: UserId,
    pub role: Role,
    pub status: SlotStatus,
}

// 期限切れスロットの再掲載。新しい公開期間を必ず指定する。
#[derive(Debug, new)]
pub struct RelistSlot {
    pub slot_id: SlotId,
    pub requested_by: UserId,
    pub role: Role,
    pub available_from: DateTime<Utc>,
    pub available_until: DateTime<Utc>,
}

impl RelistSlot {
    pub fn validate(&self) -> AppResult<()> {
        validate_window(Some(self.available_from), Some(self.available_until))
    }
}
