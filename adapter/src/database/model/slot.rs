use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::model::{
    id::{SlotId, UserId},
    slot::{Slot, SlotKind, SlotStatus},
};
use rust_decimal::Decimal;
use shared::error::AppError;
use sqlx::FromRow;

// slots テーブルの行。status と kind は TEXT で保持しているので
// ドメイン型への変換時に閉じた列挙へ落とす。
#[derive(Debug, FromRow)]
pub struct SlotRow {
    pub slot_id: SlotId,
    pub community_code: String,
    pub name: String,
    pub address: String,
    pub description: String,
    pub owner_id: Option<UserId>,
    pub kind: String,
    pub shareable: bool,
    pub status: String,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = AppError;

    fn try_from(value: SlotRow) -> Result<Self, Self::Error> {
        let SlotRow {
            slot_id,
            community_code,
            name,
            address,
            description,
            owner_id,
            kind,
            shareable,
            status,
            hourly_rate,
            daily_rate,
            available_from,
            available_until,
        } = value;
        let kind = SlotKind::from_str(&kind)
            .map_err(|_| AppError::ConversionEntityError(format!("unknown slot kind: {kind}")))?;
        let status = SlotStatus::from_str(&status).map_err(|_| {
            AppError::ConversionEntityError(format!("unknown slot status: {status}"))
        })?;
        Ok(Slot {
            slot_id,
            community_code,
            name,
            address,
            description,
            owner_id,
            kind,
            shareable,
            status,
            hourly_rate,
            daily_rate,
            available_from,
            available_until,
        })
    }
}
