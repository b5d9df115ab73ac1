use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::error::{AppError, AppResult};
use strum::{AsRefStr, EnumString};

use crate::model::{id::SlotId, id::UserId, role::Role};

pub mod event;

// スロットの状態。available のみが新規予約を受け付ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Maintenance,
    Reserved,
    Taken,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SlotKind {
    Resident,
    Visitor,
}

// owner_id と kind から導出する所有区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipMode {
    Owned,
    Shared,
    Visitor,
}

#[derive(Debug)]
pub struct Slot {
    pub slot_id: SlotId,
    pub community_code: String,
    pub name: String,
    pub address: String,
    pub description: String,
    pub owner_id: Option<UserId>,
    pub kind: SlotKind,
    pub shareable: bool,
    pub status: SlotStatus,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

// 一覧取得時のページネーションと絞り込みの設定値
#[derive(Debug)]
pub struct SlotListOptions {
    pub community_code: String,
    pub kind: Option<SlotKind>,
    pub limit: i64,
    pub offset: i64,
}

impl Slot {
    pub fn ownership_mode(&self) -> OwnershipMode {
        if self.owner_id.is_some() {
            OwnershipMode::Owned
        } else if self.kind == SlotKind::Visitor {
            OwnershipMode::Visitor
        } else {
            OwnershipMode::Shared
        }
    }

    // ユーザーがこのスロットに対して予約を作成できるかを判定する。
    // 所有区分の判定をステータスより先に行う。所有スロットは
    // shareable を立てない限り所有者以外は状態によらず予約不可。
    pub fn can_book(&self, requester_id: UserId) -> AppResult<()> {
        if self.ownership_mode() == OwnershipMode::Owned
            && !self.shareable
            && self.owner_id != Some(requester_id)
        {
            return Err(AppError::ForbiddenOperation(format!(
                "スロット（{}）は所有者のみ予約できます。",
                self.slot_id
            )));
        }

        // maintenance 中は所有者であっても予約できない
        if self.status != SlotStatus::Available {
            return Err(AppError::UnprocessableEntity(format!(
                "スロット（{}）は現在予約を受け付けていません（status = {}）。",
                self.slot_id,
                self.status.as_ref()
            )));
        }

        Ok(())
    }

    // スロットの編集可否。owner のいない shared / visitor スロットは admin のみ。
    pub fn can_modify(&self, requester_id: UserId, role: Role) -> bool {
        role.is_admin() || self.owner_id == Some(requester_id)
    }

    pub fn has_window(&self) -> bool {
        self.available_from.is_some() && self.available_until.is_some()
    }
}

// 料金と公開期間のフィールド不変条件。作成・更新の両方で使う。
pub fn validate_rates(hourly_rate: Option<Decimal>, daily_rate: Option<Decimal>) -> AppResult<()> {
    if hourly_rate.is_none() && daily_rate.is_none() {
        return Err(AppError::UnprocessableEntity(
            "時間単価か日単価のどちらかを設定してください。".into(),
        ));
    }
    if hourly_rate.is_some_and(|r| r < Decimal::ZERO) || daily_rate.is_some_and(|r| r < Decimal::ZERO)
    {
        return Err(AppError::UnprocessableEntity(
            "料金に負の値は設定できません。".into(),
        ));
    }
    Ok(())
}

pub fn validate_window(
    available_from: Option<DateTime<Utc>>,
    available_until: Option<DateTime<Utc>>,
) -> AppResult<()> {
    match (available_from, available_until) {
        (None, None) => Ok(()),
        (Some(from), Some(until)) if until > from => Ok(()),
        (Some(_), Some(_)) => Err(AppError::UnprocessableEntity(
            "公開終了日時は公開開始日時より後にしてください。".into(),
        )),
        _ => Err(AppError::UnprocessableEntity(
            "公開期間は開始・終了の両方を指定してください。".into(),
        )),
    }
}
