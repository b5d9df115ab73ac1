use chrono::{DateTime, Utc};
use derive_new::new;
use garde::Validate;
use kernel::model::{
    id::{SlotId, UserId},
    role::Role,
    slot::{
        event::{CreateSlot, RelistSlot, UpdateSlot, UpdateSlotStatus},
        OwnershipMode, Slot, SlotKind, SlotListOptions, SlotStatus,
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKindName {
    Resident,
    Visitor,
}

impl From<SlotKindName> for SlotKind {
    fn from(value: SlotKindName) -> Self {
        match value {
            SlotKindName::Resident => Self::Resident,
            SlotKindName::Visitor => Self::Visitor,
        }
    }
}

impl From<SlotKind> for SlotKindName {
    fn from(value: SlotKind) -> Self {
        match value {
            SlotKind::Resident => Self::Resident,
            SlotKind::Visitor => Self::Visitor,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatusName {
    Available,
    Maintenance,
    Reserved,
    Taken,
    Expired,
}

impl From<SlotStatusName> for SlotStatus {
    fn from(value: SlotStatusName) -> Self {
        match value {
            SlotStatusName::Available => Self::Available,
            SlotStatusName::Maintenance => Self::Maintenance,
            SlotStatusName::Reserved => Self::Reserved,
            SlotStatusName::Taken => Self::Taken,
            SlotStatusName::Expired => Self::Expired,
        }
    }
}

impl From<SlotStatus> for SlotStatusName {
    fn from(value: SlotStatus) -> Self {
        match value {
            SlotStatus::Available => Self::Available,
            SlotStatus::Maintenance => Self::Maintenance,
            SlotStatus::Reserved => Self::Reserved,
            SlotStatus::Taken => Self::Taken,
            SlotStatus::Expired => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipModeName {
    Owned,
    Shared,
    Visitor,
}

impl From<OwnershipMode> for OwnershipModeName {
    fn from(value: OwnershipMode) -> Self {
        match value {
            OwnershipMode::Owned => Self::Owned,
            OwnershipMode::Shared => Self::Shared,
            OwnershipMode::Visitor => Self::Visitor,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(length(min = 1))]
    pub address: String,
    #[garde(skip)]
    #[serde(default)]
    pub description: String,
    #[garde(skip)]
    pub kind: SlotKindName,
    // true なら申請者自身を所有者として登録する
    #[garde(skip)]
    #[serde(default)]
    pub owned: bool,
    #[garde(skip)]
    #[serde(default)]
    pub shareable: bool,
    #[garde(skip)]
    pub hourly_rate: Option<Decimal>,
    #[garde(skip)]
    pub daily_rate: Option<Decimal>,
    #[garde(skip)]
    pub available_from: Option<DateTime<Utc>>,
    #[garde(skip)]
    pub available_until: Option<DateTime<Utc>>,
}

#[derive(new)]
pub struct CreateSlotRequestWithMember(pub String, pub UserId, pub CreateSlotRequest);

impl From<CreateSlotRequestWithMember> for CreateSlot {
    fn from(value: CreateSlotRequestWithMember) -> Self {
        let CreateSlotRequestWithMember(community_code, user_id, request) = value;
        let CreateSlotRequest {
            name,
            address,
            description,
            kind,
            owned,
            shareable,
            hourly_rate,
            daily_rate,
            available_from,
            available_until,
        } = request;
        CreateSlot {
            community_code,
            name,
            address,
            description,
            owner_id: owned.then_some(user_id),
            kind: kind.into(),
            shareable,
            hourly_rate,
            daily_rate,
            available_from,
            available_until,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SlotListQuery {
    #[garde(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[garde(range(min = 0))]
    #[serde(default)]
    pub offset: i64,
    #[garde(skip)]
    pub kind: Option<SlotKindName>,
}

const fn default_limit() -> i64 {
    20
}

#[derive(new)]
pub struct SlotListQueryWithCommunity(pub String, pub SlotListQuery);

impl From<SlotListQueryWithCommunity> for SlotListOptions {
    fn from(value: SlotListQueryWithCommunity) -> Self {
        let SlotListQueryWithCommunity(community_code, SlotListQuery { limit, offset, kind }) =
            value;
        SlotListOptions {
            community_code,
            kind: kind.map(SlotKind::from),
            limit,
            offset,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotRequest {
    #[garde(inner(length(min = 1)))]
    pub name: Option<String>,
    #[garde(inner(length(min = 1)))]
    pub address: Option<String>,
    #[garde(skip)]
    pub description: Option<String>,
    #[garde(skip)]
    pub shareable: Option<bool>,
    #[garde(skip)]
    pub hourly_rate: Option<Decimal>,
    #[garde(skip)]
    pub daily_rate: Option<Decimal>,
}

#[derive(new)]
pub struct UpdateSlotRequestWithIds(pub SlotId, pub UserId, pub Role, pub UpdateSlotRequest);

impl From<UpdateSlotRequestWithIds> for UpdateSlot {
    fn from(value: UpdateSlotRequestWithIds) -> Self {
        let UpdateSlotRequestWithIds(slot_id, user_id, role, request) = value;
        let UpdateSlotRequest {
            name,
            address,
            description,
            shareable,
            hourly_rate,
            daily_rate,
        } = request;
        UpdateSlot {
            slot_id,
            requested_by: user_id,
            role,
            name,
            address,
            description,
            shareable,
            hourly_rate,
            daily_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotStatusRequest {
    pub status: SlotStatusName,
}

#[derive(new)]
pub struct UpdateSlotStatusRequestWithIds(
    pub SlotId,
    pub UserId,
    pub Role,
    pub UpdateSlotStatusRequest,
);

impl From<UpdateSlotStatusRequestWithIds> for UpdateSlotStatus {
    fn from(value: UpdateSlotStatusRequestWithIds) -> Self {
        let UpdateSlotStatusRequestWithIds(slot_id, user_id, role, request) = value;
        UpdateSlotStatus {
            slot_id,
            requested_by: user_id,
            role,
            status: request.status.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelistSlotRequest {
    pub available_from: DateTime<Utc>,
    pub available_until: DateTime<Utc>,
}

#[derive(new)]
pub struct RelistSlotRequestWithIds(pub SlotId, pub UserId, pub Role, pub RelistSlotRequest);

impl From<RelistSlotRequestWithIds> for RelistSlot {
    fn from(value: RelistSlotRequestWithIds) -> Self {
        let RelistSlotRequestWithIds(slot_id, user_id, role, request) = value;
        RelistSlot {
            slot_id,
            requested_by: user_id,
            role,
            available_from: request.available_from,
            available_until: request.available_until,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSlotResponse {
    pub slot_id: SlotId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub items: Vec<SlotResponse>,
}

impl From<Vec<Slot>> for SlotsResponse {
    fn from(value: Vec<Slot>) -> Self {
        Self {
            items: value.into_iter().map(SlotResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub slot_id: SlotId,
    pub community_code: String,
    pub name: String,
    pub address: String,
    pub description: String,
    pub owner_id: Option<UserId>,
    pub kind: SlotKindName,
    pub ownership_mode: OwnershipModeName,
    pub shareable: bool,
    pub status: SlotStatusName,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

impl From<Slot> for SlotResponse {
    fn from(value: Slot) -> Self {
        let ownership_mode = value.ownership_mode().into();
        let Slot {
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
        Self {
            slot_id,
            community_code,
            name,
            address,
            description,
            owner_id,
            kind: kind.into(),
            ownership_mode,
            shareable,
            status: status.into(),
            hourly_rate,
            daily_rate,
            available_from,
            available_until,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredSlotsResponse {
    pub expired: u64,
}
