use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::model::id::SlotId;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{
    extractor::AuthorizedMember,
    model::slot::{
        CreateSlotRequest, CreateSlotRequestWithMember, CreatedSlotResponse, ExpiredSlotsResponse,
        RelistSlotRequest, RelistSlotRequestWithIds, SlotListQuery, SlotListQueryWithCommunity,
        SlotResponse, SlotsResponse, UpdateSlotRequest, UpdateSlotRequestWithIds,
        UpdateSlotStatusRequest, UpdateSlotStatusRequestWithIds,
    },
};

pub async fn register_slot(
    member: AuthorizedMember,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateSlotRequest>,
) -> AppResult<(StatusCode, Json<CreatedSlotResponse>)> {
    req.validate(&())?;

    // 所有者のいないスロット（共用・来客用）を作れるのは管理者だけ
    if !req.owned && !member.is_admin() {
        return Err(AppError::ForbiddenOperation(
            "共用スロットの登録は管理者のみ行えます。".into(),
        ));
    }

    let event = CreateSlotRequestWithMember::new(member.community_code.clone(), member.id(), req);
    registry
        .slot_repository()
        .create(event.into())
        .await
        .map(|slot_id| (StatusCode::CREATED, Json(CreatedSlotResponse { slot_id })))
}

pub async fn show_available_slots(
    member: AuthorizedMember,
    Query(query): Query<SlotListQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<SlotsResponse>> {
    query.validate(&())?;

    let options = SlotListQueryWithCommunity::new(member.community_code.clone(), query);
    registry
        .slot_repository()
        .find_available(options.into())
        .await
        .map(SlotsResponse::from)
        .map(Json)
}

pub async fn show_slot(
    _member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<SlotResponse>> {
    registry
        .slot_repository()
        .find_by_id(slot_id)
        .await
        .and_then(|slot| match slot {
            Some(slot) => Ok(Json(slot.into())),
            None => Err(AppError::EntityNotFound(format!(
                "スロット（{}）が見つかりませんでした。",
                slot_id
            ))),
        })
}

pub async fn update_slot(
    member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<UpdateSlotRequest>,
) -> AppResult<StatusCode> {
    req.validate(&())?;

    let update = UpdateSlotRequestWithIds::new(slot_id, member.id(), member.role, req);
    registry
        .slot_repository()
        .update(update.into())
        .await
        .map(|_| StatusCode::OK)
}

pub async fn update_slot_status(
    member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<UpdateSlotStatusRequest>,
) -> AppResult<StatusCode> {
    let update = UpdateSlotStatusRequestWithIds::new(slot_id, member.id(), member.role, req);
    registry
        .slot_repository()
        .update_status(update.into())
        .await
        .map(|_| StatusCode::OK)
}

pub async fn relist_slot(
    member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<RelistSlotRequest>,
) -> AppResult<StatusCode> {
    let relist = RelistSlotRequestWithIds::new(slot_id, member.id(), member.role, req);
    registry
        .slot_repository()
        .relist(relist.into())
        .await
        .map(|_| StatusCode::OK)
}

// 外部スケジューラから定期的に叩かれる想定のスイープ
pub async fn expire_stale_slots(
    member: AuthorizedMember,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<ExpiredSlotsResponse>> {
    if !member.is_admin() {
        return Err(AppError::ForbiddenOperation(
            "スイープの実行は管理者のみ行えます。".into(),
        ));
    }

    registry
        .slot_repository()
        .expire_stale()
        .await
        .map(|expired| Json(ExpiredSlotsResponse { expired }))
}
