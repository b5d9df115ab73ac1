use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::model::{
    booking::{
        event::{CancelBooking, CreateBooking, MarkNoShow, UpdatePaymentStatus},
        BookingWindow,
    },
    id::{BookingId, SlotId},
};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{
    extractor::AuthorizedMember,
    model::booking::{
        BookingResponse, BookingsResponse, CompletedBookingsResponse, CreateBookingRequest,
        EarningsResponse, UpdatePaymentStatusRequest,
    },
};

pub async fn reserve_slot(
    member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    req.validate(&())?;

    let event = CreateBooking::new(
        slot_id,
        member.id(),
        member.community_code.clone(),
        BookingWindow::new(req.start_time, req.end_time),
    );
    registry
        .booking_repository()
        .create(event)
        .await
        .map(|booking| (StatusCode::CREATED, Json(booking.into())))
}

pub async fn cancel_booking(
    member: AuthorizedMember,
    Path(booking_id): Path<BookingId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingResponse>> {
    let event = CancelBooking::new(booking_id, member.id(), member.role);
    registry
        .booking_repository()
        .cancel(event)
        .await
        .map(BookingResponse::from)
        .map(Json)
}

pub async fn mark_no_show(
    member: AuthorizedMember,
    Path(booking_id): Path<BookingId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    let event = MarkNoShow::new(booking_id, member.id(), member.role);
    registry
        .booking_repository()
        .mark_no_show(event)
        .await
        .map(|_| StatusCode::OK)
}

pub async fn show_booking(
    _member: AuthorizedMember,
    Path(booking_id): Path<BookingId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingResponse>> {
    registry
        .booking_repository()
        .find_by_id(booking_id)
        .await
        .map(BookingResponse::from)
        .map(Json)
}

pub async fn show_my_bookings(
    member: AuthorizedMember,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingsResponse>> {
    registry
        .booking_repository()
        .find_active_by_user(member.id())
        .await
        .map(BookingsResponse::from)
        .map(Json)
}

pub async fn booking_history(
    _member: AuthorizedMember,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<BookingsResponse>> {
    registry
        .booking_repository()
        .find_history_by_slot(slot_id)
        .await
        .map(BookingsResponse::from)
        .map(Json)
}

pub async fn show_my_earnings(
    member: AuthorizedMember,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<EarningsResponse>> {
    registry
        .booking_repository()
        .find_earnings_by_owner(member.id())
        .await
        .map(EarningsResponse::from)
        .map(Json)
}

// 決済コラボレータが決済結果を記録するための口
pub async fn update_payment_status(
    member: AuthorizedMember,
    Path(booking_id): Path<BookingId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> AppResult<StatusCode> {
    if !member.is_admin() {
        return Err(AppError::ForbiddenOperation(
            "決済ステータスの更新は管理者のみ行えます。".into(),
        ));
    }

    let event = UpdatePaymentStatus::new(booking_id, req.payment_status.into());
    registry
        .booking_repository()
        .update_payment_status(event)
        .await
        .map(|_| StatusCode::OK)
}

// 外部スケジューラから定期的に叩かれる想定のスイープ
pub async fn complete_elapsed_bookings(
    member: AuthorizedMember,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<CompletedBookingsResponse>> {
    if !member.is_admin() {
        return Err(AppError::ForbiddenOperation(
            "スイープの実行は管理者のみ行えます。".into(),
        ));
    }

    registry
        .booking_repository()
        .complete_elapsed()
        .await
        .map(|completed| Json(CompletedBookingsResponse { completed }))
}
