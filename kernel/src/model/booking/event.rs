use derive_new::new;

use crate::model::{
    booking::{BookingWindow, PaymentStatus},
    id::{BookingId, SlotId, UserId},
    role::Role,
};

#[derive(Debug, new)]
pub struct CreateBooking {
    pub slot_id: SlotId,
    pub renter_id: UserId,
    pub community_code: String,
    pub window: BookingWindow,
}

#[derive(Debug, new)]
pub struct CancelBooking {
    pub booking_id: BookingId,
    pub requested_by: UserId,
    pub role: Role,
}

#[derive(Debug, new)]
pub struct MarkNoShow {
    pub booking_id: BookingId,
    pub requested_by: UserId,
    pub role: Role,
}

// 決済側コラボレータが記録する決済ステータスの更新
#[derive(Debug, new)]
pub struct UpdatePaymentStatus {
    pub booking_id: BookingId,
    pub payment_status: PaymentStatus,
}
