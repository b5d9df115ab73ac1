use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    booking::{Booking, BookingStatus, Earning, PaymentStatus},
    id::{BookingId, EarningId, SlotId, UserId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatusName {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl From<BookingStatus> for BookingStatusName {
    fn from(value: BookingStatus) -> Self {
        match value {
            BookingStatus::Pending => Self::Pending,
            BookingStatus::Confirmed => Self::Confirmed,
            BookingStatus::Cancelled => Self::Cancelled,
            BookingStatus::Completed => Self::Completed,
            BookingStatus::NoShow => Self::NoShow,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusName {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl From<PaymentStatusName> for PaymentStatus {
    fn from(value: PaymentStatusName) -> Self {
        match value {
            PaymentStatusName::Pending => Self::Pending,
            PaymentStatusName::Completed => Self::Completed,
            PaymentStatusName::Failed => Self::Failed,
            PaymentStatusName::Refunded => Self::Refunded,
        }
    }
}

impl From<PaymentStatus> for PaymentStatusName {
    fn from(value: PaymentStatus) -> Self {
        match value {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Completed => Self::Completed,
            PaymentStatus::Failed => Self::Failed,
            PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

// 時間帯の中身の検査はカーネル側で仕様の順序どおりに行う
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[garde(skip)]
    pub start_time: DateTime<Utc>,
    #[garde(skip)]
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatusName,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsResponse {
    pub items: Vec<BookingResponse>,
}

impl From<Vec<Booking>> for BookingsResponse {
    fn from(value: Vec<Booking>) -> Self {
        Self {
            items: value.into_iter().map(BookingResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub renter_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatusName,
    pub total_amount: Decimal,
    pub hourly_rate_snapshot: Option<Decimal>,
    pub payment_status: PaymentStatusName,
    pub booked_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(value: Booking) -> Self {
        let Booking {
            booking_id,
            slot_id,
            renter_id,
            community_code: _,
            window,
            status,
            total_amount,
            hourly_rate_snapshot,
            payment_status,
            booked_at,
        } = value;
        Self {
            booking_id,
            slot_id,
            renter_id,
            start_time: window.start_time,
            end_time: window.end_time,
            status: status.into(),
            total_amount,
            hourly_rate_snapshot,
            payment_status: payment_status.into(),
            booked_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsResponse {
    pub items: Vec<EarningResponse>,
}

impl From<Vec<Earning>> for EarningsResponse {
    fn from(value: Vec<Earning>) -> Self {
        Self {
            items: value.into_iter().map(EarningResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningResponse {
    pub earning_id: EarningId,
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub owner_payout: Decimal,
}

impl From<Earning> for EarningResponse {
    fn from(value: Earning) -> Self {
        let Earning {
            earning_id,
            booking_id,
            slot_id,
            owner_id: _,
            amount,
            platform_fee,
            owner_payout,
        } = value;
        Self {
            earning_id,
            booking_id,
            slot_id,
            amount,
            platform_fee,
            owner_payout,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedBookingsResponse {
    pub completed: u64,
}
