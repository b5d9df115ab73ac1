use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::model::{
    booking::{Booking, BookingStatus, BookingWindow, Earning, PaymentStatus},
    id::{BookingId, EarningId, SlotId, UserId},
};
use rust_decimal::Decimal;
use shared::error::AppError;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub renter_id: UserId,
    pub community_code: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub total_amount: Decimal,
    pub hourly_rate_snapshot: Option<Decimal>,
    pub payment_status: String,
    pub booked_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(value: BookingRow) -> Result<Self, Self::Error> {
        let BookingRow {
            booking_id,
            slot_id,
            renter_id,
            community_code,
            start_time,
            end_time,
            status,
            total_amount,
            hourly_rate_snapshot,
            payment_status,
            booked_at,
        } = value;
        let status = BookingStatus::from_str(&status).map_err(|_| {
            AppError::ConversionEntityError(format!("unknown booking status: {status}"))
        })?;
        let payment_status = PaymentStatus::from_str(&payment_status).map_err(|_| {
            AppError::ConversionEntityError(format!("unknown payment status: {payment_status}"))
        })?;
        Ok(Booking {
            booking_id,
            slot_id,
            renter_id,
            community_code,
            window: BookingWindow::new(start_time, end_time),
            status,
            total_amount,
            hourly_rate_snapshot,
            payment_status,
            booked_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct EarningRow {
    pub earning_id: EarningId,
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub owner_id: Option<UserId>,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub owner_payout: Decimal,
}

impl From<EarningRow> for Earning {
    fn from(value: EarningRow) -> Self {
        let EarningRow {
            earning_id,
            booking_id,
            slot_id,
            owner_id,
            amount,
            platform_fee,
            owner_payout,
        } = value;
        Earning {
            earning_id,
            booking_id,
            slot_id,
            owner_id,
            amount,
            platform_fee,
            owner_payout,
        }
    }
}
