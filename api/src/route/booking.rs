use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::booking::{
    booking_history, cancel_booking, complete_elapsed_bookings, mark_no_show, reserve_slot,
    show_booking, show_my_bookings, show_my_earnings, update_payment_status,
};

pub fn build_booking_routers() -> Router<AppRegistry> {
    Router::new()
        .route("/slots/:slot_id/bookings", post(reserve_slot))
        .route("/slots/:slot_id/bookings/history", get(booking_history))
        .route("/bookings/me", get(show_my_bookings))
        .route("/bookings/complete-elapsed", post(complete_elapsed_bookings))
        .route("/bookings/:booking_id", get(show_booking))
        .route("/bookings/:booking_id/cancel", post(cancel_booking))
        .route("/bookings/:booking_id/no-show", post(mark_no_show))
        .route("/bookings/:booking_id/payment", put(update_payment_status))
        .route("/earnings/me", get(show_my_earnings))
}
