use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::slot::{
    expire_stale_slots, register_slot, relist_slot, show_available_slots, show_slot, update_slot,
    update_slot_status,
};

pub fn build_slot_routers() -> Router<AppRegistry> {
    let slot_routers = Router::new()
        .route("/", post(register_slot))
        .route("/", get(show_available_slots))
        .route("/expire-stale", post(expire_stale_slots))
        .route("/:slot_id", get(show_slot))
        .route("/:slot_id", put(update_slot))
        .route("/:slot_id/status", put(update_slot_status))
        .route("/:slot_id/relist", post(relist_slot));

    Router::new().nest("/slots", slot_routers)
}
