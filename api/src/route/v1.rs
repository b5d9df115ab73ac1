use axum::Router;
use registry::AppRegistry;

use super::{
    booking::build_booking_routers, health::build_health_check_routers, slot::build_slot_routers,
};

pub fn routes() -> Router<AppRegistry> {
    let router = Router::new()
        .merge(build_health_check_routers())
        .merge(build_slot_routers())
        .merge(build_booking_routers());
    Router::new().nest("/api/v1", router)
}
