use std::sync::Arc;

use adapter::database::ConnectionPool;
use adapter::repository::booking::BookingRepositoryImpl;
use adapter::repository::health::HealthCheckRepositoryImpl;
use adapter::repository::slot::SlotRepositoryImpl;
use kernel::repository::booking::BookingRepository;
use kernel::repository::health::HealthCheckRepository;
use kernel::repository::slot::SlotRepository;
use shared::config::AppConfig;

#[derive(Clone)]
pub struct AppRegistry {
    health_check_repository: Arc<dyn HealthCheckRepository>,
    slot_repository: Arc<dyn SlotRepository>,
    booking_repository: Arc<dyn BookingRepository>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, app_config: AppConfig) -> Self {
        let health_check_repository = Arc::new(HealthCheckRepositoryImpl::new(pool.clone()));
        let slot_repository = Arc::new(SlotRepositoryImpl::new(pool.clone()));
        let booking_repository = Arc::new(BookingRepositoryImpl::new(
            pool.clone(),
            app_config.booking.clone(),
        ));
        Self {
            health_check_repository,
            slot_repository,
            booking_repository,
        }
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn slot_repository(&self) -> Arc<dyn SlotRepository> {
        self.slot_repository.clone()
    }

    pub fn booking_repository(&self) -> Arc<dyn BookingRepository> {
        self.booking_repository.clone()
    }
}
