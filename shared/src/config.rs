use anyhow::Result;
use rust_decimal::Decimal;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub booking: BookingPolicy,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            host: std::env::var("DATABASE_HOST")?,
            port: std::env::var("DATABASE_PORT")?.parse::<u16>()?,
            username: std::env::var("DATABASE_USERNAME")?,
            password: std::env::var("DATABASE_PASSWORD")?,
            database: std::env::var("DATABASE_NAME")?,
        };
        let booking = BookingPolicy::from_env()?;
        Ok(Self { database, booking })
    }
}

pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

// 予約エンジンのポリシー定数。環境変数で上書きできる。
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub min_duration_hours: i64,
    pub max_duration_hours: i64,
    pub max_advance_days: i64,
    pub grace_hours: i64,
    pub platform_fee_rate: Decimal,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_duration_hours: 1,
            max_duration_hours: 24 * 30,
            max_advance_days: 90,
            grace_hours: 1,
            // 10%
            platform_fee_rate: Decimal::new(10, 2),
        }
    }
}

impl BookingPolicy {
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            min_duration_hours: env_or("BOOKING_MIN_DURATION_HOURS", default.min_duration_hours)?,
            max_duration_hours: env_or("BOOKING_MAX_DURATION_HOURS", default.max_duration_hours)?,
            max_advance_days: env_or("BOOKING_MAX_ADVANCE_DAYS", default.max_advance_days)?,
            grace_hours: env_or("BOOKING_GRACE_HOURS", default.grace_hours)?,
            platform_fee_rate: env_or("PLATFORM_FEE_RATE", default.platform_fee_rate)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => Ok(v.parse::<T>()?),
    }
}
