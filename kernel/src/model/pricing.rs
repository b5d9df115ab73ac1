use rust_decimal::{Decimal, RoundingStrategy};
use shared::error::{AppError, AppResult};

const HOURS_PER_DAY: Decimal = Decimal::from_parts(24, 0, 0, false, 0);

// 予約確定時に計算し、予約レコードに凍結する見積もり。
// 後からの料金改定では再計算しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub owner_payout: Decimal,
    pub hourly_rate_snapshot: Option<Decimal>,
}

impl Quote {
    // 24時間未満は時間単価、24時間以上は時間単価と日単価の安い方。
    // 片方しか設定されていないスロットでは設定されている方だけが候補になる。
    pub fn compute(
        hourly_rate: Option<Decimal>,
        daily_rate: Option<Decimal>,
        duration_hours: Decimal,
        fee_rate: Decimal,
    ) -> AppResult<Self> {
        let hourly_cost = hourly_rate.map(|rate| rate * duration_hours);
        let raw_total = if duration_hours < HOURS_PER_DAY {
            hourly_cost
        } else {
            let daily_cost = daily_rate.map(|rate| rate * duration_hours / HOURS_PER_DAY);
            match (daily_cost, hourly_cost) {
                (Some(daily), Some(hourly)) => Some(daily.min(hourly)),
                (daily, hourly) => daily.or(hourly),
            }
        };

        let total_amount = raw_total
            .map(round_currency)
            .filter(|total| *total > Decimal::ZERO)
            .ok_or_else(|| {
                AppError::UnprocessableEntity(
                    "この予約時間ではスロットの料金を計算できません。".into(),
                )
            })?;

        let platform_fee = round_currency(total_amount * fee_rate);
        let owner_payout = total_amount - platform_fee;

        Ok(Self {
            total_amount,
            platform_fee,
            owner_payout,
            hourly_rate_snapshot: hourly_rate,
        })
    }
}

fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
