use chrono::{Duration, NaiveDate};

pub const BASE_WINDOW_DAYS: i64 = 365;
pub const RECENT_WINDOW_DAYS: i64 = 30;

const BASE_WEIGHT: f64 = 0.3;
const RECENT_WEIGHT: f64 = 0.7;
const TREND_FLOOR: f64 = 0.5;
const TREND_CEILING: f64 = 2.0;
const COMBINED_FLOOR: f64 = 0.4;
const COMBINED_CEILING: f64 = 10.0;

/// First day of a `days`-long window that ends on `as_of` inclusive.
pub fn window_start(as_of: NaiveDate, days: i64) -> NaiveDate {
    as_of - Duration::days(days.max(1) - 1)
}

/// Units sold in the base window spread over the product's age, capped at one year.
pub fn base_average(total_sold: f64, age_days: i64) -> f64 {
    let days = age_days.clamp(1, BASE_WINDOW_DAYS) as f64;
    (total_sold.max(0.0) / days).max(0.0)
}

/// Leans the base average towards the last 30 days, bounded to half/double the base.
pub fn trend_adjustment(base: f64, recent_average: f64, history_days: i64) -> f64 {
    if history_days < RECENT_WINDOW_DAYS || recent_average <= 0.0 || base <= 0.0 {
        return base;
    }
    let blended = BASE_WEIGHT * base + RECENT_WEIGHT * recent_average;
    blended.clamp(TREND_FLOOR * base, TREND_CEILING * base)
}

/// Bounds the result of stacked adjustments relative to the base average.
pub fn combined_cap(value: f64, base: f64) -> f64 {
    if base <= 0.0 {
        return value.max(0.0);
    }
    value.clamp(COMBINED_FLOOR * base, COMBINED_CEILING * base)
}
