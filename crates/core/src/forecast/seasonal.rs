use crate::domain::sales::YearMonth;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_HISTORY_DAYS: i64 = 365;
pub const MIN_MONTHS_PER_YEAR: usize = 6;
pub const MIN_UNITS_PER_YEAR: f64 = 12.0;
pub const MIN_CORRELATION: f64 = 0.6;

const FACTOR_FLOOR: f64 = 0.5;
const FACTOR_CEILING: f64 = 4.0;
const UNIFORM_SHARE: f64 = 1.0 / 12.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalValidation {
    pub is_valid: bool,
    pub correlation: f64,
    pub years_compared: usize,
}

/// Validated year-over-year pattern: share of yearly sales per calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    pub validation: SeasonalValidation,
    pub monthly_share: [f64; 12],
}

impl SeasonalProfile {
    /// Builds a profile from monthly totals. Years with fewer than six selling months or twelve
    /// units are ignored; a pattern is only trusted when consecutive years correlate.
    pub fn from_monthly(monthly: &BTreeMap<YearMonth, f64>) -> Self {
        let mut years: BTreeMap<i32, [f64; 12]> = BTreeMap::new();
        for (ym, qty) in monthly {
            if !(1..=12).contains(&ym.month) {
                continue;
            }
            years.entry(ym.year).or_insert([0.0; 12])[(ym.month - 1) as usize] += qty.max(0.0);
        }

        let shares: Vec<[f64; 12]> = years
            .values()
            .filter(|months| {
                let with_data = months.iter().filter(|q| **q > 0.0).count();
                with_data >= MIN_MONTHS_PER_YEAR && months.iter().sum::<f64>() >= MIN_UNITS_PER_YEAR
            })
            .map(|months| {
                let total: f64 = months.iter().sum();
                let mut out = [0.0; 12];
                for (share, qty) in out.iter_mut().zip(months) {
                    *share = qty / total;
                }
                out
            })
            .collect();

        let mut monthly_share = [UNIFORM_SHARE; 12];
        if shares.len() < 2 {
            return Self {
                validation: SeasonalValidation {
                    is_valid: false,
                    correlation: 0.0,
                    years_compared: shares.len(),
                },
                monthly_share,
            };
        }

        let correlations: Vec<f64> = shares
            .windows(2)
            .map(|pair| pearson(&percentages(&pair[0]), &percentages(&pair[1])))
            .collect();
        let correlation = correlations.iter().sum::<f64>() / correlations.len() as f64;

        for (m, slot) in monthly_share.iter_mut().enumerate() {
            *slot = shares.iter().map(|s| s[m]).sum::<f64>() / shares.len() as f64;
        }

        Self {
            validation: SeasonalValidation {
                is_valid: correlation >= MIN_CORRELATION,
                correlation,
                years_compared: shares.len(),
            },
            monthly_share,
        }
    }

    /// Day-weighted share of the coverage window `[today+lead, today+lead+target)` relative to
    /// a flat year, clamped to `[0.5, 4.0]`.
    pub fn coverage_factor(&self, today: NaiveDate, lead_time: i64, target_days: i64) -> f64 {
        if target_days <= 0 {
            return 1.0;
        }

        let start = today + Duration::days(lead_time.max(0));
        let mut days_per_month = [0i64; 12];
        for offset in 0..target_days {
            let day = start + Duration::days(offset);
            days_per_month[day.month0() as usize] += 1;
        }

        let blended: f64 = days_per_month
            .iter()
            .zip(self.monthly_share.iter())
            .map(|(days, share)| *days as f64 * share)
            .sum::<f64>()
            / target_days as f64;

        (blended / UNIFORM_SHARE).clamp(FACTOR_FLOOR, FACTOR_CEILING)
    }
}

fn percentages(shares: &[f64; 12]) -> [f64; 12] {
    let mut out = [0.0; 12];
    for (pct, share) in out.iter_mut().zip(shares) {
        *pct = share * 100.0;
    }
    out
}

/// Pearson correlation; zero when either series is flat.
fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    cov / denom
}
