use crate::domain::supplier::{ClosedPeriod, Supplier};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on closure hops when searching for the next open day.
pub const MAX_REOPEN_ITERATIONS: u32 = 365;

/// A day/month pair without a year, ordered as MM-DD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(day: u32, month: u32) -> Option<Self> {
        if (1..=31).contains(&day) && (1..=12).contains(&month) {
            Some(Self { month, day })
        } else {
            None
        }
    }

    /// Comparable MM-DD key, e.g. 20-12 becomes 1220.
    pub fn key(self) -> u32 {
        self.month * 100 + self.day
    }

    pub fn from_key(key: u32) -> Option<Self> {
        Self::new(key % 100, key / 100)
    }

    /// Projects onto `year`, clamping to the month's last day (29-02 in a common year is 28-02).
    pub fn in_year(self, year: i32) -> Option<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(year, self.month, 1)?;
        let next_month = if self.month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, self.month + 1, 1)?
        };
        let last_day = (next_month - first).num_days() as u32;
        NaiveDate::from_ymd_opt(year, self.month, self.day.min(last_day))
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.day, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedClosedPeriod {
    pub period_id: i64,
    pub name: Option<String>,
    pub closure_start: NaiveDate,
    /// Inclusive.
    pub closure_end: NaiveDate,
    pub crosses_year: bool,
}

impl NormalizedClosedPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.closure_start <= date && date <= self.closure_end
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("{} to {}", self.closure_start, self.closure_end),
        }
    }
}

/// Raised when the next-open-day search keeps landing inside closures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAnomaly {
    pub requested: NaiveDate,
    pub iterations: u32,
    pub last_period: Option<String>,
}

impl fmt::Display for CalendarAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no open day found after {} closure hops from {} (last period: {})",
            self.iterations,
            self.requested,
            self.last_period.as_deref().unwrap_or("n/a")
        )
    }
}

impl std::error::Error for CalendarAnomaly {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTimeAdjustment {
    pub base_lead_time: i64,
    pub lead_time: i64,
    pub reason: Option<String>,
    pub anomaly: Option<CalendarAnomaly>,
}

impl LeadTimeAdjustment {
    fn unchanged(base_lead_time: i64) -> Self {
        Self {
            base_lead_time,
            lead_time: base_lead_time,
            reason: None,
            anomaly: None,
        }
    }

    pub fn is_adjusted(&self) -> bool {
        self.lead_time != self.base_lead_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureTrigger {
    /// The last safe order date before the closure has already passed.
    OrderDeadlinePassed,
    /// Stock runs out while the supplier is closed.
    DepletesDuringClosure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRisk {
    pub period: NormalizedClosedPeriod,
    pub trigger: ClosureTrigger,
    pub order_deadline: NaiveDate,
    pub stockout_in_days: f64,
    pub extra_days: i64,
}

/// Expands the supplier's presets and custom closures into dated windows for `today`'s year and
/// the next one. A year-crossing closure that began last year and is still running on `today` is
/// kept as well. Periods with out-of-range day/month values are dropped.
pub fn get_periods(
    supplier: &Supplier,
    presets: &[ClosedPeriod],
    today: NaiveDate,
) -> Vec<NormalizedClosedPeriod> {
    let selected = presets
        .iter()
        .filter(|p| supplier.preset_ids.contains(&p.id))
        .chain(supplier.closed_periods.iter());
    normalize_periods(selected, today)
}

fn normalize_periods<'a>(
    sources: impl IntoIterator<Item = &'a ClosedPeriod>,
    today: NaiveDate,
) -> Vec<NormalizedClosedPeriod> {
    let current_year = today.year();
    let mut out = Vec::new();
    for source in sources {
        let (Some(start), Some(end)) = (
            MonthDay::new(source.start_day, source.start_month),
            MonthDay::new(source.end_day, source.end_month),
        ) else {
            tracing::debug!(period_id = source.id, "dropping closed period with invalid day/month");
            continue;
        };

        let crosses_year = start.key() > end.key();
        for year in [current_year - 1, current_year, current_year + 1] {
            let end_year = if crosses_year { year + 1 } else { year };
            let (Some(closure_start), Some(closure_end)) = (start.in_year(year), end.in_year(end_year))
            else {
                continue;
            };
            if year < current_year && !(crosses_year && closure_end >= today) {
                continue;
            }
            out.push(NormalizedClosedPeriod {
                period_id: source.id,
                name: source.name.clone(),
                closure_start,
                closure_end,
                crosses_year,
            });
        }
    }
    out
}

/// Closure windows for one supplier, anchored at an as-of date.
#[derive(Debug, Clone)]
pub struct ClosurePeriodCalendar {
    today: NaiveDate,
    periods: Vec<NormalizedClosedPeriod>,
}

impl ClosurePeriodCalendar {
    pub fn for_supplier(supplier: &Supplier, presets: &[ClosedPeriod], today: NaiveDate) -> Self {
        Self {
            today,
            periods: get_periods(supplier, presets, today),
        }
    }

    pub fn from_periods<'a>(
        sources: impl IntoIterator<Item = &'a ClosedPeriod>,
        today: NaiveDate,
    ) -> Self {
        Self {
            today,
            periods: normalize_periods(sources, today),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn periods(&self) -> &[NormalizedClosedPeriod] {
        &self.periods
    }

    pub fn is_closed(&self, date: NaiveDate) -> Option<&NormalizedClosedPeriod> {
        self.periods.iter().find(|p| p.contains(date))
    }

    /// First open day on or after `date`. Exhausting the hop budget yields an anomaly carrying
    /// the requested date, which callers use as the fallback.
    pub fn next_open_date(&self, date: NaiveDate) -> Result<NaiveDate, CalendarAnomaly> {
        let mut current = date;
        let mut last_period = None;
        for _ in 0..MAX_REOPEN_ITERATIONS {
            match self.is_closed(current) {
                None => return Ok(current),
                Some(period) => {
                    last_period = Some(period.label());
                    current = period.closure_end + Duration::days(1);
                }
            }
        }

        Err(CalendarAnomaly {
            requested: date,
            iterations: MAX_REOPEN_ITERATIONS,
            last_period,
        })
    }

    /// Type A: stretch the lead time when the expected delivery lands inside a closure.
    pub fn adjusted_lead_time(&self, base_lead_time: i64) -> LeadTimeAdjustment {
        let base = base_lead_time.max(1);
        let expected = self.today + Duration::days(base);
        let Some(period) = self.is_closed(expected) else {
            return LeadTimeAdjustment::unchanged(base);
        };
        let label = period.label();

        match self.next_open_date(expected) {
            Ok(reopen) => {
                let days_until_open = (reopen - self.today).num_days();
                LeadTimeAdjustment {
                    base_lead_time: base,
                    lead_time: base.max(days_until_open),
                    reason: Some(format!(
                        "expected delivery {expected} falls in closure '{label}', reopening {reopen}"
                    )),
                    anomaly: None,
                }
            }
            Err(anomaly) => {
                tracing::warn!(%expected, anomaly = %anomaly, "closure reopen search exhausted; keeping base lead time");
                LeadTimeAdjustment {
                    base_lead_time: base,
                    lead_time: base,
                    reason: Some(format!(
                        "expected delivery {expected} falls in closure '{label}' with no reopening found"
                    )),
                    anomaly: Some(anomaly),
                }
            }
        }
    }

    /// Type B: does stock run out around an upcoming closure in a way that needs an order now?
    pub fn closure_depletion_risk(
        &self,
        effective_stock: f64,
        avg_daily_sales: f64,
        lead_time: i64,
    ) -> Option<ClosureRisk> {
        if avg_daily_sales <= 0.0 || !avg_daily_sales.is_finite() {
            return None;
        }
        let stockout_in_days = effective_stock.max(0.0) / avg_daily_sales;

        let mut upcoming: Vec<&NormalizedClosedPeriod> = self
            .periods
            .iter()
            .filter(|p| p.closure_start > self.today)
            .collect();
        upcoming.sort_by_key(|p| p.closure_start);

        for period in upcoming {
            let start_in = (period.closure_start - self.today).num_days() as f64;
            let end_in = (period.closure_end - self.today).num_days() as f64;
            let deadline_in = start_in - lead_time as f64;

            let trigger = if deadline_in < stockout_in_days && stockout_in_days < end_in {
                ClosureTrigger::OrderDeadlinePassed
            } else if start_in <= stockout_in_days && stockout_in_days <= end_in {
                ClosureTrigger::DepletesDuringClosure
            } else {
                continue;
            };

            return Some(ClosureRisk {
                period: period.clone(),
                trigger,
                order_deadline: period.closure_start - Duration::days(lead_time),
                stockout_in_days,
                extra_days: (period.closure_end - self.today).num_days() + lead_time,
            });
        }

        None
    }

    /// Closed days in `[from, to)`.
    pub fn closed_days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let mut count = 0;
        let mut day = from;
        while day < to {
            if self.is_closed(day).is_some() {
                count += 1;
            }
            day = day + Duration::days(1);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::supplier::ClosedPeriodKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn period(id: i64, start: (u32, u32), end: (u32, u32)) -> ClosedPeriod {
        ClosedPeriod {
            id,
            name: Some(format!("closure {id}")),
            kind: ClosedPeriodKind::Custom,
            start_day: start.0,
            start_month: start.1,
            end_day: end.0,
            end_month: end.1,
        }
    }

    fn holiday_calendar(today: NaiveDate) -> ClosurePeriodCalendar {
        ClosurePeriodCalendar::from_periods(&[period(1, (20, 12), (5, 1))], today)
    }

    #[test]
    fn month_day_key_round_trips() {
        for month in 1..=12 {
            for day in 1..=31 {
                let md = MonthDay::new(day, month).unwrap();
                assert_eq!(MonthDay::from_key(md.key()), Some(md));
            }
        }
        assert!(MonthDay::new(32, 1).is_none());
        assert!(MonthDay::new(1, 13).is_none());
        assert!(MonthDay::new(0, 5).is_none());
    }

    #[test]
    fn leap_day_clamps_in_common_years() {
        let md = MonthDay::new(29, 2).unwrap();
        assert_eq!(md.in_year(2026), Some(d(2026, 2, 28)));
        assert_eq!(md.in_year(2028), Some(d(2028, 2, 29)));
    }

    #[test]
    fn emits_two_years_and_marks_year_crossing() {
        let cal = holiday_calendar(d(2026, 10, 19));
        let periods = cal.periods();
        assert_eq!(periods.len(), 2);
        assert!(periods.iter().all(|p| p.crosses_year));
        assert_eq!(periods[0].closure_start, d(2026, 12, 20));
        assert_eq!(periods[0].closure_end, d(2027, 1, 5));
        assert_eq!(periods[1].closure_start, d(2027, 12, 20));
        assert_eq!(periods[1].closure_end, d(2028, 1, 5));
    }

    #[test]
    fn keeps_last_years_closure_running_into_january() {
        let cal = holiday_calendar(d(2027, 1, 2));
        let periods = cal.periods();
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].closure_start, d(2026, 12, 20));
        assert_eq!(periods[0].closure_end, d(2027, 1, 5));
        assert!(cal.is_closed(d(2027, 1, 3)).is_some());
        assert!(cal.is_closed(d(2027, 1, 6)).is_none());

        let adj = cal.adjusted_lead_time(1);
        assert_eq!(adj.lead_time, 4);

        let after = holiday_calendar(d(2027, 1, 6));
        assert_eq!(after.periods().len(), 2);
        assert_eq!(after.periods()[0].closure_start, d(2027, 12, 20));
    }

    #[test]
    fn merges_selected_presets_with_custom_periods_and_drops_invalid() {
        let mut preset = period(10, (1, 8), (15, 8));
        preset.kind = ClosedPeriodKind::Preset;
        let unused = period(11, (1, 3), (2, 3));
        let supplier = Supplier {
            id: 1,
            name: "Roastery".to_string(),
            lead_time_days: Some(14),
            orders_per_year: None,
            preset_ids: vec![10],
            closed_periods: vec![period(20, (24, 12), (26, 12)), period(21, (31, 13), (2, 1))],
        };

        let periods = get_periods(&supplier, &[preset, unused], d(2026, 1, 10));
        let ids: Vec<i64> = periods.iter().map(|p| p.period_id).collect();
        assert_eq!(ids, vec![10, 10, 20, 20]);
    }

    #[test]
    fn is_closed_is_inclusive_on_both_ends() {
        let cal = holiday_calendar(d(2026, 10, 19));
        assert!(cal.is_closed(d(2026, 12, 19)).is_none());
        assert!(cal.is_closed(d(2026, 12, 20)).is_some());
        assert!(cal.is_closed(d(2027, 1, 5)).is_some());
        assert!(cal.is_closed(d(2027, 1, 6)).is_none());
    }

    #[test]
    fn next_open_date_hops_adjacent_closures() {
        let cal = ClosurePeriodCalendar::from_periods(
            &[period(1, (1, 8), (10, 8)), period(2, (11, 8), (20, 8))],
            d(2026, 7, 1),
        );
        assert_eq!(cal.next_open_date(d(2026, 8, 5)), Ok(d(2026, 8, 21)));
        assert_eq!(cal.next_open_date(d(2026, 7, 5)), Ok(d(2026, 7, 5)));
    }

    #[test]
    fn next_open_date_reports_exhaustion() {
        let mut sources = Vec::new();
        let mut day = d(2026, 1, 1);
        while day.year() == 2026 {
            sources.push(period(sources.len() as i64, (day.day(), day.month()), (day.day(), day.month())));
            day = day + Duration::days(1);
        }
        let cal = ClosurePeriodCalendar::from_periods(&sources, d(2026, 1, 1));

        let err = cal.next_open_date(d(2026, 1, 1)).unwrap_err();
        assert_eq!(err.requested, d(2026, 1, 1));
        assert_eq!(err.iterations, MAX_REOPEN_ITERATIONS);

        let adjusted = cal.adjusted_lead_time(14);
        assert_eq!(adjusted.lead_time, 14);
        assert!(adjusted.anomaly.is_some());
    }

    #[test]
    fn delivery_before_closure_keeps_lead_time() {
        let cal = holiday_calendar(d(2026, 12, 1));
        let adjusted = cal.adjusted_lead_time(14);
        assert_eq!(adjusted.lead_time, 14);
        assert!(adjusted.reason.is_none());
        assert!(!adjusted.is_adjusted());
    }

    #[test]
    fn delivery_inside_closure_extends_to_reopening() {
        let cal = holiday_calendar(d(2026, 12, 10));
        let adjusted = cal.adjusted_lead_time(14);
        // 2026-12-10 -> 2027-01-06
        assert_eq!(adjusted.lead_time, 27);
        assert_eq!(adjusted.base_lead_time, 14);
        assert!(adjusted.reason.unwrap().contains("2027-01-06"));
    }

    #[test]
    fn adjusted_lead_time_never_shrinks() {
        let cal = holiday_calendar(d(2026, 11, 1));
        for base in 1..=120 {
            assert!(cal.adjusted_lead_time(base).lead_time >= base);
        }
    }

    #[test]
    fn depletion_after_order_deadline_triggers() {
        // closure starts in 62 days; lead time 14 -> deadline in 48 days
        let cal = holiday_calendar(d(2026, 10, 19));
        let risk = cal.closure_depletion_risk(100.0, 2.0, 14).unwrap();
        assert_eq!(risk.trigger, ClosureTrigger::OrderDeadlinePassed);
        assert_eq!(risk.order_deadline, d(2026, 12, 6));
        // closure ends 2027-01-05, 78 days out
        assert_eq!(risk.extra_days, 78 + 14);
    }

    #[test]
    fn depletion_on_last_closure_day_triggers() {
        // 78 days to closure end; 156 / 2 = 78 exactly
        let cal = holiday_calendar(d(2026, 10, 19));
        let risk = cal.closure_depletion_risk(156.0, 2.0, 14).unwrap();
        assert_eq!(risk.trigger, ClosureTrigger::DepletesDuringClosure);
    }

    #[test]
    fn stock_outlasting_or_preceding_deadline_is_safe() {
        let cal = holiday_calendar(d(2026, 10, 19));
        // runs out in 20 days, well before the 48-day deadline
        assert!(cal.closure_depletion_risk(40.0, 2.0, 14).is_none());
        // runs out after the closure ends and before next year's closure deadline
        assert!(cal.closure_depletion_risk(400.0, 2.0, 14).is_none());
        // no demand
        assert!(cal.closure_depletion_risk(10.0, 0.0, 14).is_none());
    }

    #[test]
    fn counts_closed_days_in_range() {
        let cal = holiday_calendar(d(2026, 12, 1));
        assert_eq!(cal.closed_days_between(d(2026, 12, 1), d(2026, 12, 29)), 9);
        assert_eq!(cal.closed_days_between(d(2026, 12, 1), d(2026, 12, 1)), 0);
    }
}
