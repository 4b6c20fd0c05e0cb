pub mod directory;
pub mod domain;
pub mod forecast;
pub mod reorder;
pub mod storage;
pub mod time;

pub mod config {
    use crate::domain::supplier::DEFAULT_LEAD_TIME_DAYS;
    use crate::forecast::safety::ServiceLevel;
    use anyhow::Context;
    use serde::{Deserialize, Serialize};
    use std::str::FromStr;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub reorder: ReorderSettings,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                reorder: ReorderSettings::from_env()?,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    /// Global defaults for the reorder engine; suppliers may override some per supplier.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ReorderSettings {
        pub orders_per_year: i64,
        pub service_level: ServiceLevel,
        pub seasonal_enabled: bool,
        pub predictive_enabled: bool,
        pub time_prediction_enabled: bool,
        pub safety_margin_percent: f64,
        pub cooldown_days: i64,
        pub default_lead_time_days: i64,
    }

    impl Default for ReorderSettings {
        fn default() -> Self {
            Self {
                orders_per_year: 4,
                service_level: ServiceLevel::P95,
                seasonal_enabled: true,
                predictive_enabled: false,
                time_prediction_enabled: false,
                safety_margin_percent: 20.0,
                cooldown_days: 30,
                default_lead_time_days: DEFAULT_LEAD_TIME_DAYS,
            }
        }
    }

    impl ReorderSettings {
        pub fn from_env() -> anyhow::Result<Self> {
            let mut out = Self::default();

            if let Some(n) = env_parse::<i64>("REORDER_ORDERS_PER_YEAR")? {
                out.orders_per_year = n;
            }
            if let Some(n) = env_parse::<u32>("REORDER_SERVICE_LEVEL")? {
                out.service_level = ServiceLevel::from_percent(n);
            }
            if let Some(b) = env_flag("REORDER_SEASONAL_ENABLED")? {
                out.seasonal_enabled = b;
            }
            if let Some(b) = env_flag("REORDER_PREDICTIVE_ENABLED")? {
                out.predictive_enabled = b;
            }
            if let Some(b) = env_flag("REORDER_TIME_PREDICTION_ENABLED")? {
                out.time_prediction_enabled = b;
            }
            if let Some(n) = env_parse::<f64>("REORDER_SAFETY_MARGIN_PERCENT")? {
                out.safety_margin_percent = n;
            }
            if let Some(n) = env_parse::<i64>("REORDER_COOLDOWN_DAYS")? {
                out.cooldown_days = n;
            }
            if let Some(n) = env_parse::<i64>("REORDER_DEFAULT_LEAD_TIME_DAYS")? {
                out.default_lead_time_days = n;
            }

            out.validate()?;
            Ok(out)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(
                (1..=12).contains(&self.orders_per_year),
                "REORDER_ORDERS_PER_YEAR must be 1..=12 (got {})",
                self.orders_per_year
            );
            anyhow::ensure!(
                self.safety_margin_percent >= 0.0,
                "REORDER_SAFETY_MARGIN_PERCENT must be >= 0 (got {})",
                self.safety_margin_percent
            );
            anyhow::ensure!(
                self.cooldown_days >= 0,
                "REORDER_COOLDOWN_DAYS must be >= 0 (got {})",
                self.cooldown_days
            );
            anyhow::ensure!(
                self.default_lead_time_days >= 1,
                "REORDER_DEFAULT_LEAD_TIME_DAYS must be >= 1 (got {})",
                self.default_lead_time_days
            );
            Ok(())
        }
    }

    fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
            _ => Ok(None),
        }
    }

    fn env_flag(key: &str) -> anyhow::Result<Option<bool>> {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => parse_flag(&s)
                .map(Some)
                .with_context(|| format!("{key} must be a boolean (got {s:?})")),
            _ => Ok(None),
        }
    }

    fn parse_flag(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_common_flag_spellings() {
            assert_eq!(parse_flag(" YES "), Some(true));
            assert_eq!(parse_flag("off"), Some(false));
            assert_eq!(parse_flag("maybe"), None);
        }

        #[test]
        fn defaults_are_valid() {
            let s = ReorderSettings::default();
            assert!(s.validate().is_ok());
            assert_eq!(s.cooldown_days, 30);
            assert_eq!(s.default_lead_time_days, 14);
        }

        #[test]
        fn rejects_out_of_range_orders_per_year() {
            let s = ReorderSettings {
                orders_per_year: 13,
                ..ReorderSettings::default()
            };
            assert!(s.validate().is_err());
        }
    }
}
