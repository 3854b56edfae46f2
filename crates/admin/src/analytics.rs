//! Sales analytics arithmetic.
//!
//! Date ranges, period-over-period comparison and series shaping. The
//! numbers come from [`crate::db::AnalyticsRepository`]; everything here is
//! pure so it can be tested without a database. Days are UTC days.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Number of products in the top sellers table.
pub const TOP_PRODUCTS_LIMIT: i64 = 10;

/// Preset report ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RangePreset {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl RangePreset {
    pub const ALL: [Self; 4] = [Self::Week, Self::Month, Self::Quarter, Self::Year];

    /// Parse a `range` query value; anything unknown falls back to 30 days.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("7d") => Self::Week,
            Some("90d") => Self::Quarter,
            Some("365d") => Self::Year,
            _ => Self::Month,
        }
    }

    #[must_use]
    pub const fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::Year => "365d",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Week => "Last 7 days",
            Self::Month => "Last 30 days",
            Self::Quarter => "Last 90 days",
            Self::Year => "Last 365 days",
        }
    }
}

/// Half-open interval `[start, end)` of whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// The last `days` days up to and including today.
    #[must_use]
    pub fn ending_today(now: DateTime<Utc>, days: i64) -> Self {
        let tomorrow = now.date_naive() + Duration::days(1);
        let end = tomorrow.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            start: end - Duration::days(days.max(1)),
            end,
        }
    }

    /// Today only.
    #[must_use]
    pub fn today(now: DateTime<Utc>) -> Self {
        Self::ending_today(now, 1)
    }

    /// The range of equal length immediately before this one.
    #[must_use]
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        Self {
            start: self.start - length,
            end: self.start,
        }
    }

    /// Every day in the range, in order.
    #[must_use]
    pub fn days(&self) -> Vec<NaiveDate> {
        let first = self.start.date_naive();
        let last = self.end.date_naive();
        first.iter_days().take_while(|d| *d < last).collect()
    }
}

/// Totals for one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PeriodTotals {
    /// Sum of paid-state order totals.
    pub revenue: Decimal,
    pub paid_orders: i64,
    pub new_customers: i64,
}

impl PeriodTotals {
    /// Average order value; zero with no orders.
    #[must_use]
    pub fn average_order_value(&self) -> Decimal {
        if self.paid_orders == 0 {
            Decimal::ZERO
        } else {
            (self.revenue / Decimal::from(self.paid_orders)).round_dp(2)
        }
    }
}

/// Percentage change from `previous` to `current`, one decimal place.
///
/// `None` when there is nothing to compare against.
#[must_use]
pub fn percent_change(current: Decimal, previous: Decimal) -> Option<f64> {
    if previous.is_zero() {
        return None;
    }
    let change = ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(1);
    change.to_f64()
}

/// A metric with its comparison to the previous period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub current: Decimal,
    pub previous: Decimal,
    pub change_pct: Option<f64>,
}

impl Comparison {
    #[must_use]
    pub fn new(current: Decimal, previous: Decimal) -> Self {
        Self {
            current,
            previous,
            change_pct: percent_change(current, previous),
        }
    }

    #[must_use]
    pub fn counts(current: i64, previous: i64) -> Self {
        Self::new(Decimal::from(current), Decimal::from(previous))
    }

    /// Signed change for display, e.g. `+12.5%`; empty without a baseline.
    #[must_use]
    pub fn change_label(&self) -> String {
        self.change_pct
            .map_or_else(String::new, |pct| format!("{pct:+.1}%"))
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.change_pct.is_some_and(|pct| pct > 0.0)
    }

    #[must_use]
    pub fn is_down(&self) -> bool {
        self.change_pct.is_some_and(|pct| pct < 0.0)
    }
}

/// Range summary against the previous equal-length range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub revenue: Comparison,
    pub paid_orders: Comparison,
    pub average_order_value: Comparison,
    pub new_customers: Comparison,
}

impl Summary {
    #[must_use]
    pub fn compare(current: &PeriodTotals, previous: &PeriodTotals) -> Self {
        Self {
            revenue: Comparison::new(current.revenue, previous.revenue),
            paid_orders: Comparison::counts(current.paid_orders, previous.paid_orders),
            average_order_value: Comparison::new(
                current.average_order_value(),
                previous.average_order_value(),
            ),
            new_customers: Comparison::counts(current.new_customers, previous.new_customers),
        }
    }
}

/// One day of the revenue series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

/// Fill days without sales with zeros so the series covers the whole range.
#[must_use]
pub fn zero_filled_series(range: &DateRange, rows: &[DailyPoint]) -> Vec<DailyPoint> {
    let by_day: HashMap<NaiveDate, &DailyPoint> = rows.iter().map(|r| (r.date, r)).collect();
    range
        .days()
        .into_iter()
        .map(|date| {
            by_day.get(&date).map_or_else(
                || DailyPoint {
                    date,
                    revenue: Decimal::ZERO,
                    orders: 0,
                },
                |p| (*p).clone(),
            )
        })
        .collect()
}

/// Bar heights in percent of the best day, for the server-rendered chart.
#[must_use]
pub fn bar_heights(series: &[DailyPoint]) -> Vec<u8> {
    let max = series
        .iter()
        .map(|p| p.revenue)
        .max()
        .unwrap_or(Decimal::ZERO);
    series
        .iter()
        .map(|p| {
            if max.is_zero() {
                0
            } else {
                (p.revenue / max * Decimal::ONE_HUNDRED)
                    .round()
                    .to_u8()
                    .unwrap_or(100)
            }
        })
        .collect()
}

/// A best-selling product in the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: solenne_core::ProductId,
    pub name: String,
    pub units: i64,
    pub revenue: Decimal,
}

/// Orders created in the range, by status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: solenne_core::OrderStatus,
    pub count: i64,
}

/// Everything the analytics page and JSON endpoint show.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub range: RangePreset,
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
    pub summary: Summary,
    pub daily: Vec<DailyPoint>,
    pub by_status: Vec<StatusCount>,
    pub top_products: Vec<TopProduct>,
    pub active_members: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 14, 30, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[test]
    fn test_range_preset_parsing() {
        assert_eq!(RangePreset::from_query(Some("7d")), RangePreset::Week);
        assert_eq!(RangePreset::from_query(Some("365d")), RangePreset::Year);
        assert_eq!(RangePreset::from_query(Some("ytd")), RangePreset::Month);
        assert_eq!(RangePreset::from_query(None), RangePreset::Month);
        assert_eq!(RangePreset::Quarter.days(), 90);
    }

    #[test]
    fn test_range_covers_whole_days_including_today() {
        let range = DateRange::ending_today(now(), 7);
        assert_eq!(range.end, Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap());
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap());

        let days = range.days();
        assert_eq!(days.len(), 7);
        assert_eq!(days.first(), Some(&date(9)));
        assert_eq!(days.last(), Some(&date(15)));
    }

    #[test]
    fn test_previous_range_is_adjacent_and_equal_length() {
        let range = DateRange::ending_today(now(), 7);
        let previous = range.previous();
        assert_eq!(previous.end, range.start);
        assert_eq!(previous.end - previous.start, range.end - range.start);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(Decimal::from(150), Decimal::from(100)), Some(50.0));
        assert_eq!(percent_change(Decimal::from(75), Decimal::from(100)), Some(-25.0));
        assert_eq!(percent_change(Decimal::from(10), Decimal::ZERO), None);
        assert_eq!(percent_change(Decimal::from(1), Decimal::from(3)), Some(-66.7));
    }

    #[test]
    fn test_comparison_labels() {
        let up = Comparison::counts(12, 10);
        assert_eq!(up.change_label(), "+20.0%");
        assert!(up.is_up());

        let fresh = Comparison::counts(5, 0);
        assert_eq!(fresh.change_label(), "");
        assert!(!fresh.is_up() && !fresh.is_down());
    }

    #[test]
    fn test_average_order_value() {
        let totals = PeriodTotals {
            revenue: Decimal::new(10000, 2),
            paid_orders: 3,
            new_customers: 0,
        };
        assert_eq!(totals.average_order_value(), Decimal::new(3333, 2));
        assert_eq!(PeriodTotals::default().average_order_value(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_filled_series() {
        let range = DateRange::ending_today(now(), 3);
        let rows = vec![DailyPoint {
            date: date(14),
            revenue: Decimal::from(80),
            orders: 2,
        }];
        let series = zero_filled_series(&range, &rows);
        let dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date(13), date(14), date(15)]);
        assert_eq!(series[0].orders, 0);
        assert_eq!(series[1].revenue, Decimal::from(80));
        assert_eq!(series[2].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_bar_heights() {
        let point = |revenue: i64| DailyPoint {
            date: date(1),
            revenue: Decimal::from(revenue),
            orders: 1,
        };
        assert_eq!(bar_heights(&[point(50), point(100), point(0)]), vec![50, 100, 0]);
        assert_eq!(bar_heights(&[point(0)]), vec![0]);
    }
}
