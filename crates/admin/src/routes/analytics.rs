//! Sales analytics page and its JSON twin.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use solenne_core::{CurrencyCode, Money};

use super::AdminPage;
use crate::analytics::{
    DailyPoint, DateRange, RangePreset, Report, Summary, TOP_PRODUCTS_LIMIT, bar_heights,
    zero_filled_series,
};
use crate::db::{AnalyticsRepository, CustomerRepository, SettingsRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<String>,
}

/// One day of the revenue chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBar {
    pub label: String,
    pub height: u8,
    pub revenue: String,
    pub orders: i64,
}

fn chart_bars(series: &[DailyPoint], currency: CurrencyCode) -> Vec<ChartBar> {
    series
        .iter()
        .zip(bar_heights(series))
        .map(|(point, height)| ChartBar {
            label: point.date.format("%b %-d").to_string(),
            height,
            revenue: Money::new(point.revenue, currency).display(),
            orders: point.orders,
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "analytics/index.html")]
pub struct AnalyticsTemplate {
    pub page: AdminPage,
    pub report: Report,
    pub bars: Vec<ChartBar>,
    pub presets: [RangePreset; 4],
    pub currency: CurrencyCode,
}

impl AnalyticsTemplate {
    fn money(&self, amount: Decimal) -> String {
        Money::new(amount, self.currency).display()
    }
}

/// Collect the report for the range ending today.
async fn build_report(state: &AppState, preset: RangePreset) -> Result<Report> {
    let pool = state.pool();
    let analytics = AnalyticsRepository::new(pool);
    let range = DateRange::ending_today(Utc::now(), preset.days());

    let current = analytics.totals(&range).await?;
    let previous = analytics.totals(&range.previous()).await?;
    let daily = analytics.daily_revenue(&range).await?;

    Ok(Report {
        range: preset,
        start: range.start.date_naive(),
        end: (range.end - Duration::days(1)).date_naive(),
        summary: Summary::compare(&current, &previous),
        daily: zero_filled_series(&range, &daily),
        by_status: analytics.orders_by_status(&range).await?,
        top_products: analytics.top_products(&range, TOP_PRODUCTS_LIMIT).await?,
        active_members: CustomerRepository::new(pool).active_member_count().await?,
    })
}

/// Analytics page.
#[instrument(skip(page, state))]
pub async fn analytics_page(
    page: AdminPage,
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<AnalyticsTemplate> {
    let preset = RangePreset::from_query(query.range.as_deref());
    let report = build_report(&state, preset).await?;
    let currency = SettingsRepository::new(state.pool()).store().await?.currency;

    Ok(AnalyticsTemplate {
        page,
        bars: chart_bars(&report.daily, currency),
        report,
        presets: RangePreset::ALL,
        currency,
    })
}

/// The same report as JSON.
#[instrument(skip_all)]
pub async fn analytics_json(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Report>> {
    let preset = RangePreset::from_query(query.range.as_deref());
    Ok(Json(build_report(&state, preset).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_chart_bars() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let series = vec![
            DailyPoint {
                date: day(1),
                revenue: Decimal::from(50),
                orders: 1,
            },
            DailyPoint {
                date: day(2),
                revenue: Decimal::from(200),
                orders: 3,
            },
        ];
        let bars = chart_bars(&series, CurrencyCode::BRL);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].label, "Mar 1");
        assert_eq!(bars[0].height, 25);
        assert_eq!(bars[1].height, 100);
        assert_eq!(bars[1].orders, 3);
    }
}
