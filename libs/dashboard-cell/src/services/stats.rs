use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::Method;
use tracing::debug;

use recovery_cell::{LoadingFlag, LoadingRegistry};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{risk_weight, DashboardStats, RiskSummaryRow};

const STATS_WINDOW_DAYS: i64 = 7;

/// Weekly aggregate tiles on the dashboard landing view.
pub struct DashboardStatsService {
    supabase: SupabaseClient,
    flag: LoadingFlag,
}

impl DashboardStatsService {
    pub fn new(config: &AppConfig, registry: &LoadingRegistry) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            flag: registry.register("stats"),
        }
    }

    pub async fn weekly_stats(&self, auth_token: &str) -> Result<DashboardStats> {
        debug!("Computing weekly dashboard stats");
        self.flag.set();
        let result = self.weekly_stats_inner(auth_token).await;
        self.flag.clear();
        result
    }

    async fn weekly_stats_inner(&self, auth_token: &str) -> Result<DashboardStats> {
        let since = (Utc::now() - Duration::days(STATS_WINDOW_DAYS)).to_rfc3339();

        let calls_last_7_days = self
            .supabase
            .count(
                &format!("/rest/v1/calls?select=id&call_time=gte.{}", since),
                Some(auth_token),
            )
            .await?;

        let reports: Vec<RiskSummaryRow> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/symptom_reports?select=risk_level,escalate&created_at=gte.{}",
                    since
                ),
                Some(auth_token),
                None,
            )
            .await?;

        let escalated_last_7_days = reports.iter().filter(|report| report.escalate).count() as u64;

        let weights: Vec<u32> = reports
            .iter()
            .filter_map(|report| report.risk_level.as_deref())
            .map(risk_weight)
            .filter(|weight| *weight > 0)
            .collect();

        let average_risk = if weights.is_empty() {
            None
        } else {
            Some(f64::from(weights.iter().sum::<u32>()) / weights.len() as f64)
        };

        Ok(DashboardStats {
            calls_last_7_days,
            escalated_last_7_days,
            average_risk,
        })
    }
}
