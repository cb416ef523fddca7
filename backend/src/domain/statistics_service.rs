use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

use crate::storage::{DbConnection, StatisticsRepository};
use shared::{
    BelieverType, CalculateStatisticsRequest, CalculateStatisticsResponse,
    MonthlyAgeStatisticsRow, MonthlyAgeStatisticsResponse, YearlyStatisticsRow,
    YearlyStatisticsResponse,
};

/// Service that recomputes the statistics snapshot tables on demand.
/// Snapshots are derived data; recalculating is always safe.
#[derive(Clone)]
pub struct StatisticsService {
    repository: StatisticsRepository,
}

/// Bucket a registrant into an age group for the statistics breakdown.
/// Age is counted at the registration year from the birth year alone.
fn age_group(birth_date: Option<&str>, year: i32) -> String {
    let birth_year = match birth_date.and_then(|d| d.get(0..4)).and_then(|y| y.parse::<i32>().ok()) {
        Some(y) => y,
        None => return "unknown".to_string(),
    };

    let age = year - birth_year;
    match age {
        a if a < 0 => "unknown".to_string(),
        a if a < 20 => "under_20".to_string(),
        a if a < 30 => "20s".to_string(),
        a if a < 40 => "30s".to_string(),
        a if a < 50 => "40s".to_string(),
        a if a < 60 => "50s".to_string(),
        a if a < 70 => "60s".to_string(),
        _ => "70_plus".to_string(),
    }
}

impl StatisticsService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            repository: StatisticsRepository::new(db),
        }
    }

    /// Recompute both snapshot tables for a year from the registrant and
    /// graduate tables.
    pub async fn calculate(
        &self,
        request: CalculateStatisticsRequest,
    ) -> Result<CalculateStatisticsResponse> {
        let year = request.year;
        info!("Calculating statistics for year {}", year);

        let calculated_at = Utc::now().to_rfc3339();

        // (month, believer type) -> registered / completed / graduated
        let mut merged: BTreeMap<(u32, &'static str), (BelieverType, i64, i64, i64)> =
            BTreeMap::new();

        for (month, believer_type, registered, completed) in
            self.repository.monthly_registration_counts(year).await?
        {
            merged.insert(
                (month, believer_type.as_str()),
                (believer_type, registered, completed, 0),
            );
        }
        for (month, believer_type, graduated) in
            self.repository.monthly_graduated_counts(year).await?
        {
            merged
                .entry((month, believer_type.as_str()))
                .and_modify(|entry| entry.3 = graduated)
                .or_insert((believer_type, 0, 0, graduated));
        }

        let yearly: Vec<YearlyStatisticsRow> = merged
            .into_iter()
            .map(|((month, _), (believer_type, registered, completed, graduated))| {
                YearlyStatisticsRow {
                    year,
                    month,
                    believer_type,
                    registered_count: registered,
                    completed_count: completed,
                    graduated_count: graduated,
                    calculated_at: calculated_at.clone(),
                }
            })
            .collect();

        let mut age_counts: BTreeMap<(u32, String, &'static str), (BelieverType, i64)> =
            BTreeMap::new();
        for (month, believer_type, birth_date) in
            self.repository.registrant_birth_rows(year).await?
        {
            let group = age_group(birth_date.as_deref(), year);
            age_counts
                .entry((month, group, believer_type.as_str()))
                .and_modify(|entry| entry.1 += 1)
                .or_insert((believer_type, 1));
        }

        let monthly_age: Vec<MonthlyAgeStatisticsRow> = age_counts
            .into_iter()
            .map(|((month, group, _), (believer_type, count))| MonthlyAgeStatisticsRow {
                year,
                month,
                age_group: group,
                believer_type,
                count,
                calculated_at: calculated_at.clone(),
            })
            .collect();

        self.repository.replace_for_year(year, &yearly, &monthly_age).await?;

        info!(
            "Statistics for {} rebuilt: {} yearly rows, {} age rows",
            year,
            yearly.len(),
            monthly_age.len()
        );

        Ok(CalculateStatisticsResponse {
            yearly_rows: yearly.len(),
            monthly_age_rows: monthly_age.len(),
            success_message: format!("Statistics recalculated for {}", year),
        })
    }

    /// Stored yearly snapshot rows
    pub async fn yearly(&self, year: i32) -> Result<YearlyStatisticsResponse> {
        let rows = self.repository.yearly(year).await?;
        Ok(YearlyStatisticsResponse { rows })
    }

    /// Stored monthly age-breakdown rows
    pub async fn monthly_age(&self, year: i32) -> Result<MonthlyAgeStatisticsResponse> {
        let rows = self.repository.monthly_age(year).await?;
        Ok(MonthlyAgeStatisticsResponse { rows })
    }
}
