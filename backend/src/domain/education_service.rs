use anyhow::Result;
use tracing::{info, warn};

use crate::storage::{DbConnection, EducationRepository, NewComerRepository};
use shared::{EducationRecord, EducationResponse, UpsertEducationRequest};

/// Service for weekly education progress.
///
/// The store keeps one row per registrant; callers decide how many weeks to
/// populate (8 or 4 depending on the track, with the final week held back
/// until completion is confirmed), so no week-count validation happens here.
#[derive(Clone)]
pub struct EducationService {
    education_repository: EducationRepository,
    new_comer_repository: NewComerRepository,
}

fn normalize(value: Option<String>) -> Option<String> {
    // Empty strings from the form mean "explicitly blank"; store them as null
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl EducationService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            education_repository: EducationRepository::new(db.clone()),
            new_comer_repository: NewComerRepository::new(db),
        }
    }

    /// Insert or update the education row for a registrant
    pub async fn upsert(&self, request: UpsertEducationRequest) -> Result<EducationResponse> {
        info!("Upserting education progress for new-comer: {}", request.new_comer_id);

        self.new_comer_repository
            .get(request.new_comer_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("New-comer not found: {}", request.new_comer_id))?;

        let normalized = UpsertEducationRequest {
            new_comer_id: request.new_comer_id,
            week1_date: normalize(request.week1_date),
            week1_comment: normalize(request.week1_comment),
            week2_date: normalize(request.week2_date),
            week2_comment: normalize(request.week2_comment),
            week3_date: normalize(request.week3_date),
            week3_comment: normalize(request.week3_comment),
            week4_date: normalize(request.week4_date),
            week4_comment: normalize(request.week4_comment),
            week5_date: normalize(request.week5_date),
            week5_comment: normalize(request.week5_comment),
            week6_date: normalize(request.week6_date),
            week6_comment: normalize(request.week6_comment),
            week7_date: normalize(request.week7_date),
            week7_comment: normalize(request.week7_comment),
            week8_date: normalize(request.week8_date),
            week8_comment: normalize(request.week8_comment),
            overall_comment: normalize(request.overall_comment),
        };

        let education = self.education_repository.upsert(&normalized).await?;

        Ok(EducationResponse {
            education,
            success_message: "Education progress saved".to_string(),
        })
    }

    /// Get the education row for a registrant
    pub async fn get_by_new_comer(&self, new_comer_id: i64) -> Result<Option<EducationRecord>> {
        let education = self.education_repository.get_by_new_comer(new_comer_id).await?;
        if education.is_none() {
            warn!("No education progress for new-comer: {}", new_comer_id);
        }
        Ok(education)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_comer_service::NewComerService;
    use shared::{BelieverType, CreateNewComerRequest};

    async fn setup_test() -> (NewComerService, EducationService) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (NewComerService::new(db.clone()), EducationService::new(db))
    }

    async fn register(people: &NewComerService) -> i64 {
        let request = CreateNewComerRequest {
            department: "새가족위원회".to_string(),
            year: 2025,
            name: "김철수".to_string(),
            gender: None,
            marital_status: None,
            birth_date: None,
            address: None,
            phone: None,
            teacher: None,
            register_date: None,
            affiliation: None,
            belong: None,
            identity_verified: None,
            previous_church: None,
            comment: None,
            education_start_date: None,
            education_end_date: None,
        };
        people
            .create(BelieverType::NewBeliever, request)
            .await
            .unwrap()
            .new_comer
            .id
    }

    #[tokio::test]
    async fn test_upsert_requires_existing_registrant() {
        let (_, education) = setup_test().await;

        let request = UpsertEducationRequest {
            new_comer_id: 999,
            ..Default::default()
        };
        let result = education.upsert(request).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_data() {
        let (people, education) = setup_test().await;
        let id = register(&people).await;

        let request = UpsertEducationRequest {
            new_comer_id: id,
            week1_date: Some("2025-03-02".to_string()),
            week1_comment: Some("Introductions".to_string()),
            ..Default::default()
        };
        let first = education.upsert(request).await.unwrap();

        let request = UpsertEducationRequest {
            new_comer_id: id,
            week1_date: Some("2025-03-02".to_string()),
            week1_comment: Some("Introductions".to_string()),
            week2_date: Some("2025-03-09".to_string()),
            week2_comment: Some("Absent".to_string()),
            ..Default::default()
        };
        let second = education.upsert(request).await.unwrap();

        assert_eq!(second.education.id, first.education.id);
        assert_eq!(second.education.week2_comment.as_deref(), Some("Absent"));
    }

    #[tokio::test]
    async fn test_empty_strings_become_null() {
        let (people, education) = setup_test().await;
        let id = register(&people).await;

        let request = UpsertEducationRequest {
            new_comer_id: id,
            week1_date: Some("2025-03-02".to_string()),
            week1_comment: Some("".to_string()),
            week2_comment: Some("   ".to_string()),
            overall_comment: Some("Doing well".to_string()),
            ..Default::default()
        };
        let response = education.upsert(request).await.unwrap();

        assert_eq!(response.education.week1_date.as_deref(), Some("2025-03-02"));
        assert!(response.education.week1_comment.is_none());
        assert!(response.education.week2_comment.is_none());
        assert_eq!(response.education.overall_comment.as_deref(), Some("Doing well"));
    }

    #[tokio::test]
    async fn test_get_missing_education() {
        let (people, education) = setup_test().await;
        let id = register(&people).await;

        let row = education.get_by_new_comer(id).await.unwrap();
        assert!(row.is_none());
    }
}
