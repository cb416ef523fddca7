use anyhow::Result;
use tracing::{info, warn};

use crate::storage::{DbConnection, GraduateRepository, NewComerRepository};
use shared::{
    BelieverType, CheckDuplicateResponse, Graduate, GraduateListResponse, GraduateResponse,
};

/// Service for the graduate promotion workflow and the graduates table.
#[derive(Clone)]
pub struct GraduateService {
    graduate_repository: GraduateRepository,
    new_comer_repository: NewComerRepository,
}

impl GraduateService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            graduate_repository: GraduateRepository::new(db.clone()),
            new_comer_repository: NewComerRepository::new(db),
        }
    }

    /// Promote a registrant into the graduates table. The snapshot is read
    /// server-side; the insert and the source-row flip commit together.
    pub async fn promote(&self, new_comer_id: i64) -> Result<GraduateResponse> {
        info!("Promoting new-comer to graduate: {}", new_comer_id);

        let person = self
            .new_comer_repository
            .get(new_comer_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("New-comer not found: {}", new_comer_id))?;

        let graduate = self.graduate_repository.promote(&person).await?;

        info!(
            "Promoted new-comer {} to graduate {} with number {}",
            new_comer_id, graduate.id, graduate.graduate_number
        );

        Ok(GraduateResponse {
            graduate,
            success_message: "Registrant promoted to graduate".to_string(),
        })
    }

    /// Get a graduate by ID
    pub async fn get(&self, id: i64) -> Result<Option<Graduate>> {
        let graduate = self.graduate_repository.get(id).await?;
        if graduate.is_none() {
            warn!("Graduate not found: {}", id);
        }
        Ok(graduate)
    }

    /// List graduates of one believer type with optional filters
    pub async fn list(
        &self,
        believer_type: BelieverType,
        year: Option<i32>,
        department: Option<String>,
    ) -> Result<GraduateListResponse> {
        let graduates = self
            .graduate_repository
            .list(believer_type, year, department.as_deref())
            .await?;

        info!(
            "Listed {} graduates of type {}",
            graduates.len(),
            believer_type.as_str()
        );

        Ok(GraduateListResponse { graduates })
    }

    /// Record a certificate print for a graduate
    pub async fn print(&self, id: i64) -> Result<GraduateResponse> {
        info!("Recording certificate print for graduate: {}", id);

        let graduate = self
            .graduate_repository
            .increment_print_count(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Graduate not found: {}", id))?;

        Ok(GraduateResponse {
            graduate,
            success_message: "Certificate print recorded".to_string(),
        })
    }

    /// Delete a graduate row, the correction path for a mistaken promotion.
    /// The source registrant is untouched and may be promoted again.
    pub async fn delete(&self, id: i64) -> Result<()> {
        info!("Deleting graduate: {}", id);

        self.graduate_repository
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Graduate not found: {}", id))?;

        self.graduate_repository.delete(id).await?;
        Ok(())
    }

    /// Best-effort duplicate probe by name and birth date, used before
    /// promoting to catch a registrant who already graduated under another
    /// registration.
    pub async fn check_duplicate(
        &self,
        name: &str,
        birth_date: &str,
    ) -> Result<CheckDuplicateResponse> {
        if name.trim().is_empty() {
            return Err(anyhow::anyhow!("Name is required"));
        }
        if birth_date.trim().is_empty() {
            return Err(anyhow::anyhow!("Birth date is required"));
        }

        let matches = self
            .graduate_repository
            .find_by_name_and_birth_date(name.trim(), birth_date.trim())
            .await?;

        Ok(CheckDuplicateResponse {
            is_duplicate: !matches.is_empty(),
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_comer_service::NewComerService;
    use shared::{CreateNewComerRequest, EducationType, GraduateTransferStatus};

    async fn setup_test() -> (NewComerService, GraduateService) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (NewComerService::new(db.clone()), GraduateService::new(db))
    }

    fn create_request(name: &str, birth_date: Option<&str>) -> CreateNewComerRequest {
        CreateNewComerRequest {
            department: "새가족위원회".to_string(),
            year: 2025,
            name: name.to_string(),
            gender: None,
            marital_status: None,
            birth_date: birth_date.map(|d| d.to_string()),
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
        }
    }

    #[tokio::test]
    async fn test_promote_flips_source_and_numbers_independently() {
        let (people, graduates) = setup_test().await;

        let created = people
            .create(BelieverType::NewBeliever, create_request("김철수", None))
            .await
            .unwrap();

        let response = graduates.promote(created.new_comer.id).await.expect("Failed to promote");
        assert_eq!(response.graduate.graduate_number, "25-001");
        assert_eq!(response.graduate.new_comer_id, created.new_comer.id);

        let person = people.get(created.new_comer.id).await.unwrap().unwrap();
        assert_eq!(person.education_type, EducationType::Completed);
        assert_eq!(person.graduate_transfer_status, GraduateTransferStatus::Sent);
    }

    #[tokio::test]
    async fn test_promote_missing_person() {
        let (_, graduates) = setup_test().await;

        let result = graduates.promote(999).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_promote_is_single_shot_until_corrected() {
        let (people, graduates) = setup_test().await;

        let created = people
            .create(BelieverType::NewBeliever, create_request("김철수", None))
            .await
            .unwrap();
        let id = created.new_comer.id;

        let first = graduates.promote(id).await.unwrap();
        assert!(graduates.promote(id).await.is_err());

        // Deleting the mistaken graduate row re-enables promotion
        graduates.delete(first.graduate.id).await.unwrap();
        let second = graduates.promote(id).await.expect("Promotion after correction");
        assert_eq!(second.graduate.graduate_number, "25-001");
    }

    #[tokio::test]
    async fn test_print_increments_count() {
        let (people, graduates) = setup_test().await;

        let created = people
            .create(BelieverType::TransferredBeliever, create_request("이영희", None))
            .await
            .unwrap();
        let promoted = graduates.promote(created.new_comer.id).await.unwrap();

        let printed = graduates.print(promoted.graduate.id).await.unwrap();
        assert_eq!(printed.graduate.print_count, 1);
        let printed = graduates.print(promoted.graduate.id).await.unwrap();
        assert_eq!(printed.graduate.print_count, 2);
    }

    #[tokio::test]
    async fn test_check_duplicate() {
        let (people, graduates) = setup_test().await;

        let created = people
            .create(
                BelieverType::NewBeliever,
                create_request("김철수", Some("1990-04-01")),
            )
            .await
            .unwrap();
        graduates.promote(created.new_comer.id).await.unwrap();

        let response = graduates.check_duplicate("김철수", "1990-04-01").await.unwrap();
        assert!(response.is_duplicate);
        assert_eq!(response.matches.len(), 1);

        let response = graduates.check_duplicate("김철수", "1990-04-02").await.unwrap();
        assert!(!response.is_duplicate);

        assert!(graduates.check_duplicate("", "1990-04-01").await.is_err());
        assert!(graduates.check_duplicate("김철수", " ").await.is_err());
    }
}
