use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::storage::{DbConnection, NewComerRepository};
use shared::{
    education_end_date, format_display_number, parse_display_number, BelieverType,
    CreateNewComerRequest, EducationType, GenerateNumberRequest, GenerateNumberResponse,
    GraduateTransferStatus, NewComer, NewComerListResponse, NewComerResponse, NumberAuditIssue,
    NumberAuditResponse, ReorderNumbersRequest, ReorderNumbersResponse, UpdateNewComerRequest,
};

/// Service for registering and managing new-comers of both believer types.
///
/// Owns the display-number rules: numbers are allocated when a registrant is
/// inserted, sequences are renumbered when a row leaves them, and a
/// believer-type change moves the row into the target type's sequence.
#[derive(Clone)]
pub struct NewComerService {
    repository: NewComerRepository,
}

impl NewComerService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            repository: NewComerRepository::new(db),
        }
    }

    /// Register a new-comer. The believer type comes from the route.
    pub async fn create(
        &self,
        believer_type: BelieverType,
        request: CreateNewComerRequest,
    ) -> Result<NewComerResponse> {
        info!(
            "Creating new-comer: name={}, department={}, type={}",
            request.name,
            request.department,
            believer_type.as_str()
        );

        self.validate_create_request(&request)?;

        let now = Utc::now().to_rfc3339();
        let education_start_date = request.education_start_date.clone();
        let end = match (&request.education_end_date, &education_start_date) {
            (Some(end), _) => Some(end.clone()),
            (None, Some(start)) => education_end_date(start, believer_type),
            (None, None) => None,
        };

        let person = NewComer {
            id: 0,
            department: request.department.trim().to_string(),
            believer_type,
            year: request.year,
            number: String::new(),
            name: request.name.trim().to_string(),
            gender: request.gender,
            marital_status: request.marital_status,
            birth_date: request.birth_date,
            address: request.address,
            phone: request.phone,
            teacher: request.teacher,
            register_date: request.register_date,
            affiliation: request.affiliation,
            belong: request.belong,
            identity_verified: request.identity_verified.unwrap_or(false),
            previous_church: request.previous_church,
            comment: request.comment,
            education_type: EducationType::InProgress,
            education_start_date,
            education_end_date: end,
            graduate_transfer_status: GraduateTransferStatus::Pending,
            file_id: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let stored = self.repository.create(&person).await?;

        info!("Created new-comer {} with number {}", stored.id, stored.number);

        Ok(NewComerResponse {
            new_comer: stored,
            success_message: "New-comer registered successfully".to_string(),
        })
    }

    /// Get a registrant by ID
    pub async fn get(&self, id: i64) -> Result<Option<NewComer>> {
        let person = self.repository.get(id).await?;
        if person.is_none() {
            warn!("New-comer not found: {}", id);
        }
        Ok(person)
    }

    /// List registrants of one believer type with optional filters
    pub async fn list(
        &self,
        believer_type: BelieverType,
        year: Option<i32>,
        department: Option<String>,
        education_type: Option<EducationType>,
        name: Option<String>,
    ) -> Result<NewComerListResponse> {
        let new_comers = self
            .repository
            .list(
                believer_type,
                year,
                department.as_deref(),
                education_type,
                name.as_deref(),
            )
            .await?;

        info!(
            "Listed {} registrants of type {}",
            new_comers.len(),
            believer_type.as_str()
        );

        Ok(NewComerListResponse { new_comers })
    }

    /// Update a registrant. When the believer type changes, the row receives
    /// a fresh number in the target sequence and the source sequence is
    /// renumbered, atomically with the update.
    pub async fn update(&self, id: i64, request: UpdateNewComerRequest) -> Result<NewComerResponse> {
        info!("Updating new-comer: {}", id);

        let existing = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("New-comer not found: {}", id))?;

        self.validate_update_request(&request)?;

        let transitioned = request
            .believer_type
            .map_or(false, |t| t != existing.believer_type);
        let derive_end = request.education_end_date.is_none()
            && (request.education_start_date.is_some() || transitioned);

        let mut updated = existing.clone();
        if let Some(department) = request.department {
            updated.department = department.trim().to_string();
        }
        if let Some(believer_type) = request.believer_type {
            updated.believer_type = believer_type;
        }
        if let Some(name) = request.name {
            updated.name = name.trim().to_string();
        }
        if let Some(gender) = request.gender {
            updated.gender = Some(gender);
        }
        if let Some(marital_status) = request.marital_status {
            updated.marital_status = Some(marital_status);
        }
        if let Some(birth_date) = request.birth_date {
            updated.birth_date = Some(birth_date);
        }
        if let Some(address) = request.address {
            updated.address = Some(address);
        }
        if let Some(phone) = request.phone {
            updated.phone = Some(phone);
        }
        if let Some(teacher) = request.teacher {
            updated.teacher = Some(teacher);
        }
        if let Some(register_date) = request.register_date {
            updated.register_date = Some(register_date);
        }
        if let Some(affiliation) = request.affiliation {
            updated.affiliation = Some(affiliation);
        }
        if let Some(belong) = request.belong {
            updated.belong = Some(belong);
        }
        if let Some(identity_verified) = request.identity_verified {
            updated.identity_verified = identity_verified;
        }
        if let Some(previous_church) = request.previous_church {
            updated.previous_church = Some(previous_church);
        }
        if let Some(comment) = request.comment {
            updated.comment = Some(comment);
        }
        if let Some(education_type) = request.education_type {
            updated.education_type = education_type;
        }
        if let Some(education_start_date) = request.education_start_date {
            updated.education_start_date = Some(education_start_date);
        }
        if let Some(education_end_date) = request.education_end_date {
            updated.education_end_date = Some(education_end_date);
        }
        if derive_end {
            if let Some(start) = &updated.education_start_date {
                updated.education_end_date = education_end_date(start, updated.believer_type);
            }
        }
        updated.updated_at = Utc::now().to_rfc3339();

        if transitioned {
            let (number, reordered) = self
                .repository
                .update_with_transition(&existing, &updated)
                .await?;
            updated.number = number;

            info!(
                "New-comer {} moved from {} to {}: new number {}, {} rows renumbered in the old sequence",
                id,
                existing.believer_type.as_str(),
                updated.believer_type.as_str(),
                updated.number,
                reordered
            );

            Ok(NewComerResponse {
                new_comer: updated,
                success_message: "Believer type changed and numbers reassigned".to_string(),
            })
        } else {
            self.repository.update(&updated).await?;

            info!("Updated new-comer: {}", id);

            Ok(NewComerResponse {
                new_comer: updated,
                success_message: "New-comer updated successfully".to_string(),
            })
        }
    }

    /// Delete a registrant and renumber the sequence it belonged to.
    /// Registrants that completed their education are immutable to deletion.
    pub async fn delete(&self, id: i64) -> Result<()> {
        info!("Deleting new-comer: {}", id);

        let person = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("New-comer not found: {}", id))?;

        if person.education_type == EducationType::Completed {
            return Err(anyhow::anyhow!(
                "Completed registrants cannot be deleted: {}",
                id
            ));
        }

        let reordered = self.repository.delete_and_reorder(&person).await?;

        info!("Deleted new-comer {}, renumbered {} rows", id, reordered);

        Ok(())
    }

    /// Preview the next display number for (department, believer type, year)
    /// without reserving it.
    pub async fn generate_number(
        &self,
        believer_type: BelieverType,
        request: GenerateNumberRequest,
    ) -> Result<GenerateNumberResponse> {
        if request.department.trim().is_empty() {
            return Err(anyhow::anyhow!("Department is required"));
        }
        self.validate_year(request.year)?;

        let number = self
            .repository
            .next_number_preview(request.department.trim(), believer_type, request.year)
            .await?;

        Ok(GenerateNumberResponse { number })
    }

    /// Run a manual renumbering pass over one sequence
    pub async fn reorder_numbers(
        &self,
        believer_type: BelieverType,
        request: ReorderNumbersRequest,
    ) -> Result<ReorderNumbersResponse> {
        if request.department.trim().is_empty() {
            return Err(anyhow::anyhow!("Department is required"));
        }
        self.validate_year(request.year)?;

        let updated_count = self
            .repository
            .reorder_numbers(request.year, request.department.trim(), believer_type)
            .await?;

        info!(
            "Reordered {} rows for ({}, {}, {})",
            updated_count,
            request.department,
            believer_type.as_str(),
            request.year
        );

        Ok(ReorderNumbersResponse {
            updated_count,
            success_message: format!("{} numbers reassigned", updated_count),
        })
    }

    /// Scan every sequence of a year and report rows whose stored number
    /// disagrees with their position, the integrity check behind the manual
    /// duplicate-detection workflow.
    pub async fn audit_numbers(&self, year: i32) -> Result<NumberAuditResponse> {
        let rows = self.repository.list_for_year(year).await?;

        let mut issues = Vec::new();
        let mut current_key: Option<(String, BelieverType)> = None;
        let mut position = 0u32;

        for person in &rows {
            let key = (person.department.clone(), person.believer_type);
            if current_key.as_ref() != Some(&key) {
                current_key = Some(key);
                position = 0;
            }
            position += 1;

            let expected = (year.rem_euclid(100) as u32, position);
            let matches = parse_display_number(&person.number)
                .map(|parsed| parsed == expected)
                .unwrap_or(false);
            if !matches {
                issues.push(NumberAuditIssue {
                    new_comer_id: person.id,
                    department: person.department.clone(),
                    believer_type: person.believer_type,
                    year: person.year,
                    number: person.number.clone(),
                    expected_number: format_display_number(year, position),
                });
            }
        }

        if !issues.is_empty() {
            warn!("Number audit for {} found {} issues", year, issues.len());
        }

        Ok(NumberAuditResponse { issues })
    }

    fn validate_create_request(&self, request: &CreateNewComerRequest) -> Result<()> {
        if request.department.trim().is_empty() {
            return Err(anyhow::anyhow!("Department is required"));
        }
        if request.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Name is required"));
        }
        if request.name.len() > 100 {
            return Err(anyhow::anyhow!("Name cannot exceed 100 characters"));
        }
        self.validate_year(request.year)?;
        self.validate_date_field("birth_date", request.birth_date.as_deref())?;
        self.validate_date_field("register_date", request.register_date.as_deref())?;
        self.validate_date_field("education_start_date", request.education_start_date.as_deref())?;
        self.validate_date_field("education_end_date", request.education_end_date.as_deref())?;
        Ok(())
    }

    fn validate_update_request(&self, request: &UpdateNewComerRequest) -> Result<()> {
        if let Some(ref department) = request.department {
            if department.trim().is_empty() {
                return Err(anyhow::anyhow!("Department cannot be empty"));
            }
        }
        if let Some(ref name) = request.name {
            if name.trim().is_empty() {
                return Err(anyhow::anyhow!("Name cannot be empty"));
            }
            if name.len() > 100 {
                return Err(anyhow::anyhow!("Name cannot exceed 100 characters"));
            }
        }
        self.validate_date_field("birth_date", request.birth_date.as_deref())?;
        self.validate_date_field("register_date", request.register_date.as_deref())?;
        self.validate_date_field("education_start_date", request.education_start_date.as_deref())?;
        self.validate_date_field("education_end_date", request.education_end_date.as_deref())?;
        Ok(())
    }

    fn validate_year(&self, year: i32) -> Result<()> {
        if !(2000..=2100).contains(&year) {
            return Err(anyhow::anyhow!("Year must be between 2000 and 2100"));
        }
        Ok(())
    }

    fn validate_date_field(&self, field: &str, value: Option<&str>) -> Result<()> {
        if let Some(value) = value {
            if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                return Err(anyhow::anyhow!("{} must be in YYYY-MM-DD format", field));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DbConnection;

    async fn setup_test() -> NewComerService {
        let (service, _) = setup_test_with_db().await;
        service
    }

    async fn setup_test_with_db() -> (NewComerService, DbConnection) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (NewComerService::new(db.clone()), db)
    }

    fn create_request(department: &str, year: i32, name: &str) -> CreateNewComerRequest {
        CreateNewComerRequest {
            department: department.to_string(),
            year,
            name: name.to_string(),
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
        }
    }

    #[tokio::test]
    async fn test_create_assigns_number_and_defaults() {
        let service = setup_test().await;

        let response = service
            .create(
                BelieverType::NewBeliever,
                create_request("새가족위원회", 2025, "김철수"),
            )
            .await
            .expect("Failed to create");

        let person = response.new_comer;
        assert_eq!(person.number, "25-001");
        assert_eq!(person.education_type, EducationType::InProgress);
        assert_eq!(person.graduate_transfer_status, GraduateTransferStatus::Pending);
        assert!(person.id > 0);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_test().await;

        // Missing department
        let request = create_request("", 2025, "김철수");
        assert!(service.create(BelieverType::NewBeliever, request).await.is_err());

        // Missing name
        let request = create_request("새가족위원회", 2025, "  ");
        assert!(service.create(BelieverType::NewBeliever, request).await.is_err());

        // Implausible year
        let request = create_request("새가족위원회", 1999, "김철수");
        assert!(service.create(BelieverType::NewBeliever, request).await.is_err());

        // Malformed birth date
        let mut request = create_request("새가족위원회", 2025, "김철수");
        request.birth_date = Some("1990/04/01".to_string());
        assert!(service.create(BelieverType::NewBeliever, request).await.is_err());
    }

    #[tokio::test]
    async fn test_create_derives_education_end_date() {
        let service = setup_test().await;

        // 2025-01-05 is a Sunday
        let mut request = create_request("새가족위원회", 2025, "김철수");
        request.education_start_date = Some("2025-01-05".to_string());
        let response = service
            .create(BelieverType::NewBeliever, request)
            .await
            .unwrap();
        assert_eq!(
            response.new_comer.education_end_date.as_deref(),
            Some("2025-03-02")
        );

        // Transferred believers finish after four weeks
        let mut request = create_request("새가족위원회", 2025, "이영희");
        request.education_start_date = Some("2025-01-05".to_string());
        let response = service
            .create(BelieverType::TransferredBeliever, request)
            .await
            .unwrap();
        assert_eq!(
            response.new_comer.education_end_date.as_deref(),
            Some("2025-02-02")
        );
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let service = setup_test().await;

        let result = service.update(999, UpdateNewComerRequest::default()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_refused_for_completed() {
        let service = setup_test().await;

        let created = service
            .create(
                BelieverType::NewBeliever,
                create_request("새가족위원회", 2025, "김철수"),
            )
            .await
            .unwrap();

        let request = UpdateNewComerRequest {
            education_type: Some(EducationType::Completed),
            ..Default::default()
        };
        service.update(created.new_comer.id, request).await.unwrap();

        let result = service.delete(created.new_comer.id).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be deleted"));
    }

    #[tokio::test]
    async fn test_registration_delete_transition_scenario() {
        // The full numbering walk-through: register three, delete the
        // second, then move the (renumbered) last row across believer types
        let service = setup_test().await;

        let mut ids = Vec::new();
        for name in ["갑", "을", "병"] {
            let response = service
                .create(
                    BelieverType::NewBeliever,
                    create_request("새가족위원회", 2025, name),
                )
                .await
                .unwrap();
            ids.push(response.new_comer.id);
        }

        let listed = service
            .list(BelieverType::NewBeliever, Some(2025), None, None, None)
            .await
            .unwrap()
            .new_comers;
        let numbers: Vec<&str> = listed.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, vec!["25-001", "25-002", "25-003"]);

        // Delete the second row; the rest close ranks
        service.delete(ids[1]).await.unwrap();
        let listed = service
            .list(BelieverType::NewBeliever, Some(2025), None, None, None)
            .await
            .unwrap()
            .new_comers;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].number, "25-001");
        assert_eq!(listed[1].number, "25-002");
        assert_eq!(listed[1].id, ids[2]);

        // Move the renumbered third registrant to the transferred track
        let request = UpdateNewComerRequest {
            believer_type: Some(BelieverType::TransferredBeliever),
            ..Default::default()
        };
        let response = service.update(ids[2], request).await.unwrap();
        assert_eq!(response.new_comer.number, "25-001");
        assert_eq!(
            response.new_comer.believer_type,
            BelieverType::TransferredBeliever
        );

        // One new believer remains, renumbered from the top
        let listed = service
            .list(BelieverType::NewBeliever, Some(2025), None, None, None)
            .await
            .unwrap()
            .new_comers;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, ids[0]);
        assert_eq!(listed[0].number, "25-001");
    }

    #[tokio::test]
    async fn test_transition_recomputes_education_end_date() {
        let service = setup_test().await;

        let mut request = create_request("새가족위원회", 2025, "김철수");
        request.education_start_date = Some("2025-01-05".to_string());
        let created = service
            .create(BelieverType::NewBeliever, request)
            .await
            .unwrap();
        assert_eq!(
            created.new_comer.education_end_date.as_deref(),
            Some("2025-03-02")
        );

        // Switching to the 4-week track pulls the end date in
        let request = UpdateNewComerRequest {
            believer_type: Some(BelieverType::TransferredBeliever),
            ..Default::default()
        };
        let response = service.update(created.new_comer.id, request).await.unwrap();
        assert_eq!(
            response.new_comer.education_end_date.as_deref(),
            Some("2025-02-02")
        );
    }

    #[tokio::test]
    async fn test_generate_number_preview() {
        let service = setup_test().await;

        service
            .create(
                BelieverType::NewBeliever,
                create_request("새가족위원회", 2025, "김철수"),
            )
            .await
            .unwrap();

        let response = service
            .generate_number(
                BelieverType::NewBeliever,
                GenerateNumberRequest {
                    department: "새가족위원회".to_string(),
                    year: 2025,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.number, "25-002");

        // The other believer type still starts from 001
        let response = service
            .generate_number(
                BelieverType::TransferredBeliever,
                GenerateNumberRequest {
                    department: "새가족위원회".to_string(),
                    year: 2025,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.number, "25-001");
    }

    #[tokio::test]
    async fn test_audit_numbers_reports_drift() {
        let (service, db) = setup_test_with_db().await;

        for name in ["갑", "을"] {
            service
                .create(
                    BelieverType::NewBeliever,
                    create_request("새가족위원회", 2025, name),
                )
                .await
                .unwrap();
        }

        // Intact sequence audits clean
        let audit = service.audit_numbers(2025).await.unwrap();
        assert!(audit.issues.is_empty());

        // Corrupt one number behind the service's back
        sqlx::query("UPDATE new_comers SET number = '25-009' WHERE number = '25-002'")
            .execute(db.pool())
            .await
            .unwrap();

        let audit = service.audit_numbers(2025).await.unwrap();
        assert_eq!(audit.issues.len(), 1);
        assert_eq!(audit.issues[0].number, "25-009");
        assert_eq!(audit.issues[0].expected_number, "25-002");
    }
}
