//! Report export glue: turns registrant and graduate rows into CSV content
//! for the roster and certificate reports. Rendering (Excel/PDF) happens in
//! the consumer; this service only produces the data.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::storage::{DbConnection, GraduateRepository, NewComerRepository};
use shared::{
    BelieverType, ExportDataResponse, ExportGraduatesRequest, ExportNewComersRequest, Graduate,
    NewComer,
};

#[derive(Clone)]
pub struct ExportService {
    new_comer_repository: NewComerRepository,
    graduate_repository: GraduateRepository,
}

/// Quote a CSV field, doubling embedded quotes
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

impl ExportService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            new_comer_repository: NewComerRepository::new(db.clone()),
            graduate_repository: GraduateRepository::new(db),
        }
    }

    /// Export the registrant roster for a year as CSV
    pub async fn export_new_comers(
        &self,
        request: ExportNewComersRequest,
    ) -> Result<ExportDataResponse> {
        info!(
            "Exporting new-comer roster: year={}, department={:?}, type={:?}",
            request.year, request.department, request.believer_type
        );

        let department = request.department.as_deref();
        let mut rows: Vec<NewComer> = Vec::new();
        match request.believer_type {
            Some(believer_type) => {
                rows.extend(
                    self.new_comer_repository
                        .list(believer_type, Some(request.year), department, None, None)
                        .await?,
                );
            }
            None => {
                rows.extend(
                    self.new_comer_repository
                        .list(
                            BelieverType::NewBeliever,
                            Some(request.year),
                            department,
                            None,
                            None,
                        )
                        .await?,
                );
                rows.extend(
                    self.new_comer_repository
                        .list(
                            BelieverType::TransferredBeliever,
                            Some(request.year),
                            department,
                            None,
                            None,
                        )
                        .await?,
                );
            }
        }

        let mut csv_content = String::new();
        csv_content.push_str(
            "number,name,believer_type,department,year,gender,birth_date,phone,address,teacher,register_date,education_type,education_start_date,education_end_date\n",
        );
        for person in &rows {
            let row = format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                csv_field(&person.number),
                csv_field(&person.name),
                person.believer_type.as_str(),
                csv_field(&person.department),
                person.year,
                csv_field(opt(&person.gender)),
                csv_field(opt(&person.birth_date)),
                csv_field(opt(&person.phone)),
                csv_field(opt(&person.address)),
                csv_field(opt(&person.teacher)),
                csv_field(opt(&person.register_date)),
                person.education_type.as_str(),
                csv_field(opt(&person.education_start_date)),
                csv_field(opt(&person.education_end_date)),
            );
            csv_content.push_str(&row);
        }

        let filename = format!(
            "new_comers_{}_{}.csv",
            request.year,
            Utc::now().format("%Y%m%d")
        );

        info!(
            "Exported {} registrant rows ({} bytes) as {}",
            rows.len(),
            csv_content.len(),
            filename
        );

        Ok(ExportDataResponse {
            csv_content,
            filename,
            row_count: rows.len(),
        })
    }

    /// Export graduates for a year as CSV
    pub async fn export_graduates(
        &self,
        request: ExportGraduatesRequest,
    ) -> Result<ExportDataResponse> {
        info!(
            "Exporting graduates: year={}, department={:?}",
            request.year, request.department
        );

        let department = request.department.as_deref();
        let mut rows: Vec<Graduate> = self
            .graduate_repository
            .list(BelieverType::NewBeliever, Some(request.year), department)
            .await?;
        rows.extend(
            self.graduate_repository
                .list(
                    BelieverType::TransferredBeliever,
                    Some(request.year),
                    department,
                )
                .await?,
        );

        let mut csv_content = String::new();
        csv_content.push_str(
            "graduate_number,name,believer_type,department,year,birth_date,education_start_date,education_end_date,print_count\n",
        );
        for graduate in &rows {
            let row = format!(
                "{},{},{},{},{},{},{},{},{}\n",
                csv_field(&graduate.graduate_number),
                csv_field(&graduate.name),
                graduate.believer_type.as_str(),
                csv_field(&graduate.department),
                graduate.year,
                csv_field(opt(&graduate.birth_date)),
                csv_field(opt(&graduate.education_start_date)),
                csv_field(opt(&graduate.education_end_date)),
                graduate.print_count,
            );
            csv_content.push_str(&row);
        }

        let filename = format!(
            "graduates_{}_{}.csv",
            request.year,
            Utc::now().format("%Y%m%d")
        );

        info!(
            "Exported {} graduate rows ({} bytes) as {}",
            rows.len(),
            csv_content.len(),
            filename
        );

        Ok(ExportDataResponse {
            csv_content,
            filename,
            row_count: rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graduate_service::GraduateService;
    use crate::domain::new_comer_service::NewComerService;
    use shared::CreateNewComerRequest;

    #[test]
    fn test_csv_field_escaping() {
        assert_eq!(csv_field("plain"), "\"plain\"");
        assert_eq!(csv_field("with \"quotes\""), "\"with \"\"quotes\"\"\"");
        assert_eq!(csv_field("comma, inside"), "\"comma, inside\"");
    }

    async fn setup_test() -> (NewComerService, GraduateService, ExportService) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (
            NewComerService::new(db.clone()),
            GraduateService::new(db.clone()),
            ExportService::new(db),
        )
    }

    fn create_request(name: &str, department: &str) -> CreateNewComerRequest {
        CreateNewComerRequest {
            department: department.to_string(),
            year: 2025,
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
    async fn test_export_new_comers_contains_both_types() {
        let (people, _, export) = setup_test().await;

        people
            .create(BelieverType::NewBeliever, create_request("김철수", "새가족위원회"))
            .await
            .unwrap();
        people
            .create(
                BelieverType::TransferredBeliever,
                create_request("이영희", "새가족위원회"),
            )
            .await
            .unwrap();

        let response = export
            .export_new_comers(ExportNewComersRequest {
                year: 2025,
                department: None,
                believer_type: None,
            })
            .await
            .unwrap();

        assert_eq!(response.row_count, 2);
        assert!(response.csv_content.starts_with("number,name,"));
        assert!(response.csv_content.contains("김철수"));
        assert!(response.csv_content.contains("이영희"));
        assert!(response.filename.starts_with("new_comers_2025_"));
        assert!(response.filename.ends_with(".csv"));
    }

    #[tokio::test]
    async fn test_export_filters_by_believer_type() {
        let (people, _, export) = setup_test().await;

        people
            .create(BelieverType::NewBeliever, create_request("김철수", "새가족위원회"))
            .await
            .unwrap();
        people
            .create(
                BelieverType::TransferredBeliever,
                create_request("이영희", "새가족위원회"),
            )
            .await
            .unwrap();

        let response = export
            .export_new_comers(ExportNewComersRequest {
                year: 2025,
                department: None,
                believer_type: Some(BelieverType::TransferredBeliever),
            })
            .await
            .unwrap();

        assert_eq!(response.row_count, 1);
        assert!(response.csv_content.contains("이영희"));
        assert!(!response.csv_content.contains("김철수"));
    }

    #[tokio::test]
    async fn test_export_graduates() {
        let (people, graduates, export) = setup_test().await;

        let created = people
            .create(BelieverType::NewBeliever, create_request("김철수", "새가족위원회"))
            .await
            .unwrap();
        graduates.promote(created.new_comer.id).await.unwrap();

        let response = export
            .export_graduates(ExportGraduatesRequest {
                year: 2025,
                department: None,
            })
            .await
            .unwrap();

        assert_eq!(response.row_count, 1);
        assert!(response.csv_content.contains("\"25-001\""));
        assert!(response.filename.starts_with("graduates_2025_"));
    }

    #[tokio::test]
    async fn test_export_empty_year_has_header_only() {
        let (_, _, export) = setup_test().await;

        let response = export
            .export_new_comers(ExportNewComersRequest {
                year: 2024,
                department: None,
                believer_type: None,
            })
            .await
            .unwrap();

        assert_eq!(response.row_count, 0);
        assert_eq!(response.csv_content.lines().count(), 1);
    }
}
