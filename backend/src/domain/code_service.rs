use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::storage::{CodeRepository, DbConnection};
use shared::{
    CodeDetail, CodeDetailListResponse, CodeDetailResponse, CodeGroup, CodeGroupListResponse,
    CodeGroupResponse, CreateCodeDetailRequest, CreateCodeGroupRequest, UpdateCodeDetailRequest,
    UpdateCodeGroupRequest,
};

/// Service for reference code groups and detail codes (departments, genders,
/// marital statuses and the like).
#[derive(Clone)]
pub struct CodeService {
    repository: CodeRepository,
}

impl CodeService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            repository: CodeRepository::new(db),
        }
    }

    pub async fn create_group(&self, request: CreateCodeGroupRequest) -> Result<CodeGroupResponse> {
        info!("Creating code group: {}", request.group_code);

        if request.group_code.trim().is_empty() {
            return Err(anyhow::anyhow!("Group code is required"));
        }
        if request.group_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Group name is required"));
        }

        let code_group = self
            .repository
            .create_group(
                request.group_code.trim(),
                request.group_name.trim(),
                request.description.as_deref(),
            )
            .await?;

        Ok(CodeGroupResponse {
            code_group,
            success_message: "Code group created successfully".to_string(),
        })
    }

    pub async fn get_group(&self, id: i64) -> Result<Option<CodeGroup>> {
        let group = self.repository.get_group(id).await?;
        if group.is_none() {
            warn!("Code group not found: {}", id);
        }
        Ok(group)
    }

    pub async fn list_groups(&self) -> Result<CodeGroupListResponse> {
        let code_groups = self.repository.list_groups().await?;
        Ok(CodeGroupListResponse { code_groups })
    }

    pub async fn update_group(
        &self,
        id: i64,
        request: UpdateCodeGroupRequest,
    ) -> Result<CodeGroupResponse> {
        info!("Updating code group: {}", id);

        let mut group = self
            .repository
            .get_group(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code group not found: {}", id))?;

        if let Some(group_name) = request.group_name {
            if group_name.trim().is_empty() {
                return Err(anyhow::anyhow!("Group name cannot be empty"));
            }
            group.group_name = group_name.trim().to_string();
        }
        if let Some(description) = request.description {
            group.description = Some(description);
        }
        group.updated_at = Utc::now().to_rfc3339();

        self.repository.update_group(&group).await?;

        Ok(CodeGroupResponse {
            code_group: group,
            success_message: "Code group updated successfully".to_string(),
        })
    }

    pub async fn delete_group(&self, id: i64) -> Result<()> {
        info!("Deleting code group: {}", id);

        self.repository
            .get_group(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code group not found: {}", id))?;

        self.repository.delete_group(id).await?;
        Ok(())
    }

    pub async fn create_detail(
        &self,
        group_id: i64,
        request: CreateCodeDetailRequest,
    ) -> Result<CodeDetailResponse> {
        info!("Creating code detail in group {}: {}", group_id, request.code_value);

        if request.code_value.trim().is_empty() {
            return Err(anyhow::anyhow!("Code value is required"));
        }
        if request.code_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Code name is required"));
        }

        self.repository
            .get_group(group_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code group not found: {}", group_id))?;

        let code_detail = self
            .repository
            .create_detail(
                group_id,
                request.code_value.trim(),
                request.code_name.trim(),
                request.sort_order.unwrap_or(0),
                request.is_active.unwrap_or(true),
            )
            .await?;

        Ok(CodeDetailResponse {
            code_detail,
            success_message: "Code detail created successfully".to_string(),
        })
    }

    pub async fn list_details(&self, group_id: i64) -> Result<CodeDetailListResponse> {
        self.repository
            .get_group(group_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code group not found: {}", group_id))?;

        let code_details = self.repository.list_details(group_id).await?;
        Ok(CodeDetailListResponse { code_details })
    }

    pub async fn update_detail(
        &self,
        id: i64,
        request: UpdateCodeDetailRequest,
    ) -> Result<CodeDetailResponse> {
        info!("Updating code detail: {}", id);

        let mut detail: CodeDetail = self
            .repository
            .get_detail(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code detail not found: {}", id))?;

        if let Some(code_name) = request.code_name {
            if code_name.trim().is_empty() {
                return Err(anyhow::anyhow!("Code name cannot be empty"));
            }
            detail.code_name = code_name.trim().to_string();
        }
        if let Some(sort_order) = request.sort_order {
            detail.sort_order = sort_order;
        }
        if let Some(is_active) = request.is_active {
            detail.is_active = is_active;
        }
        detail.updated_at = Utc::now().to_rfc3339();

        self.repository.update_detail(&detail).await?;

        Ok(CodeDetailResponse {
            code_detail: detail,
            success_message: "Code detail updated successfully".to_string(),
        })
    }

    pub async fn delete_detail(&self, id: i64) -> Result<()> {
        info!("Deleting code detail: {}", id);

        self.repository
            .get_detail(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Code detail not found: {}", id))?;

        self.repository.delete_detail(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> CodeService {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        CodeService::new(db)
    }

    #[tokio::test]
    async fn test_group_crud() {
        let service = setup_test().await;

        let created = service
            .create_group(CreateCodeGroupRequest {
                group_code: "DEPT".to_string(),
                group_name: "Departments".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let updated = service
            .update_group(
                created.code_group.id,
                UpdateCodeGroupRequest {
                    group_name: Some("Registration departments".to_string()),
                    description: Some("Departments that register new-comers".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.code_group.group_name, "Registration departments");

        service.delete_group(created.code_group.id).await.unwrap();
        assert!(service.get_group(created.code_group.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_group_code_is_an_error() {
        let service = setup_test().await;

        let request = CreateCodeGroupRequest {
            group_code: "DEPT".to_string(),
            group_name: "Departments".to_string(),
            description: None,
        };
        service.create_group(request.clone()).await.unwrap();

        let result = service.create_group(request).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_detail_requires_existing_group() {
        let service = setup_test().await;

        let result = service
            .create_detail(
                999,
                CreateCodeDetailRequest {
                    code_value: "M".to_string(),
                    code_name: "Male".to_string(),
                    sort_order: None,
                    is_active: None,
                },
            )
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_detail_crud_and_duplicates() {
        let service = setup_test().await;

        let group = service
            .create_group(CreateCodeGroupRequest {
                group_code: "GENDER".to_string(),
                group_name: "Gender".to_string(),
                description: None,
            })
            .await
            .unwrap()
            .code_group;

        let detail = service
            .create_detail(
                group.id,
                CreateCodeDetailRequest {
                    code_value: "M".to_string(),
                    code_name: "Male".to_string(),
                    sort_order: Some(1),
                    is_active: None,
                },
            )
            .await
            .unwrap()
            .code_detail;
        assert!(detail.is_active);

        // Duplicate value in the same group
        let result = service
            .create_detail(
                group.id,
                CreateCodeDetailRequest {
                    code_value: "M".to_string(),
                    code_name: "Duplicate".to_string(),
                    sort_order: None,
                    is_active: None,
                },
            )
            .await;
        assert!(result.is_err());

        let updated = service
            .update_detail(
                detail.id,
                UpdateCodeDetailRequest {
                    code_name: None,
                    sort_order: Some(5),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.code_detail.sort_order, 5);
        assert!(!updated.code_detail.is_active);

        service.delete_detail(detail.id).await.unwrap();
        let listed = service.list_details(group.id).await.unwrap();
        assert!(listed.code_details.is_empty());
    }
}
