use tracing::debug;

use crate::types::Student;

use super::client::ApiClient;
use super::error::ApiError;

/// Optional roster filters for `GET /students`.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub school: Option<String>,
    pub grade: Option<String>,
    pub name: Option<String>,
    pub screening_status: Option<String>,
}

impl StudentFilter {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(school) = &self.school {
            query.push(("school", school.clone()));
        }
        if let Some(grade) = &self.grade {
            query.push(("grade", grade.clone()));
        }
        if let Some(name) = &self.name {
            query.push(("name", name.clone()));
        }
        if let Some(status) = &self.screening_status {
            query.push(("screening_status", status.clone()));
        }
        query
    }
}

/// Read-only lookups against the Directory Service. The directory owns the
/// student lifecycle; nothing here writes.
#[derive(Debug, Clone)]
pub struct StudentDirectory {
    api: ApiClient,
}

impl StudentDirectory {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, ApiError> {
        let query = filter.to_query();
        let students: Vec<Student> = self
            .api
            .get_json_cached("/students", &query, "student roster")
            .await?;
        debug!(count = students.len(), "Fetched student roster");
        Ok(students)
    }

    pub async fn get_student(&self, id: &str) -> Result<Student, ApiError> {
        self.api
            .get_json_cached(&format!("/students/{id}"), &[], "student")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_emits_only_set_fields() {
        let filter = StudentFilter {
            school: Some("Ban Nong Bua School".to_string()),
            grade: None,
            name: None,
            screening_status: Some("pending".to_string()),
        };
        let query = filter.to_query();
        assert_eq!(query.len(), 2);
        assert_eq!(query[0].0, "school");
        assert_eq!(query[1].0, "screening_status");
    }
}
