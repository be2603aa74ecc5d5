//! Resource-specific methods on [`MyJkknClient`].
//!
//! Each resource (students, staff, institutions, departments, programs) is a
//! marker type implementing [`Resource`]. The generic `list`/`search`/`filter`/
//! `get_by_id` methods do the parameter assembly once; the named wrappers below
//! them are thin conveniences over those four.
//!
//! A call carries at most one of {search, one filter}. Combinations are not
//! validated here; [`crate::directory::Directory`] keeps them exclusive.

use super::client::MyJkknClient;
use super::error::{ApiError, ApiResult};
use super::models::{
    DepartmentData, InstitutionData, Page, ProgramData, StaffData, StudentData, into_page,
    into_record,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::instrument;

/// A resource-specific filter that maps to a single query parameter.
pub trait ResourceFilter: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Query parameter name and value.
    fn query_param(&self) -> (&'static str, String);
}

/// A paginated collection under `/api-management/`.
pub trait Resource: Send + Sync + 'static {
    /// Path segment under `/api-management/`
    const PATH: &'static str;
    /// Record type of one row
    type Record: DeserializeOwned + Serialize + Debug + Clone + Send + Sync + 'static;
    /// Filters the collection accepts
    type Filter: ResourceFilter;

    /// Collection endpoint.
    #[must_use]
    fn endpoint() -> String {
        format!("/api-management/{}", Self::PATH)
    }
}

/// `/api-management/students`
#[derive(Debug, Clone, Copy, Default)]
pub struct Students;

/// `/api-management/staff`
#[derive(Debug, Clone, Copy, Default)]
pub struct Staff;

/// `/api-management/institutions`
#[derive(Debug, Clone, Copy, Default)]
pub struct Institutions;

/// `/api-management/departments`
#[derive(Debug, Clone, Copy, Default)]
pub struct Departments;

/// `/api-management/programs`
#[derive(Debug, Clone, Copy, Default)]
pub struct Programs;

/// Filters for [`Students`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentFilter {
    /// `institution_id`
    Institution(String),
    /// `department_id`
    Department(String),
    /// `program_id`
    Program(String),
    /// `is_profile_complete`
    ProfileComplete(bool),
}

/// Filters for [`Staff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffFilter {
    /// `institution_id`
    Institution(String),
    /// `department_id`
    Department(String),
    /// `designation`
    Designation(String),
    /// `is_active`
    Active(bool),
}

/// Filters for [`Institutions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstitutionFilter {
    /// `is_active`
    Active(bool),
}

/// Filters for [`Departments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentFilter {
    /// `institution_id`
    Institution(String),
    /// `degree_id`
    Degree(String),
    /// `is_active`
    Active(bool),
}

/// Filters for [`Programs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramFilter {
    /// `institution_id`
    Institution(String),
    /// `department_id`
    Department(String),
    /// `degree_id`
    Degree(String),
    /// `is_active`
    Active(bool),
}

impl ResourceFilter for StudentFilter {
    fn query_param(&self) -> (&'static str, String) {
        match self {
            Self::Institution(id) => ("institution_id", id.clone()),
            Self::Department(id) => ("department_id", id.clone()),
            Self::Program(id) => ("program_id", id.clone()),
            Self::ProfileComplete(done) => ("is_profile_complete", done.to_string()),
        }
    }
}

impl ResourceFilter for StaffFilter {
    fn query_param(&self) -> (&'static str, String) {
        match self {
            Self::Institution(id) => ("institution_id", id.clone()),
            Self::Department(id) => ("department_id", id.clone()),
            Self::Designation(designation) => ("designation", designation.clone()),
            Self::Active(active) => ("is_active", active.to_string()),
        }
    }
}

impl ResourceFilter for InstitutionFilter {
    fn query_param(&self) -> (&'static str, String) {
        match self {
            Self::Active(active) => ("is_active", active.to_string()),
        }
    }
}

impl ResourceFilter for DepartmentFilter {
    fn query_param(&self) -> (&'static str, String) {
        match self {
            Self::Institution(id) => ("institution_id", id.clone()),
            Self::Degree(id) => ("degree_id", id.clone()),
            Self::Active(active) => ("is_active", active.to_string()),
        }
    }
}

impl ResourceFilter for ProgramFilter {
    fn query_param(&self) -> (&'static str, String) {
        match self {
            Self::Institution(id) => ("institution_id", id.clone()),
            Self::Department(id) => ("department_id", id.clone()),
            Self::Degree(id) => ("degree_id", id.clone()),
            Self::Active(active) => ("is_active", active.to_string()),
        }
    }
}

impl Resource for Students {
    const PATH: &'static str = "students";
    type Record = StudentData;
    type Filter = StudentFilter;
}

impl Resource for Staff {
    const PATH: &'static str = "staff";
    type Record = StaffData;
    type Filter = StaffFilter;
}

impl Resource for Institutions {
    const PATH: &'static str = "institutions";
    type Record = InstitutionData;
    type Filter = InstitutionFilter;
}

impl Resource for Departments {
    const PATH: &'static str = "departments";
    type Record = DepartmentData;
    type Filter = DepartmentFilter;
}

impl Resource for Programs {
    const PATH: &'static str = "programs";
    type Record = ProgramData;
    type Filter = ProgramFilter;
}

impl MyJkknClient {
    async fn fetch_page<R: Resource>(
        &self,
        page: u32,
        limit: u32,
        extra: Option<(&'static str, String)>,
    ) -> ApiResult<Page<R::Record>> {
        let page = page.max(1);
        let mut params = vec![("page", page.to_string()), ("limit", limit.to_string())];
        params.extend(extra);
        let value = self.get(&R::endpoint(), &params).await?;
        into_page(value, page, limit)
    }

    /// One unfiltered page of `R`.
    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn list<R: Resource>(&self, page: u32, limit: u32) -> ApiResult<Page<R::Record>> {
        self.fetch_page::<R>(page, limit, None).await
    }

    /// One page of `R` matching the free-text `query`.
    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn search<R: Resource>(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<R::Record>> {
        self.fetch_page::<R>(page, limit, Some(("search", query.to_string())))
            .await
    }

    /// One page of `R` narrowed by a single filter.
    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn filter<R: Resource>(
        &self,
        filter: &R::Filter,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<R::Record>> {
        self.fetch_page::<R>(page, limit, Some(filter.query_param()))
            .await
    }

    /// A single record of `R`.
    ///
    /// A blank id is answered locally with [`ApiError::NotFound`], since it would
    /// otherwise address the collection itself. The id is percent-encoded as one
    /// path segment.
    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn get_by_id<R: Resource>(&self, id: &str) -> ApiResult<R::Record> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::NotFound {
                endpoint: format!("{}/", R::endpoint()),
            });
        }
        let segment: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let endpoint = format!("{}/{}", R::endpoint(), segment);
        let value = self.get(&endpoint, &[]).await?;
        into_record(value, &endpoint)
    }

    // Students

    /// One page of students.
    pub async fn get_students(&self, page: u32, limit: u32) -> ApiResult<Page<StudentData>> {
        self.list::<Students>(page, limit).await
    }

    /// One student by id.
    pub async fn get_student_by_id(&self, id: &str) -> ApiResult<StudentData> {
        self.get_by_id::<Students>(id).await
    }

    /// Students whose name, roll number or e-mail matches `query`.
    pub async fn search_students(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StudentData>> {
        self.search::<Students>(query, page, limit).await
    }

    /// Students of one institution.
    pub async fn get_students_by_institution(
        &self,
        institution_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StudentData>> {
        let filter = StudentFilter::Institution(institution_id.to_string());
        self.filter::<Students>(&filter, page, limit).await
    }

    /// Students of one department.
    pub async fn get_students_by_department(
        &self,
        department_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StudentData>> {
        let filter = StudentFilter::Department(department_id.to_string());
        self.filter::<Students>(&filter, page, limit).await
    }

    /// Students enrolled in one program.
    pub async fn get_students_by_program(
        &self,
        program_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StudentData>> {
        let filter = StudentFilter::Program(program_id.to_string());
        self.filter::<Students>(&filter, page, limit).await
    }

    // Staff

    /// One page of staff.
    pub async fn get_staff(&self, page: u32, limit: u32) -> ApiResult<Page<StaffData>> {
        self.list::<Staff>(page, limit).await
    }

    /// One staff member by id.
    pub async fn get_staff_by_id(&self, id: &str) -> ApiResult<StaffData> {
        self.get_by_id::<Staff>(id).await
    }

    /// Staff matching `query`.
    pub async fn search_staff(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StaffData>> {
        self.search::<Staff>(query, page, limit).await
    }

    /// Staff of one institution.
    pub async fn get_staff_by_institution(
        &self,
        institution_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StaffData>> {
        let filter = StaffFilter::Institution(institution_id.to_string());
        self.filter::<Staff>(&filter, page, limit).await
    }

    /// Staff of one department.
    pub async fn get_staff_by_department(
        &self,
        department_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StaffData>> {
        let filter = StaffFilter::Department(department_id.to_string());
        self.filter::<Staff>(&filter, page, limit).await
    }

    /// Staff holding `designation`, e.g. `Professor`.
    pub async fn get_staff_by_designation(
        &self,
        designation: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<StaffData>> {
        let filter = StaffFilter::Designation(designation.to_string());
        self.filter::<Staff>(&filter, page, limit).await
    }

    // Institutions

    /// One page of institutions.
    pub async fn get_institutions(
        &self,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<InstitutionData>> {
        self.list::<Institutions>(page, limit).await
    }

    /// One institution by id.
    pub async fn get_institution_by_id(&self, id: &str) -> ApiResult<InstitutionData> {
        self.get_by_id::<Institutions>(id).await
    }

    /// Institutions matching `query`.
    pub async fn search_institutions(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<InstitutionData>> {
        self.search::<Institutions>(query, page, limit).await
    }

    /// Active institutions only.
    pub async fn get_active_institutions(
        &self,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<InstitutionData>> {
        self.filter::<Institutions>(&InstitutionFilter::Active(true), page, limit)
            .await
    }

    // Departments

    /// One page of departments.
    pub async fn get_departments(
        &self,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<DepartmentData>> {
        self.list::<Departments>(page, limit).await
    }

    /// One department by id.
    pub async fn get_department_by_id(&self, id: &str) -> ApiResult<DepartmentData> {
        self.get_by_id::<Departments>(id).await
    }

    /// Departments matching `query`.
    pub async fn search_departments(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<DepartmentData>> {
        self.search::<Departments>(query, page, limit).await
    }

    /// Departments of one institution.
    pub async fn get_departments_by_institution(
        &self,
        institution_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<DepartmentData>> {
        let filter = DepartmentFilter::Institution(institution_id.to_string());
        self.filter::<Departments>(&filter, page, limit).await
    }

    // Programs

    /// One page of programs.
    pub async fn get_programs(&self, page: u32, limit: u32) -> ApiResult<Page<ProgramData>> {
        self.list::<Programs>(page, limit).await
    }

    /// One program by id.
    pub async fn get_program_by_id(&self, id: &str) -> ApiResult<ProgramData> {
        self.get_by_id::<Programs>(id).await
    }

    /// Programs matching `query`.
    pub async fn search_programs(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<ProgramData>> {
        self.search::<Programs>(query, page, limit).await
    }

    /// Programs offered by one institution.
    pub async fn get_programs_by_institution(
        &self,
        institution_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<ProgramData>> {
        let filter = ProgramFilter::Institution(institution_id.to_string());
        self.filter::<Programs>(&filter, page, limit).await
    }

    /// Programs run by one department.
    pub async fn get_programs_by_department(
        &self,
        department_id: &str,
        page: u32,
        limit: u32,
    ) -> ApiResult<Page<ProgramData>> {
        let filter = ProgramFilter::Department(department_id.to_string());
        self.filter::<Programs>(&filter, page, limit).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{StubTransport, stub_client, test_api_config};
    use serde_json::json;
    use std::sync::Arc;

    fn student_rows(count: usize) -> Vec<serde_json::Value> {
        (0..count)
            .map(|i| {
                json!({
                    "id": format!("s-{i}"),
                    "first_name": "Student",
                    "last_name": format!("{i}"),
                    "roll_number": format!("22CS{i:03}"),
                    "institution": {"id": 1, "name": "JKKN College of Engineering"},
                    "department": {"department_name": "CSE"},
                    "is_profile_complete": true
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_second_page_of_students_reports_three_pages() {
        let transport = Arc::new(StubTransport::new());
        transport.push_json(200, json!({"data": student_rows(10), "total": 25, "page": 2}));
        let client = stub_client(&transport, test_api_config());

        let page = client.get_students(2, 10).await.unwrap();

        assert_eq!(page.metadata.total_pages, 3);
        assert_eq!(page.metadata.page, 2);
        assert_eq!(page.metadata.total, 25);
        assert!(!page.data.is_empty());
        assert_eq!(page.data[0].institution.as_deref(), Some("JKKN College of Engineering"));
        assert_eq!(page.data[0].department.as_deref(), Some("CSE"));
        assert_eq!(page.data[0].name.as_deref(), Some("Student 0"));

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/api-management/students"));
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_param("limit"), Some("10"));
    }

    #[tokio::test]
    async fn test_filters_become_single_query_parameter() {
        let transport = Arc::new(StubTransport::always(200, json!({"data": [], "total": 0})));
        let client = stub_client(&transport, test_api_config());

        client.get_staff_by_designation("Professor", 1, 10).await.unwrap();
        client.get_active_institutions(1, 10).await.unwrap();
        client.get_programs_by_department("7", 1, 10).await.unwrap();
        client.search_departments("mech", 1, 10).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].query_param("designation"), Some("Professor"));
        assert!(requests[0].url.ends_with("/api-management/staff"));
        assert_eq!(requests[1].query_param("is_active"), Some("true"));
        assert_eq!(requests[2].query_param("department_id"), Some("7"));
        assert_eq!(requests[3].query_param("search"), Some("mech"));
        assert!(requests.iter().all(|r| r.query.len() == 3));
    }

    #[tokio::test]
    async fn test_page_zero_is_clamped_to_first_page() {
        let transport = Arc::new(StubTransport::always(200, json!([])));
        let client = stub_client(&transport, test_api_config());

        let page = client.get_departments(0, 10).await.unwrap();

        assert_eq!(page.metadata.page, 1);
        assert_eq!(page.metadata.total_pages, 0);
        assert_eq!(transport.requests()[0].query_param("page"), Some("1"));
    }

    #[tokio::test]
    async fn test_get_by_id_unwraps_data_and_maps_missing() {
        let transport = Arc::new(StubTransport::new());
        transport.push_json(
            200,
            json!({"data": {"id": 42, "employee_id": {"staff_id": "EMP042"}, "is_active": true}}),
        );
        transport.push_json(404, json!({"error": "not found"}));
        let client = stub_client(&transport, test_api_config());

        let staff = client.get_staff_by_id("42").await.unwrap();
        assert_eq!(staff.id, "42");
        assert_eq!(staff.employee_id.as_deref(), Some("EMP042"));
        assert_eq!(staff.status.as_deref(), Some("active"));
        assert!(transport.requests()[0].url.ends_with("/api-management/staff/42"));

        let missing = client.get_program_by_id("999").await.unwrap_err();
        assert!(matches!(missing, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_blank_id_is_not_found_without_a_request() {
        let transport = Arc::new(StubTransport::always(
            200,
            json!({"data": student_rows(3), "total": 3}),
        ));
        let client = stub_client(&transport, test_api_config());

        for id in ["", "   "] {
            let result = client.get_student_by_id(id).await;
            assert!(matches!(result, Err(ApiError::NotFound { .. })), "{id:?}");
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_id_is_encoded_as_single_path_segment() {
        let transport = Arc::new(StubTransport::always(
            200,
            json!({"data": {"id": "a/b", "department_name": "CSE"}}),
        ));
        let client = stub_client(&transport, test_api_config());

        client.get_department_by_id("a/b?x=1").await.unwrap();

        let request = &transport.requests()[0];
        assert!(
            request
                .url
                .ends_with("/api-management/departments/a%2Fb%3Fx%3D1"),
            "{}",
            request.url
        );
        assert!(request.query.is_empty());
    }

    #[tokio::test]
    async fn test_list_response_for_id_lookup_is_rejected() {
        let transport = Arc::new(StubTransport::always(
            200,
            json!({"data": student_rows(2), "total": 2}),
        ));
        let client = stub_client(&transport, test_api_config());

        let result = client.get_student_by_id("s-9").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_filter_query_params() {
        assert_eq!(
            StudentFilter::ProfileComplete(false).query_param(),
            ("is_profile_complete", "false".to_string())
        );
        assert_eq!(
            DepartmentFilter::Degree("3".into()).query_param(),
            ("degree_id", "3".to_string())
        );
        assert_eq!(Programs::endpoint(), "/api-management/programs");
    }
}
