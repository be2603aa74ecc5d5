//! Client for the external MyJKKN administrative API.
//!
//! - [`transport`]: the network seam (`reqwest` in production)
//! - [`client`]: key validation, URL building, status mapping
//! - [`normalize`]: flattens nested relation objects into display strings
//! - [`models`]: typed records and pages
//! - [`resources`]: per-resource list/search/filter/get methods

pub mod client;
pub mod error;
pub mod models;
pub mod normalize;
pub mod resources;
pub mod transport;

pub use client::MyJkknClient;
pub use error::{ApiError, ApiResponse, ApiResult};
pub use models::{
    DepartmentData, InstitutionData, Page, PaginationMetadata, ProgramData, StaffData,
    StudentData,
};
pub use normalize::NormalizeMode;
pub use resources::{
    DepartmentFilter, Departments, InstitutionFilter, Institutions, ProgramFilter, Programs,
    Resource, ResourceFilter, Staff, StaffFilter, StudentFilter, Students,
};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
