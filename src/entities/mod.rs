//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bank_test_case;
pub mod hash_verification;
pub mod notification;
pub mod payment_session;
pub mod payment_status_history;
pub mod profile;
pub mod role;
pub mod security_audit_log;
pub mod service;
pub mod service_approval_level;
pub mod service_category;
pub mod service_request;
pub mod transaction_detail;
pub mod user_role;

// Re-export specific types to avoid conflicts
pub use bank_test_case::{Entity as BankTestCase, Model as BankTestCaseModel};
pub use hash_verification::{Entity as HashVerification, Model as HashVerificationModel};
pub use notification::{Entity as Notification, Model as NotificationModel};
pub use payment_session::{Entity as PaymentSession, Model as PaymentSessionModel, PaymentStatus};
pub use payment_status_history::{
    Entity as PaymentStatusHistory, Model as PaymentStatusHistoryModel,
};
pub use profile::{Entity as Profile, Model as ProfileModel};
pub use role::{Entity as Role, Model as RoleModel};
pub use security_audit_log::{Entity as SecurityAuditLog, Model as SecurityAuditLogModel, Severity};
pub use service::{Entity as Service, Model as ServiceModel};
pub use service_approval_level::{
    Entity as ServiceApprovalLevel, Model as ServiceApprovalLevelModel,
};
pub use service_category::{Entity as ServiceCategory, Model as ServiceCategoryModel};
pub use service_request::{Entity as ServiceRequest, Model as ServiceRequestModel, RequestStatus};
pub use transaction_detail::{Entity as TransactionDetail, Model as TransactionDetailModel};
pub use user_role::{Entity as UserRole, Model as UserRoleModel};
