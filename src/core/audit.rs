//! Payment transaction tracking for bank integration testing.
//!
//! Every checkout attempt is a payment session keyed by `order_id`. Bank callbacks
//! are recorded verbatim in `transaction_details`, every status change is appended to
//! `payment_status_history`, and anything suspicious (hash mismatches, status
//! regressions, failed test cases) goes to `security_audit_log`. The admin
//! dashboard reads these tables back through [`get_transaction_trail`] and
//! [`dashboard_stats`].

use super::{Paged, collect_page, page_size};
use crate::{
    entities::{
        BankTestCase, HashVerification, PaymentSession, PaymentStatus, PaymentStatusHistory,
        SecurityAuditLog, Severity, TransactionDetail, bank_test_case, hash_verification,
        payment_session, payment_status_history, security_audit_log, transaction_detail,
    },
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, Iterable, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, prelude::*,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Input for [`create_tracked_payment_session`].
#[derive(Debug, Clone)]
pub struct NewPaymentSession {
    /// Merchant order id sent to the bank
    pub order_id: String,
    /// Paying user
    pub user_id: String,
    /// Service request being paid for, if any
    pub service_request_id: Option<i64>,
    /// Amount in major units
    pub amount: f64,
    /// ISO 4217 code
    pub currency: String,
    /// Gateway name
    pub gateway: String,
    /// Client address, for the audit log
    pub ip_address: Option<String>,
}

/// Hash the gateway sent against the one computed locally.
#[derive(Debug, Clone)]
pub struct HashCheck {
    /// Locally computed hash
    pub expected: String,
    /// Hash received from the bank
    pub received: String,
}

impl HashCheck {
    /// Case-insensitive comparison ignoring surrounding whitespace. An empty
    /// expected hash never matches.
    #[must_use]
    pub fn matches(&self) -> bool {
        let expected = self.expected.trim();
        !expected.is_empty() && expected.eq_ignore_ascii_case(self.received.trim())
    }
}

/// A bank callback for one order.
#[derive(Debug, Clone)]
pub struct TransactionResponse {
    /// Order the callback belongs to
    pub order_id: String,
    /// Status reported by the bank
    pub status: PaymentStatus,
    /// Bank transaction id
    pub transaction_id: Option<String>,
    /// Bank reference number
    pub bank_reference: Option<String>,
    /// Bank response code
    pub response_code: Option<String>,
    /// Bank response text
    pub response_message: Option<String>,
    /// Full callback payload
    pub raw_response: serde_json::Value,
    /// Hash verification, when the gateway signs its callbacks
    pub hash: Option<HashCheck>,
    /// Callback source address
    pub ip_address: Option<String>,
}

/// Result of [`record_transaction_response`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    /// Session after the update
    pub session: payment_session::Model,
    /// Stored callback row
    pub detail: transaction_detail::Model,
    /// `None` if the callback carried no hash
    pub hash_valid: Option<bool>,
}

fn validate_new_session(new: &NewPaymentSession) -> Result<()> {
    if new.order_id.trim().is_empty() {
        return Err(Error::validation("Order id cannot be empty"));
    }
    if new.user_id.trim().is_empty() {
        return Err(Error::validation("User id cannot be empty"));
    }
    if !new.amount.is_finite() || new.amount <= 0.0 {
        return Err(Error::validation(format!(
            "Invalid payment amount: {}",
            new.amount
        )));
    }
    if new.currency.len() != 3 || !new.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::validation(format!(
            "Invalid currency code: {}",
            new.currency
        )));
    }
    Ok(())
}

async fn append_history<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
    from: Option<PaymentStatus>,
    to: PaymentStatus,
    reason: Option<String>,
) -> Result<payment_status_history::Model> {
    let model = payment_status_history::ActiveModel {
        order_id: Set(order_id.to_string()),
        from_status: Set(from.map(|s| s.as_str().to_string())),
        to_status: Set(to.as_str().to_string()),
        reason: Set(reason),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Records a security event. High and critical events are also logged as warnings.
pub async fn log_security_event<C: ConnectionTrait>(
    db: &C,
    order_id: Option<&str>,
    event_type: &str,
    severity: Severity,
    details: &serde_json::Value,
    ip_address: Option<&str>,
) -> Result<security_audit_log::Model> {
    if event_type.trim().is_empty() {
        return Err(Error::validation("Event type cannot be empty"));
    }
    if matches!(severity, Severity::High | Severity::Critical) {
        warn!(?order_id, ?severity, "Security event {event_type}: {details}");
    } else {
        info!(?order_id, ?severity, "Security event {event_type}");
    }
    let model = security_audit_log::ActiveModel {
        order_id: Set(order_id.map(str::to_string)),
        event_type: Set(event_type.trim().to_string()),
        severity: Set(severity),
        details: Set(details.to_string()),
        ip_address: Set(ip_address.map(str::to_string)),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Opens a payment session and writes its first history and audit rows.
#[instrument(skip(db, new), fields(order_id = %new.order_id))]
pub async fn create_tracked_payment_session(
    db: &DatabaseConnection,
    new: NewPaymentSession,
) -> Result<payment_session::Model> {
    validate_new_session(&new)?;
    let order_id = new.order_id.trim().to_string();

    let txn = db.begin().await?;
    let existing = PaymentSession::find()
        .filter(payment_session::Column::OrderId.eq(order_id.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!(
            "Payment session {order_id} already exists"
        )));
    }

    let now = chrono::Utc::now();
    let model = payment_session::ActiveModel {
        order_id: Set(order_id.clone()),
        user_id: Set(new.user_id),
        service_request_id: Set(new.service_request_id),
        amount: Set(new.amount),
        currency: Set(new.currency.to_ascii_uppercase()),
        status: Set(PaymentStatus::Initiated),
        gateway: Set(new.gateway),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let session = model.insert(&txn).await?;

    append_history(
        &txn,
        &order_id,
        None,
        PaymentStatus::Initiated,
        Some("session created".to_string()),
    )
    .await?;
    log_security_event(
        &txn,
        Some(&order_id),
        "payment_session_created",
        Severity::Low,
        &serde_json::json!({
            "amount": session.amount,
            "currency": session.currency,
            "gateway": session.gateway,
        }),
        new.ip_address.as_deref(),
    )
    .await?;
    txn.commit().await?;

    info!("Payment session {} opened", order_id);
    Ok(session)
}

/// Stores a bank callback and moves the session to the reported status.
///
/// A failed hash check is logged as a `high` event and downgrades a reported
/// success to a failure. A session that already succeeded never leaves `success`;
/// a later contradicting callback is logged as a `medium` event instead.
#[instrument(skip(db, response), fields(order_id = %response.order_id, status = %response.status))]
pub async fn record_transaction_response(
    db: &DatabaseConnection,
    response: TransactionResponse,
) -> Result<TransactionOutcome> {
    let lookup = response.order_id.trim();
    let txn = db.begin().await?;
    let session = PaymentSession::find()
        .filter(payment_session::Column::OrderId.eq(lookup))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("payment session", lookup))?;
    let order_id = session.order_id.clone();
    let ip = response.ip_address.as_deref();
    let now = chrono::Utc::now();

    let hash_valid = response.hash.as_ref().map(HashCheck::matches);
    if let Some(check) = &response.hash {
        let row = hash_verification::ActiveModel {
            order_id: Set(order_id.clone()),
            expected_hash: Set(check.expected.clone()),
            received_hash: Set(check.received.clone()),
            is_valid: Set(check.matches()),
            created_at: Set(now),
            ..Default::default()
        };
        row.insert(&txn).await?;
    }

    let detail = transaction_detail::ActiveModel {
        order_id: Set(order_id.clone()),
        transaction_id: Set(response.transaction_id.clone()),
        bank_reference: Set(response.bank_reference.clone()),
        response_code: Set(response.response_code.clone()),
        response_message: Set(response.response_message.clone()),
        raw_response: Set(response.raw_response.to_string()),
        hash_verified: Set(hash_valid),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut next = response.status;
    let mut reason = response.response_message.clone();

    if hash_valid == Some(false) {
        log_security_event(
            &txn,
            Some(&order_id),
            "hash_mismatch",
            Severity::High,
            &serde_json::json!({
                "reported_status": response.status,
                "response_code": response.response_code,
            }),
            ip,
        )
        .await?;
        if next == PaymentStatus::Success {
            next = PaymentStatus::Failure;
            reason = Some("hash verification failed".to_string());
        }
    }

    if session.status == PaymentStatus::Success && next != PaymentStatus::Success {
        log_security_event(
            &txn,
            Some(&order_id),
            "status_regression",
            Severity::Medium,
            &serde_json::json!({ "current": session.status, "reported": next }),
            ip,
        )
        .await?;
        next = PaymentStatus::Success;
    }

    let session = if next == session.status {
        session
    } else {
        let from = session.status;
        let mut model: payment_session::ActiveModel = session.into();
        model.status = Set(next);
        model.updated_at = Set(now);
        let updated = model.update(&txn).await?;
        append_history(&txn, &order_id, Some(from), next, reason).await?;
        updated
    };

    txn.commit().await?;
    info!("Recorded bank response for {} ({})", order_id, session.status);
    Ok(TransactionOutcome {
        session,
        detail,
        hash_valid,
    })
}

/// Filters for [`list_payment_sessions`].
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only sessions in this status
    pub status: Option<PaymentStatus>,
    /// Only sessions of this user
    pub user_id: Option<String>,
}

/// Sessions newest first.
pub async fn list_payment_sessions(
    db: &DatabaseConnection,
    filter: &SessionFilter,
    page: u64,
    limit: u64,
) -> Result<Paged<payment_session::Model>> {
    let limit = page_size(limit);
    let mut query = PaymentSession::find();
    if let Some(status) = filter.status {
        query = query.filter(payment_session::Column::Status.eq(status));
    }
    if let Some(user_id) = &filter.user_id {
        query = query.filter(payment_session::Column::UserId.eq(user_id.as_str()));
    }
    let paginator = query
        .order_by_desc(payment_session::Column::CreatedAt)
        .order_by_desc(payment_session::Column::Id)
        .paginate(db, limit);
    collect_page(paginator, page, limit).await
}

/// Everything recorded about one order, oldest rows first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionTrail {
    /// The payment session
    pub session: payment_session::Model,
    /// Bank callbacks
    pub details: Vec<transaction_detail::Model>,
    /// Status changes
    pub history: Vec<payment_status_history::Model>,
    /// Security events logged for the order
    pub security_events: Vec<security_audit_log::Model>,
    /// Hash verifications
    pub hash_checks: Vec<hash_verification::Model>,
}

/// Collects the full audit trail of `order_id`.
pub async fn get_transaction_trail(
    db: &DatabaseConnection,
    order_id: &str,
) -> Result<TransactionTrail> {
    let order_id = order_id.trim();
    let session = PaymentSession::find()
        .filter(payment_session::Column::OrderId.eq(order_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("payment session", order_id))?;

    let details = TransactionDetail::find()
        .filter(transaction_detail::Column::OrderId.eq(order_id))
        .order_by_asc(transaction_detail::Column::Id)
        .all(db)
        .await?;
    let history = PaymentStatusHistory::find()
        .filter(payment_status_history::Column::OrderId.eq(order_id))
        .order_by_asc(payment_status_history::Column::Id)
        .all(db)
        .await?;
    let security_events = SecurityAuditLog::find()
        .filter(security_audit_log::Column::OrderId.eq(order_id))
        .order_by_asc(security_audit_log::Column::Id)
        .all(db)
        .await?;
    let hash_checks = HashVerification::find()
        .filter(hash_verification::Column::OrderId.eq(order_id))
        .order_by_asc(hash_verification::Column::Id)
        .all(db)
        .await?;

    Ok(TransactionTrail {
        session,
        details,
        history,
        security_events,
        hash_checks,
    })
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// All sessions
    pub total_sessions: u64,
    /// Session count per status name
    pub by_status: BTreeMap<String, u64>,
    /// Sum of successful amounts
    pub success_amount: f64,
    /// Successes as a percentage of settled (success + failure) sessions
    pub success_rate: f64,
    /// High and critical security events
    pub high_severity_events: u64,
    /// Hash checks that did not match
    pub failed_hash_checks: u64,
    /// Bank test cases defined
    pub test_cases_total: u64,
    /// Bank test cases whose last run passed
    pub test_cases_passed: u64,
}

/// Computes the dashboard figures over every session and test case.
pub async fn dashboard_stats(db: &DatabaseConnection) -> Result<DashboardStats> {
    let mut by_status = BTreeMap::new();
    let mut total_sessions = 0;
    for status in PaymentStatus::iter() {
        let count = PaymentSession::find()
            .filter(payment_session::Column::Status.eq(status))
            .count(db)
            .await?;
        total_sessions += count;
        by_status.insert(status.as_str().to_string(), count);
    }

    let success_amount = PaymentSession::find()
        .select_only()
        .column_as(payment_session::Column::Amount.sum(), "total")
        .filter(payment_session::Column::Status.eq(PaymentStatus::Success))
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?
        .flatten()
        .unwrap_or(0.0);

    let succeeded = by_status.get(PaymentStatus::Success.as_str()).copied().unwrap_or(0);
    let failed = by_status.get(PaymentStatus::Failure.as_str()).copied().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let success_rate = if succeeded + failed == 0 {
        0.0
    } else {
        succeeded as f64 * 100.0 / (succeeded + failed) as f64
    };

    let high_severity_events = SecurityAuditLog::find()
        .filter(security_audit_log::Column::Severity.is_in([Severity::High, Severity::Critical]))
        .count(db)
        .await?;
    let failed_hash_checks = HashVerification::find()
        .filter(hash_verification::Column::IsValid.eq(false))
        .count(db)
        .await?;
    let test_cases_total = BankTestCase::find().count(db).await?;
    let test_cases_passed = BankTestCase::find()
        .filter(bank_test_case::Column::Passed.eq(true))
        .count(db)
        .await?;

    Ok(DashboardStats {
        total_sessions,
        by_status,
        success_amount,
        success_rate,
        high_severity_events,
        failed_hash_checks,
        test_cases_total,
        test_cases_passed,
    })
}

/// Defines a bank test case expecting `expected_status`.
pub async fn create_bank_test_case(
    db: &DatabaseConnection,
    case_code: &str,
    description: &str,
    expected_status: PaymentStatus,
) -> Result<bank_test_case::Model> {
    let case_code = case_code.trim();
    if case_code.is_empty() {
        return Err(Error::validation("Test case code cannot be empty"));
    }
    let existing = BankTestCase::find()
        .filter(bank_test_case::Column::CaseCode.eq(case_code))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!(
            "Test case {case_code} already exists"
        )));
    }
    let model = bank_test_case::ActiveModel {
        case_code: Set(case_code.to_string()),
        description: Set(description.to_string()),
        expected_status: Set(expected_status.as_str().to_string()),
        actual_status: Set(None),
        passed: Set(None),
        order_id: Set(None),
        executed_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Compares the current status of `order_id` against the case's expectation.
#[instrument(skip(db))]
pub async fn record_test_result(
    db: &DatabaseConnection,
    case_code: &str,
    order_id: &str,
) -> Result<bank_test_case::Model> {
    let case_code = case_code.trim();
    let order_id = order_id.trim();
    let case = BankTestCase::find()
        .filter(bank_test_case::Column::CaseCode.eq(case_code))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("bank test case", case_code))?;
    let session = PaymentSession::find()
        .filter(payment_session::Column::OrderId.eq(order_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("payment session", order_id))?;

    let actual = session.status.as_str();
    let passed = case.expected_status == actual;
    if !passed {
        log_security_event(
            db,
            Some(order_id),
            "bank_test_failed",
            Severity::Medium,
            &serde_json::json!({
                "case_code": case.case_code,
                "expected": case.expected_status,
                "actual": actual,
            }),
            None,
        )
        .await?;
    }

    let mut model: bank_test_case::ActiveModel = case.into();
    model.actual_status = Set(Some(actual.to_string()));
    model.passed = Set(Some(passed));
    model.order_id = Set(Some(order_id.to_string()));
    model.executed_at = Set(Some(chrono::Utc::now()));
    let updated = model.update(db).await?;
    info!("Bank test case {} passed={}", case_code, passed);
    Ok(updated)
}

/// Every bank test case, ordered by code.
pub async fn list_bank_test_cases(db: &DatabaseConnection) -> Result<Vec<bank_test_case::Model>> {
    BankTestCase::find()
        .order_by_asc(bank_test_case::Column::CaseCode)
        .all(db)
        .await
        .map_err(Into::into)
}
