//! Security audit logging.
//!
//! Emits one structured `target: "security_audit"` tracing event per
//! audited action, so a deployment can route it to a separate sink. Must
//! never propagate a failure into the caller: formatting or emission errors
//! are themselves logged at `warn` via a fallback path and swallowed.

/// Masks an email for audit logs: keeps the first character and the domain,
/// e.g. `alice@example.com` -> `a***@example.com`.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            format!("{}***@{}", &local[..1], domain)
        }
        _ => "***".to_string(),
    }
}

fn partial_jti(jti: Option<&str>) -> String {
    match jti {
        Some(j) if j.len() >= 8 => format!("{}...", &j[..8]),
        Some(j) => j.to_string(),
        None => "none".to_string(),
    }
}

/// A dedicated logger for authentication and authorization events.
///
/// Every method is infallible by construction: there is nothing here that
/// can fail except the logging backend itself, and that failure must not
/// reach the caller, so each method wraps its emission in a best-effort
/// guard and falls back to a plain `tracing::warn!` if anything panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityAuditLogger;

impl SecurityAuditLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, f: impl FnOnce() + std::panic::UnwindSafe) {
        if std::panic::catch_unwind(f).is_err() {
            tracing::warn!(target: "security_audit", "audit event emission failed, swallowed");
        }
    }

    pub fn log_login_success(&self, email: &str, ip: &str) {
        let masked = mask_email(email);
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "login_success", email = %masked, ip = %ip);
        });
    }

    pub fn log_login_failure(&self, email: &str, ip: &str) {
        let masked = mask_email(email);
        self.emit(move || {
            tracing::warn!(target: "security_audit", event = "login_failure", email = %masked, ip = %ip);
        });
    }

    pub fn log_token_validation_failure(&self, reason: &str, ip: &str, token_jti: Option<&str>) {
        let jti = partial_jti(token_jti);
        self.emit(move || {
            tracing::warn!(target: "security_audit", event = "token_validation_failure", reason = %reason, ip = %ip, jti = %jti);
        });
    }

    pub fn log_token_revocation(&self, user_id: i64, token_jti: &str) {
        let jti = partial_jti(Some(token_jti));
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "token_revocation", user_id = user_id, jti = %jti);
        });
    }

    pub fn log_permission_denied(&self, user_id: i64, action: &str) {
        self.emit(move || {
            tracing::warn!(target: "security_audit", event = "permission_denied", user_id = user_id, action = %action);
        });
    }

    pub fn log_rate_limit_exceeded(&self, identity: &str, endpoint: &str) {
        self.emit(move || {
            tracing::warn!(target: "security_audit", event = "rate_limit_exceeded", identity = %identity, endpoint = %endpoint);
        });
    }

    pub fn log_password_reset_initiated(&self, email: &str) {
        let masked = mask_email(email);
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "password_reset_initiated", email = %masked);
        });
    }

    pub fn log_password_reset_completed(&self, user_id: i64) {
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "password_reset_completed", user_id = user_id);
        });
    }

    pub fn log_password_reset_failed(&self, reason: &str) {
        self.emit(move || {
            tracing::warn!(target: "security_audit", event = "password_reset_failed", reason = %reason);
        });
    }

    pub fn log_account_created(&self, user_id: i64) {
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "account_created", user_id = user_id);
        });
    }

    pub fn log_account_deleted(&self, user_id: i64) {
        self.emit(move || {
            tracing::info!(target: "security_audit", event = "account_deleted", user_id = user_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_local_part_keeping_first_character_and_domain() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
    }

    #[test]
    fn masks_malformed_email_without_panicking() {
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn partial_jti_truncates_long_ids() {
        assert_eq!(partial_jti(Some("abcdefgh-ijkl")), "abcdefgh...");
    }

    #[test]
    fn partial_jti_handles_missing_id() {
        assert_eq!(partial_jti(None), "none");
    }

    #[test]
    fn logging_never_panics_the_caller() {
        let logger = SecurityAuditLogger::new();
        logger.log_login_success("user@example.com", "127.0.0.1");
        logger.log_token_validation_failure("invalid_signature_or_format", "127.0.0.1", None);
    }
}
