//! Authorization gate evaluated before every data operation

use std::fmt;

use crate::session::SessionContext;
use crate::AdapterError;

/// Privilege an operation requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLevel {
    /// Any active user
    Authenticated,
    /// Active user with `admin: true`
    AdminOnly,
    /// Admin, or the active user whose email is the target
    SelfOrAdmin(String),
}

/// Why a check was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotAuthorized,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "NotAuthenticated",
            DenyReason::NotAuthorized => "NotAuthorized",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into [`AdapterError::Authorization`].
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AdapterError::Authorization(reason)),
        }
    }
}

/// Decide whether the session may perform an operation at `level`.
pub fn check(session: &SessionContext, level: &AccessLevel) -> Decision {
    let Some(user) = session.user() else {
        return Decision::Deny(DenyReason::NotAuthenticated);
    };

    let allowed = match level {
        AccessLevel::Authenticated => true,
        AccessLevel::AdminOnly => user.is_admin(),
        AccessLevel::SelfOrAdmin(target_email) => {
            user.is_admin() || user.email.as_deref() == Some(target_email.as_str())
        }
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotAuthorized)
    }
}

/// [`check`], failing with [`AdapterError::Authorization`] on denial.
pub fn require(session: &SessionContext, level: &AccessLevel) -> crate::Result<()> {
    let decision = check(session, level);
    if let Decision::Deny(reason) = decision {
        tracing::debug!(
            uid = session.user().map(|u| u.uid.as_str()),
            ?level,
            %reason,
            "authorization denied"
        );
    }
    decision.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::user_with;

    #[test]
    fn test_anonymous_denied_everywhere() {
        let session = SessionContext::anonymous();
        for level in [
            AccessLevel::Authenticated,
            AccessLevel::AdminOnly,
            AccessLevel::SelfOrAdmin("a@example.com".into()),
        ] {
            assert_eq!(
                check(&session, &level),
                Decision::Deny(DenyReason::NotAuthenticated)
            );
        }
    }

    #[test]
    fn test_admin_only() {
        let plain = SessionContext::with_user(user_with("u1", "u1@example.com", false));
        let admin = SessionContext::with_user(user_with("u2", "u2@example.com", true));

        assert_eq!(
            check(&plain, &AccessLevel::AdminOnly),
            Decision::Deny(DenyReason::NotAuthorized)
        );
        assert_eq!(check(&admin, &AccessLevel::AdminOnly), Decision::Allow);
        assert_eq!(check(&plain, &AccessLevel::Authenticated), Decision::Allow);
    }

    #[test]
    fn test_self_or_admin() {
        let plain = SessionContext::with_user(user_with("u1", "u1@example.com", false));
        let admin = SessionContext::with_user(user_with("u2", "u2@example.com", true));

        let own = AccessLevel::SelfOrAdmin("u1@example.com".into());
        let other = AccessLevel::SelfOrAdmin("someone@example.com".into());

        assert!(check(&plain, &own).is_allowed());
        assert_eq!(
            check(&plain, &other),
            Decision::Deny(DenyReason::NotAuthorized)
        );
        assert!(check(&admin, &other).is_allowed());
    }

    #[test]
    fn test_require_maps_to_error() {
        let err = require(&SessionContext::anonymous(), &AccessLevel::Authenticated).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Authorization(DenyReason::NotAuthenticated)
        ));
    }
}
