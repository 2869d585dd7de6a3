//! Permission checking utilities

use axum::http::Method;

use crate::error::{CatalogError, CatalogResult};
use crate::AuthenticatedPrincipal;

/// Path prefixes restricted to administrators
const ADMIN_PREFIXES: &[&str] = &["/api/users", "/api/collections"];

/// Paths that are always reachable without a principal
const PUBLIC_PATHS: &[&str] = &["/api/auth/login", "/api/auth/webmaster-login"];

pub fn is_mutation(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn requires_admin(path: &str) -> bool {
    ADMIN_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
}

/// Users may read their own account and edit their own profile and
/// password. Role, status and deletion stay with administrators.
fn is_own_account_request(method: &Method, path: &str, principal: &AuthenticatedPrincipal) -> bool {
    let Some(rest) = path.strip_prefix("/api/users/") else {
        return false;
    };
    let (id, sub) = rest.split_once('/').unwrap_or((rest, ""));
    if id.is_empty() || id != principal.id {
        return false;
    }
    match sub {
        "" => *method == Method::GET,
        "profile" | "password" => true,
        _ => false,
    }
}

/// Decide whether a request may proceed when authentication is enforced.
pub fn check_access(
    method: &Method,
    path: &str,
    principal: Option<&AuthenticatedPrincipal>,
) -> CatalogResult<()> {
    if PUBLIC_PATHS.contains(&path) {
        return Ok(());
    }

    if requires_admin(path) {
        let principal = principal.ok_or(CatalogError::Unauthorized)?;
        if principal.is_administrator() || is_own_account_request(method, path, principal) {
            return Ok(());
        }
        return Err(CatalogError::PermissionDenied {
            action: permission_denied_action(method, path),
        });
    }

    if is_mutation(method) && principal.is_none() {
        return Err(CatalogError::Unauthorized);
    }
    Ok(())
}

fn permission_denied_action(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrincipalKind;

    fn principal(kind: PrincipalKind, role: &str) -> AuthenticatedPrincipal {
        AuthenticatedPrincipal {
            kind,
            id: "65a1f0c2e4b0a1b2c3d4e5f6".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_reads_are_open() {
        assert!(check_access(&Method::GET, "/api/content", None).is_ok());
        assert!(check_access(&Method::POST, "/api/auth/login", None).is_ok());
    }

    #[test]
    fn test_mutations_need_principal() {
        let err = check_access(&Method::POST, "/api/classes", None).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        let teacher = principal(PrincipalKind::User, "teacher");
        assert!(check_access(&Method::POST, "/api/classes", Some(&teacher)).is_ok());
    }

    #[test]
    fn test_admin_routes() {
        let student = principal(PrincipalKind::User, "student");
        let admin = principal(PrincipalKind::User, "admin");
        let webmaster = principal(PrincipalKind::Webmaster, "webmaster");

        let err = check_access(&Method::GET, "/api/collections/list", Some(&student)).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
        assert!(check_access(&Method::GET, "/api/collections/list", Some(&admin)).is_ok());
        assert!(check_access(&Method::DELETE, "/api/users/x", Some(&webmaster)).is_ok());
        assert!(check_access(
            &Method::PUT,
            "/api/users/65a1f0c2e4b0a1b2c3d4e5f6/password",
            Some(&student)
        )
        .is_ok());
        assert!(check_access(&Method::GET, "/api/usersx", None).is_ok());
    }

    #[test]
    fn test_own_account_access() {
        let own = "/api/users/65a1f0c2e4b0a1b2c3d4e5f6";
        let student = principal(PrincipalKind::User, "student");

        assert!(check_access(&Method::GET, own, Some(&student)).is_ok());
        assert!(check_access(&Method::PUT, &format!("{}/profile", own), Some(&student)).is_ok());
        assert!(check_access(&Method::GET, &format!("{}/profile", own), Some(&student)).is_ok());

        // Role and status changes go through the bare account route
        let err = check_access(&Method::PUT, own, Some(&student)).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
        let err = check_access(&Method::DELETE, own, Some(&student)).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");

        let other = "/api/users/65a1f0c2e4b0a1b2c3d4e5f7/password";
        assert!(check_access(&Method::PUT, other, Some(&student)).is_err());
        assert!(check_access(&Method::PUT, &format!("{}/other", own), Some(&student)).is_err());
    }
}
