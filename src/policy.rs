//! Authorization policy.
//!
//! One function per gated endpoint, mapping the caller's identity (and, where it
//! matters, resource ownership) to a decision. Kept free of HTTP types so the rules
//! can be tested on their own; handlers turn a [`Denial`] into an [`AppError`].

use crate::{auth::AuthUser, error::AppError, models::Role};

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No identity attached; maps to 401.
    Unauthenticated,
    /// Identity present (or deliberately not distinguished) but not permitted; maps to 403.
    Forbidden(&'static str),
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        tracing::warn!(?denial, "request denied by policy");
        match denial {
            Denial::Unauthenticated => AppError::AuthenticationRequired,
            Denial::Forbidden(reason) => AppError::Forbidden(reason.to_string()),
        }
    }
}

pub type Decision<T = ()> = Result<T, Denial>;

/// Which applications a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    /// Applications submitted by this job seeker.
    SubmittedBy(i32),
    /// Applications to any job owned by this employer.
    PostedBy(i32),
}

/// Ownership facts for a status update, only gathered when ownership is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Unchecked,
    /// The employer id of the job the application belongs to, if the job still exists.
    JobOwnedBy(Option<i32>),
}

/// `POST /api/jobs`: employers only. Anonymous callers get 403, not 401.
pub fn post_job(caller: Option<&AuthUser>) -> Decision<i32> {
    match caller {
        Some(user) if user.role == Role::Employer => Ok(user.id),
        _ => Err(Denial::Forbidden("Only employers can post jobs")),
    }
}

/// `POST /api/jobs/{id}/apply`: job seekers only. Anonymous callers get 403.
pub fn apply_to_job(caller: Option<&AuthUser>) -> Decision<i32> {
    match caller {
        Some(user) if user.role == Role::JobSeeker => Ok(user.id),
        _ => Err(Denial::Forbidden("Only job seekers can apply to jobs")),
    }
}

/// `GET /api/applications`: anonymous is 401, other roles 403.
pub fn list_applications(caller: Option<&AuthUser>) -> Decision<ApplicationScope> {
    let Some(user) = caller else {
        return Err(Denial::Unauthenticated);
    };
    match user.role {
        Role::JobSeeker => Ok(ApplicationScope::SubmittedBy(user.id)),
        Role::Employer => Ok(ApplicationScope::PostedBy(user.id)),
        Role::Admin => Err(Denial::Forbidden("Invalid role")),
    }
}

/// Role half of `PATCH /api/applications/{id}/status`: employers only, anonymous gets 403.
pub fn update_status_role(caller: Option<&AuthUser>) -> Decision<AuthUser> {
    match caller {
        Some(user) if user.role == Role::Employer => Ok(*user),
        _ => Err(Denial::Forbidden(
            "Only employers can update application status",
        )),
    }
}

/// Ownership half of `PATCH /api/applications/{id}/status`.
///
/// With `Ownership::Unchecked` any employer may update any application, which is the
/// default behaviour. `JobOwnedBy` is passed when ownership enforcement is configured.
pub fn update_status_ownership(employer: &AuthUser, ownership: Ownership) -> Decision {
    match ownership {
        Ownership::Unchecked => Ok(()),
        Ownership::JobOwnedBy(Some(owner)) if owner == employer.id => Ok(()),
        Ownership::JobOwnedBy(_) => Err(Denial::Forbidden(
            "Only the employer who posted the job can update its applications",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPLOYER: AuthUser = AuthUser { id: 1, role: Role::Employer };
    const SEEKER: AuthUser = AuthUser { id: 2, role: Role::JobSeeker };
    const ADMIN: AuthUser = AuthUser { id: 3, role: Role::Admin };

    #[test]
    fn only_employers_post_jobs() {
        assert_eq!(post_job(Some(&EMPLOYER)), Ok(1));
        assert!(matches!(post_job(Some(&SEEKER)), Err(Denial::Forbidden(_))));
        assert!(matches!(post_job(Some(&ADMIN)), Err(Denial::Forbidden(_))));
        assert!(matches!(post_job(None), Err(Denial::Forbidden(_))));
    }

    #[test]
    fn only_job_seekers_apply() {
        assert_eq!(apply_to_job(Some(&SEEKER)), Ok(2));
        assert!(matches!(apply_to_job(Some(&EMPLOYER)), Err(Denial::Forbidden(_))));
        assert!(matches!(apply_to_job(None), Err(Denial::Forbidden(_))));
    }

    #[test]
    fn listing_scope_depends_on_role() {
        assert_eq!(
            list_applications(Some(&SEEKER)),
            Ok(ApplicationScope::SubmittedBy(2))
        );
        assert_eq!(
            list_applications(Some(&EMPLOYER)),
            Ok(ApplicationScope::PostedBy(1))
        );
        assert!(matches!(list_applications(Some(&ADMIN)), Err(Denial::Forbidden(_))));
        assert_eq!(list_applications(None), Err(Denial::Unauthenticated));
    }

    #[test]
    fn status_updates_need_employer_role() {
        assert_eq!(update_status_role(Some(&EMPLOYER)), Ok(EMPLOYER));
        assert!(update_status_role(Some(&SEEKER)).is_err());
        assert!(matches!(update_status_role(None), Err(Denial::Forbidden(_))));
    }

    #[test]
    fn ownership_is_only_checked_when_supplied() {
        assert!(update_status_ownership(&EMPLOYER, Ownership::Unchecked).is_ok());
        assert!(update_status_ownership(&EMPLOYER, Ownership::JobOwnedBy(Some(1))).is_ok());
        assert!(update_status_ownership(&EMPLOYER, Ownership::JobOwnedBy(Some(9))).is_err());
        assert!(update_status_ownership(&EMPLOYER, Ownership::JobOwnedBy(None)).is_err());
    }

    #[test]
    fn denials_map_to_status_codes() {
        use axum::http::StatusCode;
        assert_eq!(
            AppError::from(Denial::Unauthenticated).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(Denial::Forbidden("nope")).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
