use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

// --- Roles & Statuses ---

/// Role
///
/// The RBAC field carried by every user. Stored as its SCREAMING_SNAKE_CASE string
/// in `users.role`; role never changes after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    Employer,
    #[default]
    JobSeeker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Employer => "EMPLOYER",
            Role::JobSeeker => "JOB_SEEKER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "EMPLOYER" => Ok(Role::Employer),
            "JOB_SEEKER" => Ok(Role::JobSeeker),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// ApplicationStatus
///
/// The three recognized triage states. `applications.status` is a free TEXT column
/// and the update endpoint writes whatever string it receives, so this enum names
/// the known values rather than constraining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    /// Returns the matching state, or `None` for a value outside the three known ones.
    pub fn recognize(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ApplicationStatus::Pending),
            "ACCEPTED" => Some(ApplicationStatus::Accepted),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// UserRecord
///
/// Raw `users` row, including the Argon2 password hash. Never serialized;
/// convert with [`UserRecord::public`] before returning it to a client.
#[derive(Debug, Clone, FromRow, Default)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: String,
    pub company_name: Option<String>,
}

impl UserRecord {
    /// Parsed role. `None` only if the row holds a value outside the known roles.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            company_name: self.company_name.clone(),
        }
    }
}

/// User
///
/// Client-facing identity: everything in the `users` row except the credential.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[schema(example = "EMPLOYER")]
    pub role: String,
    // Only meaningful for EMPLOYER accounts.
    pub company_name: Option<String>,
}

/// NewUser
///
/// Insert payload for `users`. `password` must already be hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
    pub company_name: Option<String>,
}

/// Job
///
/// A posting from the `jobs` table. `company` is free text, not a reference to any
/// company entity, and `employer_id` is always the id of the user who created it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Job {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub employer_id: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewJob
///
/// Insert payload for `jobs`; id and `created_at` are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub employer_id: i32,
}

/// JobUpdate
///
/// Partial update for a job. `None` fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
}

/// Application
///
/// A job seeker's submission against one job, from the `applications` table.
/// `status` holds the raw stored string; see [`ApplicationStatus`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Application {
    pub id: i32,
    pub job_id: i32,
    pub user_id: i32,
    #[schema(example = "PENDING")]
    pub status: String,
    // Location of the stored resume file.
    pub resume_url: String,
    pub cover_letter: Option<String>,
    #[ts(type = "string")]
    pub applied_at: DateTime<Utc>,
}

/// NewApplication
///
/// Insert payload for `applications`, assembled server-side from the multipart
/// form and the caller's identity. Status is not part of it: new rows are PENDING.
#[derive(Debug, Clone, Default, Validate, PartialEq)]
pub struct NewApplication {
    #[validate(range(min = 1))]
    pub job_id: i32,
    #[validate(range(min = 1))]
    pub user_id: i32,
    #[validate(length(min = 1, message = "resume location is required"))]
    pub resume_url: String,
    pub cover_letter: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateJobRequest
///
/// Body of `POST /api/jobs`. Missing fields deserialize as empty strings so that they
/// surface as field-level validation errors. An `employerId` in the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateJobRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "company is required"))]
    pub company: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    #[serde(default)]
    pub salary: Option<String>,
}

impl CreateJobRequest {
    /// Builds the insert payload, binding ownership to `employer_id`.
    pub fn into_new_job(self, employer_id: i32) -> NewJob {
        NewJob {
            title: self.title,
            description: self.description,
            company: self.company,
            location: self.location,
            salary: self.salary,
            employer_id,
        }
    }
}

/// UpdateStatusRequest
///
/// Body of `PATCH /api/applications/{id}/status`. Any non-empty string is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateStatusRequest {
    #[schema(example = "ACCEPTED")]
    pub status: Option<String>,
}

/// ApplyForm
///
/// Documents the multipart body of `POST /api/jobs/{id}/apply`. The handler reads
/// the parts directly; this type only feeds the OpenAPI schema.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyForm {
    #[schema(value_type = String, format = Binary)]
    pub resume: Vec<u8>,
    pub cover_letter: Option<String>,
}

/// RegisterUserRequest
///
/// Body of `POST /api/register`. The password is hashed before it reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterUserRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
