use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, Result},
    models::{
        Application, ApplicationStatus, ApplyForm, CreateJobRequest, Job, LoginRequest,
        NewApplication, NewUser, RegisterUserRequest, UpdateStatusRequest, User,
    },
    policy::{self, ApplicationScope, Ownership},
    session,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::CookieJar;
use validator::Validate;

// --- Jobs ---

/// list_jobs
///
/// [Public Route] Every job row, unfiltered and unpaginated.
#[utoipa::path(
    get,
    path = "/api/jobs",
    responses((status = 200, description = "All jobs", body = [Job]))
)]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>> {
    Ok(Json(state.repo.get_all_jobs().await?))
}

/// create_job
///
/// [Role-Gated Route] Employers post a job. The owning employer is always the
/// caller; an `employerId` in the body has no effect.
///
/// *Order*: the role check runs before the body is looked at, so anonymous and
/// wrong-role callers get 403 even with a malformed body.
#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Created", body = Job),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not an employer")
    )
)]
pub async fn create_job(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Job>)> {
    let employer_id = policy::post_job(caller.as_ref())?;

    let Json(payload) = payload?;
    payload.validate()?;

    let job = state
        .repo
        .create_job(payload.into_new_job(employer_id))
        .await?;
    tracing::info!(job_id = job.id, employer_id, "job posted");

    Ok((StatusCode::CREATED, Json(job)))
}

/// get_job
///
/// [Public Route] A single job by id.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = i32, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Found", body = Job),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Job>> {
    state
        .repo
        .get_job(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
}

// --- Applications ---

/// apply_to_job
///
/// [Role-Gated Route] A job seeker applies with a resume file and an optional
/// cover letter (multipart parts `resume` and `coverLetter`).
///
/// Checks run in this order: role (403), job exists (404), resume present (400),
/// schema (400). The job and applicant ids always come from the path and the
/// session; any such parts in the form are ignored, as is any `status`.
#[utoipa::path(
    post,
    path = "/api/jobs/{id}/apply",
    params(("id" = i32, Path, description = "Job ID")),
    request_body(content = ApplyForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Resume missing or validation failed"),
        (status = 403, description = "Not a job seeker"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn apply_to_job(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Path(job_id): Path<i32>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Application>)> {
    let user_id = policy::apply_to_job(caller.as_ref())?;

    if state.repo.get_job(job_id).await?.is_none() {
        return Err(AppError::NotFound("Job not found".to_string()));
    }

    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut resume = None;
    let mut cover_letter = None;

    // Read the whole form before touching storage, so a broken or oversized body
    // leaves no file behind.
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "resume" if resume.is_none() => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                // An empty part is the same as no file at all.
                if !data.is_empty() {
                    resume = Some((file_name, data));
                }
            }
            "coverLetter" => {
                let text = field.text().await?;
                cover_letter = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    let Some((file_name, data)) = resume else {
        return Err(AppError::BadRequest("Resume is required".to_string()));
    };
    let resume_url = state.storage.store(file_name.as_deref(), &data).await?;

    let new_application = NewApplication {
        job_id,
        user_id,
        resume_url: resume_url.clone(),
        cover_letter,
    };
    let created = match new_application.validate() {
        Ok(()) => state.repo.create_application(new_application).await,
        Err(errors) => Err(AppError::from(errors)),
    };
    let application = match created {
        Ok(application) => application,
        Err(e) => {
            // The application was never recorded, so its resume has no owner.
            if let Err(remove_err) = state.storage.remove(&resume_url).await {
                tracing::warn!(
                    resume_url = %resume_url,
                    "failed to remove orphaned resume: {}",
                    remove_err
                );
            }
            return Err(e);
        }
    };
    tracing::info!(
        application_id = application.id,
        job_id,
        user_id,
        "application submitted"
    );

    Ok((StatusCode::CREATED, Json(application)))
}

/// list_applications
///
/// [Authenticated Route] Role-dependent view.
/// - Job seekers: their own applications.
/// - Employers: applications to every job they own, gathered job by job (all jobs
///   fetched, filtered to the caller's, then each job's applications appended in
///   job order).
/// - Any other role: 403.
#[utoipa::path(
    get,
    path = "/api/applications",
    responses(
        (status = 200, description = "Applications visible to the caller", body = [Application]),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Role cannot list applications")
    )
)]
pub async fn list_applications(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>> {
    let applications = match policy::list_applications(Some(&caller))? {
        ApplicationScope::SubmittedBy(user_id) => {
            state.repo.get_user_applications(user_id).await?
        }
        ApplicationScope::PostedBy(employer_id) => {
            let mut applications = Vec::new();
            let jobs = state.repo.get_all_jobs().await?;
            for job in jobs.iter().filter(|job| job.employer_id == employer_id) {
                applications.extend(state.repo.get_job_applications(job.id).await?);
            }
            applications
        }
    };

    Ok(Json(applications))
}

/// update_application_status
///
/// [Role-Gated Route] Employers overwrite an application's status. Any non-empty
/// string is stored verbatim and any state may follow any other.
///
/// *Ownership*: by default the employer is not required to own the application's
/// job. With `enforce_application_ownership` set, the policy receives the job's
/// owner and refuses other employers with 403.
#[utoipa::path(
    patch,
    path = "/api/applications/{id}/status",
    params(("id" = i32, Path, description = "Application ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Application),
        (status = 400, description = "Status is required"),
        (status = 403, description = "Not an employer"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn update_application_status(
    caller: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: std::result::Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Application>> {
    let employer = policy::update_status_role(caller.as_ref())?;

    let Json(payload) = payload?;
    let Some(status) = payload.status.filter(|s| !s.is_empty()) else {
        return Err(AppError::BadRequest("Status is required".to_string()));
    };

    let ownership = if state.config.enforce_application_ownership {
        let application = state
            .repo
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        let owner = state
            .repo
            .get_job(application.job_id)
            .await?
            .map(|job| job.employer_id);
        Ownership::JobOwnedBy(owner)
    } else {
        Ownership::Unchecked
    };
    policy::update_status_ownership(&employer, ownership)?;

    if ApplicationStatus::recognize(&status).is_none() {
        tracing::warn!(application_id = id, status = %status, "storing unrecognized application status");
    }

    let application = state
        .repo
        .update_application_status(id, &status)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    tracing::info!(application_id = id, employer_id = employer.id, status = %application.status, "application status updated");

    Ok(Json(application))
}

// --- Accounts & Sessions ---

/// register_user
///
/// [Public Route] Creates an account and logs it in. The password is stored only as
/// an Argon2 hash; the response never includes it.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered and logged in", body = User),
        (status = 400, description = "Validation failed or username taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<User>)> {
    let Json(payload) = payload?;
    payload.validate()?;

    if state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }

    let password = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            password,
            email: payload.email,
            role: payload.role.unwrap_or_default(),
            company_name: payload.company_name,
        })
        .await?;
    tracing::info!(user_id = user.id, role = %user.role, "user registered");

    let session = state.sessions.create(user.id).await?;
    let jar = jar.add(session::session_cookie(session.sid, state.config.cookie_secure));

    Ok((StatusCode::CREATED, jar, Json(user.public())))
}

/// login
///
/// [Public Route] Verifies a username/password pair and attaches the user to a new
/// session. Unknown usernames and wrong passwords are indistinguishable (401).
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = User),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<User>)> {
    let Json(payload) = payload?;

    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .filter(|user| auth::verify_password(&payload.password, &user.password))
        .ok_or_else(|| {
            tracing::warn!(username = %payload.username, "failed login attempt");
            AppError::InvalidCredentials
        })?;

    let session = state.sessions.create(user.id).await?;
    let jar = jar.add(session::session_cookie(session.sid, state.config.cookie_secure));

    Ok((jar, Json(user.public())))
}

/// logout
///
/// [Public Route] Ends the current session, if any, and clears the cookie.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(sid) = auth::session_id(&headers) {
        state.sessions.destroy(&sid).await?;
    }
    Ok((jar.remove(session::removal_cookie()), StatusCode::OK))
}

/// current_user
///
/// [Authenticated Route] The logged-in user's profile.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn current_user(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>> {
    state
        .repo
        .get_user(id)
        .await?
        .map(|user| Json(user.public()))
        .ok_or(AppError::AuthenticationRequired)
}
