use crate::{
    error::{AppError, Result},
    models::{Application, ApplicationStatus, Job, JobUpdate, NewApplication, NewJob, NewUser, UserRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, Mutex, MutexGuard};

/// Repository Trait
///
/// Record-level persistence contract for users, jobs and applications. Every
/// operation is a single-row statement; nothing spans more than one entity write.
///
/// Fetch-by-id methods return `Ok(None)` for a missing row. Translating absence into
/// a 404 is the caller's job. `Err` is reserved for infrastructure failures.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    // --- Jobs ---
    async fn create_job(&self, job: NewJob) -> Result<Job>;
    async fn get_job(&self, id: i32) -> Result<Option<Job>>;
    // Unfiltered and unpaginated.
    async fn get_all_jobs(&self) -> Result<Vec<Job>>;
    async fn update_job(&self, id: i32, update: JobUpdate) -> Result<Option<Job>>;
    // Does not touch the job's applications.
    async fn delete_job(&self, id: i32) -> Result<bool>;

    // --- Applications ---
    // New rows always start as PENDING.
    async fn create_application(&self, application: NewApplication) -> Result<Application>;
    async fn get_application(&self, id: i32) -> Result<Option<Application>>;
    async fn get_user_applications(&self, user_id: i32) -> Result<Vec<Application>>;
    async fn get_job_applications(&self, job_id: i32) -> Result<Vec<Application>>;
    // Direct overwrite, last write wins.
    async fn update_application_status(&self, id: i32, status: &str) -> Result<Option<Application>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const JOB_COLUMNS: &str =
    "id, title, description, company, location, salary, employer_id, created_at";
const APPLICATION_COLUMNS: &str =
    "id, job_id, user_id, status, resume_url, cover_letter, applied_at";
const USER_COLUMNS: &str = "id, username, password, email, role, company_name";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations (users, jobs, applications).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_user error: {:?}", e))?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_user_by_username error: {:?}", e))?;
        Ok(user)
    }

    /// create_user
    ///
    /// Inserts a user. A duplicate username (a unique violation, only reachable when two
    /// registrations race past the handler's lookup) is a `BadRequest`, as in memory.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let created = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (username, password, email, role, company_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.company_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                tracing::warn!(username = %user.username, "username already taken");
                AppError::BadRequest("Username already exists".to_string())
            } else {
                tracing::error!("create_user error: {:?}", e);
                AppError::Database(e)
            }
        })?;
        Ok(created)
    }

    async fn create_job(&self, job: NewJob) -> Result<Job> {
        let created = sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (title, description, company, location, salary, employer_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.salary)
        .bind(job.employer_id)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("create_job error: {:?}", e))?;
        Ok(created)
    }

    async fn get_job(&self, id: i32) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_job error: {:?}", e))?;
        Ok(job)
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_all_jobs error: {:?}", e))?;
        Ok(jobs)
    }

    /// update_job
    ///
    /// Uses `COALESCE` so that only the fields present in `update` are written.
    async fn update_job(&self, id: i32, update: JobUpdate) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                company = COALESCE($4, company),
                location = COALESCE($5, location),
                salary = COALESCE($6, salary)
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.description)
        .bind(update.company)
        .bind(update.location)
        .bind(update.salary)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("update_job error: {:?}", e))?;
        Ok(job)
    }

    async fn delete_job(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("delete_job error: {:?}", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application> {
        let created = sqlx::query_as::<_, Application>(&format!(
            "INSERT INTO applications (job_id, user_id, status, resume_url, cover_letter) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(application.job_id)
        .bind(application.user_id)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(&application.resume_url)
        .bind(&application.cover_letter)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("create_application error: {:?}", e))?;
        Ok(created)
    }

    async fn get_application(&self, id: i32) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_application error: {:?}", e))?;
        Ok(application)
    }

    async fn get_user_applications(&self, user_id: i32) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_user_applications error: {:?}", e))?;
        Ok(applications)
    }

    async fn get_job_applications(&self, job_id: i32) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = $1 ORDER BY id"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_job_applications error: {:?}", e))?;
        Ok(applications)
    }

    async fn update_application_status(&self, id: i32, status: &str) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications SET status = $2 WHERE id = $1 RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("update_application_status error: {:?}", e))?;
        Ok(application)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    jobs: Vec<Job>,
    applications: Vec<Application>,
    next_user_id: i32,
    next_job_id: i32,
    next_application_id: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory, mirroring the Postgres semantics
/// (serial ids from 1, server-side timestamps, PENDING default, no cascades). Used by
/// the router and handler tests, and handy for poking at the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half-written row behind.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::BadRequest(
                "Username already exists".to_string(),
            ));
        }
        let record = UserRecord {
            id: next_id(&mut tables.next_user_id),
            username: user.username,
            password: user.password,
            email: user.email,
            role: user.role.as_str().to_string(),
            company_name: user.company_name,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn create_job(&self, job: NewJob) -> Result<Job> {
        let mut tables = self.lock();
        let created = Job {
            id: next_id(&mut tables.next_job_id),
            title: job.title,
            description: job.description,
            company: job.company,
            location: job.location,
            salary: job.salary,
            employer_id: job.employer_id,
            created_at: Utc::now(),
        };
        tables.jobs.push(created.clone());
        Ok(created)
    }

    async fn get_job(&self, id: i32) -> Result<Option<Job>> {
        Ok(self.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.lock().jobs.clone())
    }

    async fn update_job(&self, id: i32, update: JobUpdate) -> Result<Option<Job>> {
        let mut tables = self.lock();
        let Some(job) = tables.jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            job.title = title;
        }
        if let Some(description) = update.description {
            job.description = description;
        }
        if let Some(company) = update.company {
            job.company = company;
        }
        if let Some(location) = update.location {
            job.location = location;
        }
        if update.salary.is_some() {
            job.salary = update.salary;
        }
        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, id: i32) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.jobs.len();
        tables.jobs.retain(|j| j.id != id);
        Ok(tables.jobs.len() < before)
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application> {
        let mut tables = self.lock();
        let created = Application {
            id: next_id(&mut tables.next_application_id),
            job_id: application.job_id,
            user_id: application.user_id,
            status: ApplicationStatus::Pending.as_str().to_string(),
            resume_url: application.resume_url,
            cover_letter: application.cover_letter,
            applied_at: Utc::now(),
        };
        tables.applications.push(created.clone());
        Ok(created)
    }

    async fn get_application(&self, id: i32) -> Result<Option<Application>> {
        Ok(self
            .lock()
            .applications
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn get_user_applications(&self, user_id: i32) -> Result<Vec<Application>> {
        Ok(self
            .lock()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_job_applications(&self, job_id: i32) -> Result<Vec<Application>> {
        Ok(self
            .lock()
            .applications
            .iter()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn update_application_status(&self, id: i32, status: &str) -> Result<Option<Application>> {
        let mut tables = self.lock();
        Ok(tables
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .map(|application| {
                application.status = status.to_string();
                application.clone()
            }))
    }
}
