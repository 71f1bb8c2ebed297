use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use job_board::{
    AppConfig, AppError, AppState, InMemorySessionStore, LocalDiskStorage, MockStorageService,
    Result, create_router,
    models::{Application, Job, JobUpdate, NewApplication, NewJob, NewUser, UserRecord},
    repository::{Repository, RepositoryState},
    session::SessionState,
    storage::StorageState,
};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "resume-upload-boundary";
const SEEKER_ID: i32 = 2;
const JOB_ID: i32 = 1;

/// One job, one job seeker, and a record of every application insert.
#[derive(Default)]
struct StubRepository {
    inserted: Mutex<Vec<NewApplication>>,
    fail_inserts: bool,
}

#[async_trait]
impl Repository for StubRepository {
    async fn get_user(&self, id: i32) -> Result<Option<UserRecord>> {
        Ok((id == SEEKER_ID).then(|| UserRecord {
            id,
            username: "ada".to_string(),
            password: String::new(),
            email: "ada@example.com".to_string(),
            role: "JOB_SEEKER".to_string(),
            company_name: None,
        }))
    }
    async fn get_user_by_username(&self, _username: &str) -> Result<Option<UserRecord>> {
        Ok(None)
    }
    async fn create_user(&self, _user: NewUser) -> Result<UserRecord> {
        panic!("Stub called")
    }
    async fn create_job(&self, _job: NewJob) -> Result<Job> {
        panic!("Stub called")
    }
    async fn get_job(&self, id: i32) -> Result<Option<Job>> {
        Ok((id == JOB_ID).then(|| Job {
            id,
            employer_id: 1,
            ..Job::default()
        }))
    }
    async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        Ok(vec![])
    }
    async fn update_job(&self, _id: i32, _update: JobUpdate) -> Result<Option<Job>> {
        Ok(None)
    }
    async fn delete_job(&self, _id: i32) -> Result<bool> {
        Ok(false)
    }
    async fn create_application(&self, application: NewApplication) -> Result<Application> {
        if self.fail_inserts {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(application.clone());
        Ok(Application {
            id: inserted.len() as i32,
            job_id: application.job_id,
            user_id: application.user_id,
            status: "PENDING".to_string(),
            resume_url: application.resume_url,
            cover_letter: application.cover_letter,
            applied_at: Utc::now(),
        })
    }
    async fn get_application(&self, _id: i32) -> Result<Option<Application>> {
        Ok(None)
    }
    async fn get_user_applications(&self, _user_id: i32) -> Result<Vec<Application>> {
        Ok(vec![])
    }
    async fn get_job_applications(&self, _job_id: i32) -> Result<Vec<Application>> {
        Ok(vec![])
    }
    async fn update_application_status(
        &self,
        _id: i32,
        _status: &str,
    ) -> Result<Option<Application>> {
        Ok(None)
    }
}

fn app(repo: Arc<StubRepository>, storage: StorageState) -> axum::Router {
    let state = AppState {
        repo: repo as RepositoryState,
        sessions: Arc::new(InMemorySessionStore::default()) as SessionState,
        storage,
        config: AppConfig {
            dev_auth_bypass: true,
            ..AppConfig::default()
        },
    };
    create_router(state)
}

fn upload(file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(
        format!(
            "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"status\"\r\n\r\nACCEPTED\r\n--{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );

    Request::builder()
        .method("POST")
        .uri(format!("/api/jobs/{JOB_ID}/apply"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-user-id", SEEKER_ID.to_string())
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_resume_name_is_sanitized() {
    let repo = Arc::new(StubRepository::default());
    let app = app(repo.clone(), Arc::new(MockStorageService::new()));

    let response = app
        .oneshot(upload("../../etc/passwd.EXE", b"binary"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let application = read_json(response).await;
    let resume_url = application["resumeUrl"].as_str().unwrap();
    assert!(resume_url.starts_with("uploads/mock-"));
    assert!(resume_url.ends_with(".exe"));
    assert!(!resume_url.contains(".."));

    // A client-sent status part has no effect on the new row.
    assert_eq!(application["status"], "PENDING");
    let inserted = repo.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].job_id, JOB_ID);
    assert_eq!(inserted[0].user_id, SEEKER_ID);
}

#[tokio::test]
async fn test_empty_resume_counts_as_missing() {
    let repo = Arc::new(StubRepository::default());
    let app = app(repo.clone(), Arc::new(MockStorageService::new()));

    let response = app.oneshot(upload("empty.pdf", b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Resume is required");
    assert!(repo.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_a_server_error() {
    let repo = Arc::new(StubRepository::default());
    let app = app(repo.clone(), Arc::new(MockStorageService::new_failing()));

    let response = app.oneshot(upload("cv.pdf", b"%PDF")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["error"], "An unexpected error occurred");
    assert!(repo.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_database_failure_hides_details() {
    let repo = Arc::new(StubRepository {
        fail_inserts: true,
        ..StubRepository::default()
    });
    let storage = Arc::new(MockStorageService::new());
    let app = app(repo, storage.clone());

    let response = app.oneshot(upload("cv.pdf", b"%PDF")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert!(!body["error"].as_str().unwrap().contains("pool"));
    // The resume of the unrecorded application is gone again.
    assert!(storage.stored_locations().is_empty());
}

#[tokio::test]
async fn test_rejected_upload_stores_nothing() {
    let repo = Arc::new(StubRepository::default());
    let storage = Arc::new(MockStorageService::new());
    let app = app(repo.clone(), storage.clone());

    let response = app.oneshot(upload("empty.pdf", b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(storage.stored_locations().is_empty());
}

#[tokio::test]
async fn test_local_disk_resume_removed_when_insert_fails() {
    let root = std::env::temp_dir().join(format!("job-board-uploads-{}", Uuid::new_v4()));
    let repo = Arc::new(StubRepository {
        fail_inserts: true,
        ..StubRepository::default()
    });
    let app = app(repo, Arc::new(LocalDiskStorage::new(&root)));

    let response = app.oneshot(upload("cv.pdf", b"%PDF-1.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let mut entries = tokio::fs::read_dir(&root).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
    tokio::fs::remove_dir_all(&root).await.unwrap();
}

#[tokio::test]
async fn test_local_disk_storage_through_the_router() {
    let root = std::env::temp_dir().join(format!("job-board-uploads-{}", Uuid::new_v4()));
    let repo = Arc::new(StubRepository::default());
    let app = app(repo, Arc::new(LocalDiskStorage::new(&root)));

    let response = app.oneshot(upload("cv.pdf", b"%PDF-1.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let application = read_json(response).await;
    let stored = application["resumeUrl"].as_str().unwrap();
    assert!(stored.starts_with(root.to_str().unwrap()));
    assert_eq!(tokio::fs::read(stored).await.unwrap(), b"%PDF-1.7");

    tokio::fs::remove_dir_all(&root).await.unwrap();
}
