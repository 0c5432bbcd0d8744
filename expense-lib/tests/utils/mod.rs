use std::ops::Deref;

use actix_web::http::header::CONTENT_TYPE;
use actix_web::test::TestRequest;
use expense_repo::Repos;
use rstest::*;
use tempfile::TempDir;
use tracing::info;
use tracing::Level;

macro_rules! build_app {
    ($repos:expr) => {{
        let app = App::new()
            .wrap(expense_lib::tracing::create_middleware())
            .configure(expense_lib::app_config_func(
                $repos,
                expense_lib::form::UploadLimit::default(),
            ));
        tracing::info!("Built app");
        app
    }};
}

macro_rules! create_tag {
    (&$service:ident, $name:expr) => {{
        let request = TestRequest::post()
            .uri("/api/tags")
            .set_json(serde_json::json!({ "name": $name, "color": "#336699" }))
            .to_request();
        let response = test::call_service(&$service, request).await;
        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "Got {} response when creating tag",
            response.status()
        );
        let tag: expense_repo::tag_repo::Tag = test::read_body_json(response).await;
        tag
    }};
}

pub struct TestRepos {
    repos: Repos,
    pub dir: TempDir,
}

impl Deref for TestRepos {
    type Target = Repos;

    fn deref(&self) -> &Self::Target {
        &self.repos
    }
}

impl TestRepos {
    pub fn repos(&self) -> Repos {
        self.repos.clone()
    }
}

#[fixture]
#[once]
pub fn tracing_setup() -> () {
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(Level::DEBUG)
        .init();
    info!("tracing initialized");
}

pub async fn build_repos() -> TestRepos {
    let dir = tempfile::tempdir().unwrap();
    let repos = expense_repo::sqlx_repo::create_repos(
        &dir.path().join("expenses.db"),
        1,
        &dir.path().join("storage"),
    )
    .await
    .unwrap();
    TestRepos { repos, dir }
}

/// Builds a `multipart/form-data` body by hand.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> MultipartBody {
        MultipartBody {
            boundary: "expense-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> MultipartBody {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> MultipartBody {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Attaches the finished body to `request`.
    pub fn attach(mut self, request: TestRequest) -> TestRequest {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        request
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            ))
            .set_payload(self.body)
    }
}
