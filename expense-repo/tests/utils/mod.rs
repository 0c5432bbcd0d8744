pub mod generator;

use expense_repo::file_store::Upload;
use expense_repo::tag_repo::NewTag;
use expense_repo::Repos;
use std::collections::HashSet;
use std::ops::Deref;
use tempfile::TempDir;

/// Repositories backed by a throwaway database and storage directory. Both
/// are removed when this is dropped.
pub struct TestRepos {
    repos: Repos,
    pub dir: TempDir,
}

impl Deref for TestRepos {
    type Target = Repos;

    fn deref(&self) -> &Repos {
        &self.repos
    }
}

impl TestRepos {
    pub async fn create_tags(&self, names: &[&str]) -> Vec<String> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let tag = self
                .tag_repo
                .create_tag(NewTag::new(*name, "#336699"))
                .await
                .unwrap();
            ids.push(tag.id);
        }
        ids
    }
}

pub async fn build_repos() -> TestRepos {
    build_repos_with_pool(1).await
}

#[allow(dead_code)]
pub async fn build_repos_with_pool(max_pool_size: u32) -> TestRepos {
    let dir = tempfile::tempdir().unwrap();
    let repos = expense_repo::sqlx_repo::create_repos(
        &dir.path().join("expenses.db"),
        max_pool_size,
        &dir.path().join("storage"),
    )
    .await
    .unwrap();
    TestRepos { repos, dir }
}

#[allow(dead_code)]
pub fn tag_set(ids: &[&String]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[allow(dead_code)]
pub fn upload(name: &str, content: &[u8]) -> Upload {
    Upload::new(name, content.to_vec())
}
