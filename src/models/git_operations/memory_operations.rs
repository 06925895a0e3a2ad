//! In-memory [`GitHost`] used by tests.
//!
//! Branches are plain path → blob maps, pull request file listings are the
//! diff between a branch and `main`, and every write is checked against the
//! current blob SHA the way the real host does it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};

use super::{GitError, GitHost};
use crate::models::{FileRevision, MergeOutcome, PrFile, PullRequest, PullRequestHead, PullRequestUser};

const MAIN: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone)]
struct Blob {
    bytes: Vec<u8>,
    sha: String,
}

#[derive(Debug, Clone)]
struct MemoryPullRequest {
    number: u64,
    title: String,
    branch: String,
    state: PullRequestState,
    merge_block: Option<String>,
}

#[derive(Default)]
struct Repository {
    branches: HashMap<String, BTreeMap<String, Blob>>,
    pulls: Vec<MemoryPullRequest>,
    failing_file_listings: Vec<u64>,
}

#[derive(Default)]
pub struct MemoryGitHost {
    repo: Mutex<Repository>,
    next_sha: AtomicU64,
    calls: AtomicU64,
    writes: AtomicU64,
}

impl MemoryGitHost {
    pub fn new() -> Self {
        let host = Self::default();
        host.lock().branches.insert(MAIN.to_string(), BTreeMap::new());
        host
    }

    fn lock(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn blob(&self, bytes: Vec<u8>) -> Blob {
        let n = self.next_sha.fetch_add(1, Ordering::SeqCst) + 1;
        Blob { bytes, sha: format!("{:040x}", n) }
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record_write(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Opens a pull request on `branch` (forked from `main`) with the given files.
    pub fn open_pull_request(&self, number: u64, title: &str, branch: &str, files: &[(&str, &[u8])]) {
        let blobs: Vec<(String, Blob)> = files
            .iter()
            .map(|(path, bytes)| (path.to_string(), self.blob(bytes.to_vec())))
            .collect();
        let mut repo = self.lock();
        let mut tree = repo.branches.get(MAIN).cloned().unwrap_or_default();
        tree.extend(blobs);
        repo.branches.insert(branch.to_string(), tree);
        repo.pulls.push(MemoryPullRequest {
            number,
            title: title.to_string(),
            branch: branch.to_string(),
            state: PullRequestState::Open,
            merge_block: None,
        });
    }

    /// Opens a draft pull request for `slug` on branch `draft/<slug>` and returns the branch.
    pub fn seed_draft(&self, number: u64, slug: &str, content: &str) -> String {
        let branch = format!("draft/{}", slug);
        let path = format!("content/insights/{}.mdx", slug);
        self.open_pull_request(number, &format!("Draft: {}", slug), &branch, &[(path.as_str(), content.as_bytes())]);
        branch
    }

    /// Writes a file straight to a branch, as another editor would.
    pub fn put_file(&self, branch: &str, path: &str, bytes: &[u8]) -> String {
        let blob = self.blob(bytes.to_vec());
        let sha = blob.sha.clone();
        self.lock()
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), blob);
        sha
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|tree| tree.get(path))
            .map(|blob| blob.bytes.clone())
    }

    pub fn file_text(&self, branch: &str, path: &str) -> Option<String> {
        self.file(branch, path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn main_file_text(&self, path: &str) -> Option<String> {
        self.file_text(MAIN, path)
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        self.lock().branches.contains_key(branch)
    }

    pub fn pull_request_state(&self, number: u64) -> Option<PullRequestState> {
        self.lock().pulls.iter().find(|pr| pr.number == number).map(|pr| pr.state)
    }

    /// Makes the next merges of `number` fail with `message` until cleared.
    pub fn block_merge(&self, number: u64, message: &str) {
        if let Some(pr) = self.lock().pulls.iter_mut().find(|pr| pr.number == number) {
            pr.merge_block = Some(message.to_string());
        }
    }

    pub fn unblock_merge(&self, number: u64) {
        if let Some(pr) = self.lock().pulls.iter_mut().find(|pr| pr.number == number) {
            pr.merge_block = None;
        }
    }

    /// Makes the changed-file listing of `number` fail.
    pub fn fail_file_listing(&self, number: u64) {
        self.lock().failing_file_listings.push(number);
    }

    /// Total number of host calls made so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that attempted to change the repository.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn open_pull(repo: &Repository, number: u64) -> Result<MemoryPullRequest, GitError> {
        repo.pulls
            .iter()
            .find(|pr| pr.number == number && pr.state == PullRequestState::Open)
            .cloned()
            .ok_or_else(|| GitError::NotFound(format!("open pull request #{}", number)))
    }
}

#[async_trait]
impl GitHost for MemoryGitHost {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, GitError> {
        self.record_call();
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
        Ok(self
            .lock()
            .pulls
            .iter()
            .filter(|pr| pr.state == PullRequestState::Open)
            .map(|pr| PullRequest {
                number: pr.number,
                title: pr.title.clone(),
                head: PullRequestHead { branch: pr.branch.clone() },
                created_at: created,
                updated_at: created,
                html_url: format!("https://git.example.com/pull/{}", pr.number),
                user: Some(PullRequestUser { login: "editor".to_string() }),
            })
            .collect())
    }

    async fn pull_request_files(&self, pr_number: u64) -> Result<Vec<PrFile>, GitError> {
        self.record_call();
        let repo = self.lock();
        if repo.failing_file_listings.contains(&pr_number) {
            return Err(GitError::Api { status: 500, message: "file listing unavailable".to_string() });
        }
        let pr = repo
            .pulls
            .iter()
            .find(|pr| pr.number == pr_number)
            .ok_or_else(|| GitError::NotFound(format!("pull request #{}", pr_number)))?;
        let empty = BTreeMap::new();
        let base = repo.branches.get(MAIN).unwrap_or(&empty);
        let head = repo.branches.get(&pr.branch).unwrap_or(&empty);

        let mut files: Vec<PrFile> = head
            .iter()
            .filter_map(|(path, blob)| match base.get(path) {
                None => Some(("added", path, blob)),
                Some(old) if old.sha != blob.sha => Some(("modified", path, blob)),
                Some(_) => None,
            })
            .map(|(status, path, blob)| PrFile {
                filename: path.clone(),
                sha: Some(blob.sha.clone()),
                status: Some(status.to_string()),
            })
            .collect();
        files.extend(base.keys().filter(|path| !head.contains_key(*path)).map(|path| PrFile {
            filename: path.clone(),
            sha: None,
            status: Some("removed".to_string()),
        }));
        Ok(files)
    }

    async fn get_file(&self, branch: &str, path: &str) -> Result<FileRevision, GitError> {
        self.record_call();
        let repo = self.lock();
        let blob = repo
            .branches
            .get(branch)
            .and_then(|tree| tree.get(path))
            .ok_or_else(|| GitError::NotFound(format!("could not fetch {} from {}", path, branch)))?;
        let content = String::from_utf8(blob.bytes.clone())
            .map_err(|e| GitError::Decode(format!("file content is not UTF-8: {}", e)))?;
        Ok(FileRevision { content, sha: blob.sha.clone() })
    }

    async fn get_file_sha(&self, branch: &str, path: &str) -> Result<String, GitError> {
        self.record_call();
        self.lock()
            .branches
            .get(branch)
            .and_then(|tree| tree.get(path))
            .map(|blob| blob.sha.clone())
            .ok_or_else(|| GitError::NotFound(format!("could not fetch {} from {}", path, branch)))
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        sha: &str,
        _message: &str,
    ) -> Result<String, GitError> {
        self.record_write();
        let blob = self.blob(content.as_bytes().to_vec());
        let mut repo = self.lock();
        let tree = repo
            .branches
            .get_mut(branch)
            .ok_or_else(|| GitError::NotFound(format!("branch {}", branch)))?;
        let current = tree
            .get(path)
            .ok_or_else(|| GitError::NotFound(format!("{} on {}", path, branch)))?;
        if current.sha != sha {
            return Err(GitError::Conflict(format!("{} is at {} but expected {}", path, current.sha, sha)));
        }
        let new_sha = blob.sha.clone();
        tree.insert(path.to_string(), blob);
        Ok(new_sha)
    }

    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        base64_content: &str,
        existing_sha: Option<&str>,
        _message: &str,
    ) -> Result<String, GitError> {
        self.record_write();
        let bytes = STANDARD
            .decode(base64_content.as_bytes())
            .map_err(|e| GitError::Api { status: 422, message: format!("content is not valid base64: {}", e) })?;
        let blob = self.blob(bytes);
        let mut repo = self.lock();
        let tree = repo
            .branches
            .get_mut(branch)
            .ok_or_else(|| GitError::NotFound(format!("branch {}", branch)))?;
        match (tree.get(path), existing_sha) {
            (Some(_), None) => {
                return Err(GitError::Api { status: 422, message: "Invalid request. \"sha\" wasn't supplied.".to_string() })
            }
            (Some(current), Some(sha)) if current.sha != sha => {
                return Err(GitError::Conflict(format!("{} is at {} but expected {}", path, current.sha, sha)))
            }
            _ => {}
        }
        let new_sha = blob.sha.clone();
        tree.insert(path.to_string(), blob);
        Ok(new_sha)
    }

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        sha: &str,
        _message: &str,
    ) -> Result<(), GitError> {
        self.record_write();
        let mut repo = self.lock();
        let tree = repo
            .branches
            .get_mut(branch)
            .ok_or_else(|| GitError::NotFound(format!("branch {}", branch)))?;
        match tree.get(path) {
            None => Err(GitError::NotFound(format!("{} on {}", path, branch))),
            Some(current) if current.sha != sha => {
                Err(GitError::Conflict(format!("{} is at {} but expected {}", path, current.sha, sha)))
            }
            Some(_) => {
                tree.remove(path);
                Ok(())
            }
        }
    }

    async fn merge_pull_request(
        &self,
        pr_number: u64,
        _commit_title: &str,
    ) -> Result<MergeOutcome, GitError> {
        self.record_write();
        let mut repo = self.lock();
        let pr = Self::open_pull(&repo, pr_number)?;
        if let Some(reason) = pr.merge_block {
            return Err(GitError::MergeBlocked(reason));
        }
        let head = repo.branches.get(&pr.branch).cloned().unwrap_or_default();
        repo.branches.insert(MAIN.to_string(), head);
        if let Some(stored) = repo.pulls.iter_mut().find(|p| p.number == pr_number) {
            stored.state = PullRequestState::Merged;
        }
        Ok(MergeOutcome { merged: true, message: "Pull Request successfully merged".to_string() })
    }

    async fn delete_draft(&self, pr_number: u64, branch: &str) -> Result<(), GitError> {
        self.record_write();
        let mut repo = self.lock();
        Self::open_pull(&repo, pr_number)?;
        if let Some(stored) = repo.pulls.iter_mut().find(|p| p.number == pr_number) {
            stored.state = PullRequestState::Closed;
        }
        repo.branches
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| GitError::NotFound(format!("branch {}", branch)))
    }

    fn raw_file_url(&self, branch: &str, path: &str) -> String {
        format!("https://raw.example.com/acme/site/{}/{}", branch, path)
    }
}
