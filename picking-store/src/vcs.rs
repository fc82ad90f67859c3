//! Version control adapter — the narrow git interface the backup service uses.
//!
//! [`VersionControl`] is the seam; [`GitRepository`] is the git2-backed
//! implementation. A fresh `git2::Repository` handle is opened per operation,
//! so the adapter is `Send + Sync` and read paths never wait on writers.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use git2::{Commit, Cred, ErrorCode, PushOptions, RemoteCallbacks, Repository, Signature};

use picking_core::CommitId;

use crate::error::VcsError;

/// Credential callback attempts before a push is declared unauthenticated.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// What [`VersionControl::stage_and_commit_if_changed`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created.
    Created(CommitId),
    /// The staged content already matched HEAD; HEAD is returned.
    Unchanged(CommitId),
}

impl CommitOutcome {
    pub fn id(&self) -> &CommitId {
        match self {
            CommitOutcome::Created(id) | CommitOutcome::Unchanged(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CommitOutcome::Created(_))
    }
}

/// Operations the backup service needs from version control.
pub trait VersionControl: Send + Sync {
    /// Root of the work tree.
    fn workdir(&self) -> &Path;

    /// Current HEAD commit, `None` when the branch is unborn.
    fn head_identifier(&self) -> Result<Option<CommitId>, VcsError>;

    /// Stage `path`; commit only if its content differs from HEAD.
    fn stage_and_commit_if_changed(
        &self,
        path: &Path,
        message: &str,
    ) -> Result<CommitOutcome, VcsError>;

    /// Publish `branch` to the configured remote, giving up after `timeout`.
    fn push(&self, branch: &str, timeout: Duration) -> Result<(), VcsError>;

    fn committed_contents(&self, path: &Path) -> Result<Option<Vec<u8>>, VcsError>;
}

/// Remote and fallback identity for [`GitRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub remote: String,
    /// Used when the repository has no `user.name` configured.
    pub author_name: String,
    /// Used when the repository has no `user.email` configured.
    pub author_email: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            author_name: "picking-backup".to_string(),
            author_email: "picking-backup@localhost".to_string(),
        }
    }
}

/// git2-backed [`VersionControl`].
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
    workdir: PathBuf,
    settings: GitSettings,
}

impl GitRepository {
    /// Open an existing, non-bare repository. Fails fast if `path` is not one.
    pub fn open(path: impl Into<PathBuf>, settings: GitSettings) -> Result<Self, VcsError> {
        let path = path.into();
        let repo = open_at(&path)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| VcsError::BareRepository { path: path.clone() })?
            .to_path_buf();
        Ok(Self {
            path,
            workdir,
            settings,
        })
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    /// Branch HEAD points at (works for an unborn branch too).
    pub fn current_branch(&self) -> Result<Option<String>, VcsError> {
        let repo = self.repo()?;
        let head = repo.find_reference("HEAD").map_err(VcsError::Read)?;
        Ok(head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(str::to_string))
    }

    fn repo(&self) -> Result<Repository, VcsError> {
        open_at(&self.path)
    }

    fn relative_path(&self, path: &Path) -> Result<PathBuf, VcsError> {
        if path.is_relative() {
            return Ok(path.to_path_buf());
        }
        if let Ok(rel) = path.strip_prefix(&self.workdir) {
            return Ok(rel.to_path_buf());
        }

        // Tolerate symlinked prefixes such as /tmp → /private/tmp.
        let outside = || VcsError::OutsideWorkdir {
            path: path.to_path_buf(),
            workdir: self.workdir.clone(),
        };
        let workdir = std::fs::canonicalize(&self.workdir).map_err(|_| outside())?;
        let canonical = std::fs::canonicalize(path).map_err(|_| outside())?;
        canonical
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .map_err(|_| outside())
    }

    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, VcsError> {
        repo.signature()
            .or_else(|_| Signature::now(&self.settings.author_name, &self.settings.author_email))
            .map_err(VcsError::Commit)
    }
}

impl VersionControl for GitRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn head_identifier(&self) -> Result<Option<CommitId>, VcsError> {
        let repo = self.repo()?;
        let head = head_commit(&repo)?;
        Ok(head.map(|commit| CommitId(commit.id().to_string())))
    }

    fn stage_and_commit_if_changed(
        &self,
        path: &Path,
        message: &str,
    ) -> Result<CommitOutcome, VcsError> {
        let repo = self.repo()?;
        let rel = self.relative_path(path)?;

        let mut index = repo.index().map_err(VcsError::Commit)?;
        index.add_path(&rel).map_err(VcsError::Commit)?;
        index.write().map_err(VcsError::Commit)?;
        let staged = index.get_path(&rel, 0).map(|entry| entry.id);

        let parent = head_commit(&repo)?;
        if let Some(parent) = &parent {
            let committed = parent
                .tree()
                .map_err(VcsError::Read)?
                .get_path(&rel)
                .ok()
                .map(|entry| entry.id());
            if committed.is_some() && committed == staged {
                let id = CommitId(parent.id().to_string());
                tracing::debug!(commit = %id, path = %rel.display(), "staged content matches HEAD");
                return Ok(CommitOutcome::Unchanged(id));
            }
        }

        let tree_oid = index.write_tree().map_err(VcsError::Commit)?;
        let tree = repo.find_tree(tree_oid).map_err(VcsError::Commit)?;
        let sig = self.signature(&repo)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(VcsError::Commit)?;

        let id = CommitId(oid.to_string());
        tracing::info!(commit = %id, path = %rel.display(), "created commit");
        Ok(CommitOutcome::Created(id))
    }

    fn push(&self, branch: &str, timeout: Duration) -> Result<(), VcsError> {
        let (tx, rx) = mpsc::channel();
        let path = self.path.clone();
        let remote = self.settings.remote.clone();
        let refspec_branch = branch.to_string();

        std::thread::Builder::new()
            .name("git-push".to_string())
            .spawn(move || {
                let _ = tx.send(push_blocking(&path, &remote, &refspec_branch));
            })
            .map_err(|e| VcsError::push_failed(format!("could not start push worker: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    remote = %self.settings.remote,
                    branch,
                    timeout_ms = timeout.as_millis() as u64,
                    "push timed out",
                );
                Err(VcsError::push_failed(format!(
                    "push to '{}' timed out after {:?}",
                    self.settings.remote, timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(VcsError::push_failed(
                "push worker exited without reporting a result",
            )),
        }
    }

    fn committed_contents(&self, path: &Path) -> Result<Option<Vec<u8>>, VcsError> {
        let repo = self.repo()?;
        let rel = self.relative_path(path)?;
        let Some(commit) = head_commit(&repo)? else {
            return Ok(None);
        };
        let tree = commit.tree().map_err(VcsError::Read)?;
        let entry = match tree.get_path(&rel) {
            Ok(entry) => entry,
            Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(VcsError::Read(err)),
        };
        let blob = repo.find_blob(entry.id()).map_err(VcsError::Read)?;
        Ok(Some(blob.content().to_vec()))
    }
}

/// Run `job` on a `git-push` worker and wait at most `timeout` for it.
///
/// On timeout the worker is left to finish on its own; its result is dropped.
fn run_with_deadline<F>(remote: &str, timeout: Duration, job: F) -> Result<(), VcsError>
where
    F: FnOnce() -> Result<(), VcsError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("git-push".to_string())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| VcsError::push_failed(format!("could not start push worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                remote,
                timeout_ms = timeout.as_millis() as u64,
                "push timed out",
            );
            Err(VcsError::push_failed(format!(
                "push to '{remote}' timed out after {timeout:?}"
            )))
        }
        Err(RecvTimeoutError::Disconnected) => Err(VcsError::push_failed(
            "push worker exited without reporting a result",
        )),
    }
}

fn open_at(path: &Path) -> Result<Repository, VcsError> {
    Repository::open(path).map_err(|source| VcsError::RepositoryNotFound {
        path: path.to_path_buf(),
        source,
    })
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, VcsError> {
    match repo.head() {
        Ok(head) => head.peel_to_commit().map(Some).map_err(VcsError::Read),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(err) => Err(VcsError::Read(err)),
    }
}

fn push_blocking(path: &Path, remote_name: &str, branch: &str) -> Result<(), VcsError> {
    let repo = open_at(path)?;
    let mut remote = repo.find_remote(remote_name).map_err(|e| {
        VcsError::push_failed(format!("remote '{remote_name}' not found: {}", e.message()))
    })?;

    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    let rejection: RefCell<Option<String>> = RefCell::new(None);

    {
        let cfg = repo.config().ok();
        let mut attempts = 0usize;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            if allowed.is_ssh_key() {
                if let Some(user) = username_from_url {
                    return Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.is_user_pass_plaintext() {
                if let Some(cfg) = cfg.as_ref() {
                    if let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            Cred::default()
        });
        callbacks.push_update_reference(|refname, status| {
            if let Some(msg) = status {
                *rejection.borrow_mut() = Some(format!("{refname}: {msg}"));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        remote
            .push(&[refspec.as_str()], Some(&mut options))
            .map_err(|e| VcsError::push_failed(e.message().to_string()))?;
    }

    if let Some(msg) = rejection.into_inner() {
        return Err(VcsError::push_failed(format!("rejected {msg}")));
    }

    tracing::info!(remote = remote_name, branch, "pushed");
    Ok(())
}
