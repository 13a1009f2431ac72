//! Gitea webhook payload shapes.
//!
//! Only the fields the relay reads are modelled. Every leaf field is
//! defaulted so that an absent or `null` value renders as an empty substring
//! instead of failing the decode; the `repository` object is the one field a
//! payload must carry to be routable.

use crate::UserId;
use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Source-control account attached to an event.
///
/// Gitea emits both `login` and the Gogs-compatible `username` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub login: String,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name: String,
}

impl User {
    /// Numeric identity used for self-notification suppression.
    pub fn user_id(&self) -> UserId {
        UserId::new(self.id)
    }

    /// Login name, falling back to the Gogs-style `username` key.
    pub fn username(&self) -> &str {
        if self.login.is_empty() {
            &self.username
        } else {
            &self.login
        }
    }

    /// Full name when set, otherwise the login.
    pub fn display_name(&self) -> &str {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            self.username()
        } else {
            full_name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: CommitAuthor,
}

impl Commit {
    /// First line of the commit message.
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub secret: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub compare_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commits: Vec<Commit>,
    pub repository: Repository,
    #[serde(default)]
    pub pusher: Option<User>,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatePayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub ref_type: String,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletePayload {
    #[serde(default)]
    pub secret: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub ref_type: String,
    #[serde(default)]
    pub pusher_type: String,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForkPayload {
    #[serde(default)]
    pub secret: String,
    /// The repository that was forked; its subscribers are notified.
    pub forkee: Repository,
    /// The newly created fork.
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub id: i64,
    pub number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    /// Author of the issue.
    pub user: Option<User>,
    pub assignee: Option<User>,
    #[serde(deserialize_with = "null_as_default")]
    pub assignees: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuePayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub issue: Issue,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    /// Author of the comment.
    pub user: Option<User>,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueCommentPayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub issue: Issue,
    #[serde(default)]
    pub comment: Comment,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
    #[serde(default)]
    pub is_pull: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryPayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub action: String,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Release {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub tag_name: String,
    /// Release title.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tarball_url: String,
    pub draft: bool,
    pub prerelease: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleasePayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub release: Release,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

/// Head or base side of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequestBranch {
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "ref", deserialize_with = "null_as_default")]
    pub git_ref: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sha: String,
    pub repo: Option<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub id: i64,
    pub number: i64,
    /// Author of the pull request.
    pub user: Option<User>,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    pub assignee: Option<User>,
    #[serde(deserialize_with = "null_as_default")]
    pub assignees: Vec<User>,
    pub head: PullRequestBranch,
    pub base: PullRequestBranch,
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestPayload {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}
