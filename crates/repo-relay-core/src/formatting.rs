//! # Message Formatter
//!
//! Pure rendering of webhook events into chat messages. One rule per event
//! kind; no I/O and no error path. Missing payload fields render as empty
//! substrings.

use crate::events::{payloads::User, WebhookEvent};
use std::collections::HashSet;

/// Common fields of issue-like items (issues, pull requests, comments).
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemSummary<'a> {
    pub action: &'a str,
    pub actor: &'a str,
    pub repository: &'a str,
    pub number: i64,
    pub title: &'a str,
    pub url: &'a str,
}

/// Renders chat messages, optionally linking repositories to the
/// source-control server.
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter {
    base_url: Option<String>,
}

impl MessageFormatter {
    /// Create a formatter. A blank `base_url` disables repository links.
    pub fn new(base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self { base_url }
    }

    /// Link to a repository on the source-control server, when configured.
    pub fn repository_url(&self, repository: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .filter(|_| !repository.is_empty())
            .map(|base| format!("{base}/{repository}"))
    }

    /// Render any event.
    pub fn format(&self, event: &WebhookEvent) -> String {
        match event {
            WebhookEvent::Push(e) => {
                let pusher = e.pusher.as_ref().or(e.sender.as_ref());
                let titles: Vec<&str> = e.commits.iter().map(|c| c.title()).collect();
                let last_url = e.commits.last().map(|c| c.url.as_str()).unwrap_or_default();
                self.push(
                    display_name(pusher),
                    &e.repository.full_name,
                    ref_to_branch(&e.git_ref),
                    &titles,
                    last_url,
                )
            }
            WebhookEvent::Create(e) => {
                self.create(&e.git_ref, &e.ref_type, &e.repository.full_name)
            }
            WebhookEvent::Delete(e) => {
                self.delete(&e.git_ref, &e.ref_type, &e.repository.full_name)
            }
            WebhookEvent::Fork(e) => self.fork(&e.forkee.full_name, &e.repository.full_name),
            WebhookEvent::Issue(e) => {
                let item = ItemSummary {
                    action: &e.action,
                    actor: display_name(e.sender.as_ref()),
                    repository: &e.repository.full_name,
                    number: e.issue.number,
                    title: &e.issue.title,
                    url: &e.issue.html_url,
                };
                let assignees = join_assignees(e.issue.assignee.as_ref(), &e.issue.assignees);
                self.issue(&item, &assignees)
            }
            WebhookEvent::IssueComment(e) => {
                let item = ItemSummary {
                    action: &e.action,
                    actor: display_name(e.comment.user.as_ref().or(e.sender.as_ref())),
                    repository: &e.repository.full_name,
                    number: e.issue.number,
                    title: &e.issue.title,
                    url: &e.comment.html_url,
                };
                self.issue_comment(&item, &e.comment.body)
            }
            WebhookEvent::Repository(e) => self.repository(
                &e.action,
                display_name(e.sender.as_ref()),
                &e.repository.full_name,
            ),
            WebhookEvent::Release(e) => self.release(
                &e.action,
                display_name(e.sender.as_ref()),
                &e.repository.full_name,
                &e.release.name,
                &e.release.tag_name,
                &e.release.tarball_url,
            ),
            WebhookEvent::PullRequest(e) => {
                let pr = &e.pull_request;
                let item = ItemSummary {
                    action: &e.action,
                    actor: display_name(e.sender.as_ref()),
                    repository: &e.repository.full_name,
                    number: pr.number,
                    title: &pr.title,
                    url: &pr.html_url,
                };
                let head_repo = pr
                    .head
                    .repo
                    .as_ref()
                    .map(|r| r.full_name.as_str())
                    .unwrap_or_default();
                let source = format!("{}/{}", head_repo, pr.head.git_ref);
                let assignees = join_assignees(pr.assignee.as_ref(), &pr.assignees);
                self.pull_request(&item, &source, &assignees)
            }
        }
    }

    pub fn push(
        &self,
        pusher: &str,
        repository: &str,
        branch: &str,
        commit_titles: &[&str],
        last_commit_url: &str,
    ) -> String {
        let count = commit_titles.len();
        let noun = if count == 1 { "commit" } else { "commits" };

        let mut lines = vec![format!(
            "{pusher} pushed {count} {noun} to {branch} on {repository}:"
        )];
        lines.extend(commit_titles.iter().map(|title| format!("- {title}")));
        push_non_empty(&mut lines, last_commit_url);
        lines.join("\n")
    }

    pub fn create(&self, git_ref: &str, ref_type: &str, repository: &str) -> String {
        let mut lines = vec![format!("New {ref_type} {git_ref} created on {repository}")];
        self.push_repository_link(&mut lines, repository);
        lines.join("\n")
    }

    pub fn delete(&self, git_ref: &str, ref_type: &str, repository: &str) -> String {
        let mut lines = vec![format!("The {ref_type} {git_ref} was deleted from {repository}")];
        self.push_repository_link(&mut lines, repository);
        lines.join("\n")
    }

    /// `forkee` is the original repository, `fork` the new copy.
    pub fn fork(&self, forkee: &str, fork: &str) -> String {
        let mut lines = vec![format!("{forkee} was forked to {fork}")];
        self.push_repository_link(&mut lines, fork);
        lines.join("\n")
    }

    pub fn issue(&self, item: &ItemSummary<'_>, assignees: &str) -> String {
        let mut lines = vec![format!(
            "{} {} issue #{} on {}: {}",
            item.actor,
            humanize_action(item.action),
            item.number,
            item.repository,
            item.title
        )];
        if !assignees.is_empty() {
            lines.push(format!("Assigned to: {assignees}"));
        }
        push_non_empty(&mut lines, item.url);
        lines.join("\n")
    }

    pub fn issue_comment(&self, item: &ItemSummary<'_>, body: &str) -> String {
        let mut lines = vec![format!(
            "{} {} a comment on issue #{} on {} ({}):",
            item.actor,
            humanize_action(item.action),
            item.number,
            item.repository,
            item.title
        )];
        lines.extend(body.trim().lines().map(|line| format!("> {line}")));
        push_non_empty(&mut lines, item.url);
        lines.join("\n")
    }

    pub fn repository(&self, action: &str, sender: &str, repository: &str) -> String {
        let mut lines = vec![format!(
            "{sender} {} repository {repository}",
            humanize_action(action)
        )];
        self.push_repository_link(&mut lines, repository);
        lines.join("\n")
    }

    pub fn release(
        &self,
        action: &str,
        sender: &str,
        repository: &str,
        title: &str,
        tag: &str,
        tarball_url: &str,
    ) -> String {
        let mut lines = vec![format!(
            "{sender} {} release {title} ({tag}) on {repository}",
            humanize_action(action)
        )];
        push_non_empty(&mut lines, tarball_url);
        lines.join("\n")
    }

    pub fn pull_request(&self, item: &ItemSummary<'_>, source: &str, assignees: &str) -> String {
        let mut lines = vec![
            format!(
                "{} {} pull request #{} on {}: {}",
                item.actor,
                humanize_action(item.action),
                item.number,
                item.repository,
                item.title
            ),
            format!("From: {source}"),
        ];
        if !assignees.is_empty() {
            lines.push(format!("Assigned to: {assignees}"));
        }
        push_non_empty(&mut lines, item.url);
        lines.join("\n")
    }

    fn push_repository_link(&self, lines: &mut Vec<String>, repository: &str) {
        if let Some(url) = self.repository_url(repository) {
            lines.push(url);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Strip the `refs/heads/` prefix from a git ref.
pub fn ref_to_branch(git_ref: &str) -> &str {
    git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref)
}

/// Comma-separated display names of the primary assignee and the assignee
/// list, without duplicates.
pub fn join_assignees(assignee: Option<&User>, assignees: &[User]) -> String {
    let mut seen = HashSet::new();
    assignee
        .into_iter()
        .chain(assignees)
        .filter(|user| seen.insert(user.id))
        .map(User::display_name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_name(user: Option<&User>) -> &str {
    user.map(User::display_name).unwrap_or_default()
}

// "label_updated" reads better as "label updated"
fn humanize_action(action: &str) -> String {
    action.replace('_', " ")
}

fn push_non_empty(lines: &mut Vec<String>, line: &str) {
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

#[cfg(test)]
#[path = "formatting_tests.rs"]
mod tests;
