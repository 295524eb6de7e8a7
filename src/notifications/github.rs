//! GitHub pull request comments

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Repository and credentials used to talk to the GitHub REST API
#[derive(Debug, Clone)]
pub struct GithubTarget {
    pub api_url: String,
    /// `owner/name`
    pub repository: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

/// What happened to the coverage comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Skipped,
    Created(u64),
    Updated(u64),
}

/// Create the coverage comment on a pull request, or update the one carrying `marker`
pub async fn post_or_update_comment(
    target: &GithubTarget,
    marker: &str,
    pr_number: Option<u64>,
    body: &str,
) -> Result<CommentAction> {
    let Some(pr_number) = pr_number else {
        log::info!("No pull request number found, skipping comment creation");
        return Ok(CommentAction::Skipped);
    };

    let client = reqwest::Client::new();
    let payload = json!({ "body": with_marker(body, marker) });

    let existing = find_existing_comment(&client, target, pr_number, marker).await;

    let request = match &existing {
        Some(comment) => client.patch(format!(
            "{}/repos/{}/issues/comments/{}",
            target.api_url, target.repository, comment.id
        )),
        None => client.post(format!(
            "{}/repos/{}/issues/{}/comments",
            target.api_url, target.repository, pr_number
        )),
    };

    let response = authorize(request, target)
        .json(&payload)
        .send()
        .await
        .context("Failed to send comment to GitHub")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("GitHub comment request failed: {} - {}", status, text);
    }

    let comment: IssueComment = response
        .json()
        .await
        .context("Failed to decode GitHub comment response")?;

    Ok(match existing {
        Some(_) => CommentAction::Updated(comment.id),
        None => CommentAction::Created(comment.id),
    })
}

fn authorize(request: reqwest::RequestBuilder, target: &GithubTarget) -> reqwest::RequestBuilder {
    request
        .header("Authorization", format!("token {}", target.token))
        .header("User-Agent", "covreport")
        .header("Accept", "application/vnd.github.v3+json")
}

/// Page through the pull request's comments looking for `marker`.
/// Listing errors are logged and treated as "not found".
async fn find_existing_comment(
    client: &reqwest::Client,
    target: &GithubTarget,
    pr_number: u64,
    marker: &str,
) -> Option<IssueComment> {
    let mut page = 1;

    loop {
        let comments = match list_comments(client, target, pr_number, page).await {
            Ok(comments) => comments,
            Err(e) => {
                log::warn!("Failed to search for existing comments: {:#}", e);
                return None;
            }
        };

        if let Some(found) = find_marked_comment(&comments, marker) {
            return Some(found.clone());
        }

        if comments.len() < PER_PAGE {
            return None;
        }
        page += 1;
    }
}

async fn list_comments(
    client: &reqwest::Client,
    target: &GithubTarget,
    pr_number: u64,
    page: usize,
) -> Result<Vec<IssueComment>> {
    let url = format!(
        "{}/repos/{}/issues/{}/comments?per_page={}&page={}",
        target.api_url, target.repository, pr_number, PER_PAGE, page
    );

    let response = authorize(client.get(&url), target).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("GitHub comment listing failed: {} - {}", status, text);
    }

    Ok(response.json().await?)
}

pub fn find_marked_comment<'a>(comments: &'a [IssueComment], marker: &str) -> Option<&'a IssueComment> {
    comments
        .iter()
        .find(|c| c.body.as_deref().is_some_and(|b| b.contains(marker)))
}

/// Append the marker unless the body already carries it
pub fn with_marker(body: &str, marker: &str) -> String {
    if body.contains(marker) {
        body.to_string()
    } else {
        format!("{}\n\n{}", body, marker)
    }
}
