//! Authenticated content backfill for access-restricted documents.
//!
//! Some records arrive with no problem statement: the upstream site only
//! serves their content to a logged-in session. This module fetches the
//! missing pieces over the upstream GraphQL endpoint using a caller-supplied
//! session cookie, localizes remote images so documents render offline, and
//! writes the completed records back through the store.
//!
//! Backfill is an optional pre-pass: the rewrite pipeline never calls it and
//! processes whatever content is present.

use crate::document::CodeSnippet;
use crate::error::{FetchError, ProbnormError};
use crate::store::DocumentStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Remote image references inside fetched HTML.
static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src="(https?://[^"]+)""#).expect("hardcoded regex is valid"));

/// GraphQL query for one document's restricted content.
const CONTENT_QUERY: &str = "\
query questionContent($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    content
    codeSnippets {
      lang
      code
    }
  }
}";

/// Content retrieved for one document.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub description: String,
    pub snippets: Vec<CodeSnippet>,
}

/// The authenticated upstream collaborator.
///
/// Object-safe so tests can substitute a stub for the live endpoint.
pub trait ContentFetcher: Send + Sync {
    /// Fetch the restricted content for a document by its slug.
    fn fetch_missing<'a>(
        &'a self,
        slug: &'a str,
    ) -> BoxFuture<'a, Result<FetchedContent, FetchError>>;

    /// Download one referenced asset, returning its bytes.
    fn fetch_asset<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// [`ContentFetcher`] backed by the upstream GraphQL endpoint.
pub struct GraphqlFetcher {
    client: reqwest::Client,
    endpoint: String,
    session: String,
}

impl GraphqlFetcher {
    /// `session` is the value of the upstream session cookie; requests carry
    /// it verbatim, it is never logged.
    pub fn new(endpoint: impl Into<String>, session: impl Into<String>) -> Result<Self, ProbnormError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProbnormError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            session: session.into(),
        })
    }

    fn referer(&self, slug: &str) -> String {
        let base = self.endpoint.trim_end_matches("/graphql");
        format!("{base}/problems/{slug}/")
    }
}

#[derive(Deserialize)]
struct GraphqlEnvelope {
    data: Option<QuestionData>,
}

#[derive(Deserialize)]
struct QuestionData {
    question: Option<QuestionPayload>,
}

#[derive(Deserialize)]
struct QuestionPayload {
    content: Option<String>,
    #[serde(rename = "codeSnippets", default)]
    code_snippets: Vec<CodeSnippet>,
}

impl ContentFetcher for GraphqlFetcher {
    fn fetch_missing<'a>(
        &'a self,
        slug: &'a str,
    ) -> BoxFuture<'a, Result<FetchedContent, FetchError>> {
        async move {
            let body = json!({
                "query": CONTENT_QUERY,
                "variables": { "titleSlug": slug },
            });

            let response = self
                .client
                .post(&self.endpoint)
                .header("Cookie", format!("LEETCODE_SESSION={}", self.session))
                .header("Referer", self.referer(slug))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| FetchError::Http {
                    url: self.endpoint.clone(),
                    detail: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Http {
                    url: self.endpoint.clone(),
                    detail: format!("HTTP {status}"),
                });
            }

            let envelope: GraphqlEnvelope =
                response.json().await.map_err(|e| FetchError::BadResponse {
                    url: self.endpoint.clone(),
                    detail: e.to_string(),
                })?;

            let question = envelope
                .data
                .and_then(|d| d.question)
                .ok_or_else(|| FetchError::BadResponse {
                    url: self.endpoint.clone(),
                    detail: format!("no question payload for slug '{slug}'"),
                })?;

            // `content: null` means the session lacks access; distinguish it
            // from a malformed response so the operator knows to re-login.
            let description = question.content.ok_or_else(|| FetchError::BadResponse {
                url: self.endpoint.clone(),
                detail: format!("content is null for slug '{slug}' (session expired?)"),
            })?;

            Ok(FetchedContent {
                description,
                snippets: question.code_snippets,
            })
        }
        .boxed()
    }

    fn fetch_asset<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Http {
                    url: url.to_string(),
                    detail: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    detail: format!("HTTP {}", response.status()),
                });
            }

            let bytes = response.bytes().await.map_err(|e| FetchError::Http {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
            Ok(bytes.to_vec())
        }
        .boxed()
    }
}

/// Aggregate result of one backfill pass.
#[derive(Debug, Clone, Default)]
pub struct BackfillStats {
    pub scanned: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub assets_downloaded: usize,
}

/// Fill in missing descriptions across the store.
///
/// Sequential on purpose: the authenticated endpoint rate-limits far more
/// aggressively than the rewrite provider, and a backfill pass is rare
/// enough that wall-clock time does not matter.
pub async fn backfill(
    store: &dyn DocumentStore,
    fetcher: &dyn ContentFetcher,
    assets_root: &Path,
) -> Result<BackfillStats, ProbnormError> {
    let ids = store.list_ids()?;
    let mut stats = BackfillStats::default();

    for id in ids {
        stats.scanned += 1;
        let mut doc = match store.load(&id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("backfill: {}", e);
                stats.failed += 1;
                continue;
            }
        };

        if doc.description.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            stats.skipped += 1;
            continue;
        }
        let Some(slug) = doc.slug.clone() else {
            debug!("document {} has no slug, cannot backfill", id);
            stats.skipped += 1;
            continue;
        };

        let content = match fetcher.fetch_missing(&slug).await {
            Ok(content) => content,
            Err(e) => {
                warn!("backfill: document {}: {}", id, e);
                stats.failed += 1;
                continue;
            }
        };

        let (description, downloaded) =
            localize_images(fetcher, &content.description, assets_root, &id).await;
        stats.assets_downloaded += downloaded;

        doc.description = Some(description);
        if doc.snippets.is_empty() {
            doc.snippets = content.snippets;
        }

        match store.save(&id, &doc) {
            Ok(()) => {
                info!("backfilled document {} from '{}'", id, slug);
                stats.fetched += 1;
            }
            Err(e) => {
                warn!("backfill: {}", e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

/// Download each remote image and rewrite its `src` to a local path.
///
/// A failed download leaves that one reference remote; the document is
/// still backfilled.
async fn localize_images(
    fetcher: &dyn ContentFetcher,
    html: &str,
    assets_root: &Path,
    doc_id: &str,
) -> (String, usize) {
    let mut out = html.to_string();
    let mut downloaded = 0;

    let urls: Vec<String> = RE_IMG_SRC
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect();

    for url in urls {
        let Some(filename) = asset_filename(&url) else {
            continue;
        };
        let local_dir = assets_root.join(doc_id);
        let local_path = local_dir.join(&filename);

        if !local_path.exists() {
            let bytes = match fetcher.fetch_asset(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("asset download failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = write_asset(&local_path, &bytes) {
                warn!("asset write failed: {}", e);
                continue;
            }
        }

        let relative = PathBuf::from("assets").join(doc_id).join(&filename);
        out = out.replace(
            &format!("src=\"{url}\""),
            &format!("src=\"{}\"", relative.display()),
        );
        downloaded += 1;
    }

    (out, downloaded)
}

fn write_asset(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| FetchError::AssetWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| FetchError::AssetWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// The last path segment of the URL, query string dropped.
fn asset_filename(url: &str) -> Option<String> {
    let no_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = no_query.rsplit('/').next()?;
    if name.is_empty() || name.contains("..") {
        return None;
    }
    Some(name.to_string())
}
