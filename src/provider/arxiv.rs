//! arXiv candidate source.
//!
//! Queries the arXiv export API and parses its Atom feed into [`Paper`]s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::time::Duration;
use tracing::debug;

use super::{CandidateSource, ProviderError, ProviderResult, SortBy};
use crate::models::{Author, Paper};

/// Public arXiv query endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";

/// HTTP client for the arXiv export API.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ArxivClient {
    /// Create a client for `endpoint`, or the public API if `None`.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` if the HTTP client cannot be built
    pub fn new(endpoint: Option<String>, timeout: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("paper-recommend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl CandidateSource for ArxivClient {
    async fn fetch(
        &self,
        query_expression: &str,
        sort_by: SortBy,
        start: usize,
        max_results: usize,
    ) -> ProviderResult<Vec<Paper>> {
        debug!(query = query_expression, start, max_results, "Querying arXiv");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("search_query", query_expression.to_string()),
                ("sortBy", sort_by.as_str().to_string()),
                ("sortOrder", "descending".to_string()),
                ("start", start.to_string()),
                ("max_results", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("arXiv request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded(format!("arXiv returned {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::NetworkError(format!("arXiv returned status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("Failed to read arXiv response: {}", e)))?;

        parse_atom_feed(&body)
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

/// Fields of one `<entry>` collected while parsing.
#[derive(Default)]
struct EntryAccum {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<Author>,
    primary_category: Option<String>,
    first_category: Option<String>,
    pdf_url: Option<String>,
}

impl EntryAccum {
    fn into_paper(self) -> Option<Paper> {
        let id = arxiv_id_from_url(self.id.trim());
        let title = collapse_whitespace(&self.title);
        if id.is_empty() || title.is_empty() {
            return None;
        }

        Some(Paper {
            id,
            title,
            authors: self.authors,
            summary: collapse_whitespace(&self.summary),
            category: self
                .primary_category
                .or(self.first_category)
                .unwrap_or_default(),
            published_at: DateTime::parse_from_rfc3339(self.published.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            pdf_url: self.pdf_url,
        })
    }
}

/// Which text-bearing element the parser is inside.
#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
    Affiliation,
}

/// Parse an arXiv Atom feed.
///
/// Entries without an id or a title are skipped.
///
/// # Errors
/// Returns `ProviderError::ParseError` if the XML is malformed
pub fn parse_atom_feed(xml: &str) -> ProviderResult<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();
    let mut entry: Option<EntryAccum> = None;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if let Some(accum) = entry.as_mut() {
                    field = start_element(accum, e);
                } else if e.local_name().as_ref() == b"entry" {
                    entry = Some(EntryAccum::default());
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(accum) = entry.as_mut() {
                    start_element(accum, e);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(accum) = entry.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| ProviderError::ParseError(err.to_string()))?;
                    push_text(accum, field, &text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(paper) = entry.take().and_then(EntryAccum::into_paper) {
                        papers.push(paper);
                    }
                    field = Field::None;
                }
                _ => field = Field::None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::ParseError(format!(
                    "Invalid Atom feed at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(papers)
}

fn start_element(accum: &mut EntryAccum, e: &BytesStart<'_>) -> Field {
    match e.local_name().as_ref() {
        b"id" => Field::Id,
        b"title" => Field::Title,
        b"summary" => Field::Summary,
        b"published" => Field::Published,
        b"author" => {
            accum.authors.push(Author::new(String::new()));
            Field::None
        }
        b"name" => Field::AuthorName,
        b"affiliation" => Field::Affiliation,
        b"primary_category" => {
            if let Some(term) = attribute(e, b"term") {
                accum.primary_category = Some(term);
            }
            Field::None
        }
        b"category" => {
            if accum.first_category.is_none() {
                accum.first_category = attribute(e, b"term");
            }
            Field::None
        }
        b"link" => {
            if attribute(e, b"title").as_deref() == Some("pdf") {
                accum.pdf_url = attribute(e, b"href");
            }
            Field::None
        }
        _ => Field::None,
    }
}

fn push_text(accum: &mut EntryAccum, field: Field, text: &str) {
    match field {
        Field::Id => accum.id.push_str(text),
        Field::Title => accum.title.push_str(text),
        Field::Summary => accum.summary.push_str(text),
        Field::Published => accum.published.push_str(text),
        Field::AuthorName => {
            if let Some(author) = accum.authors.last_mut() {
                author.name.push_str(text.trim());
            }
        }
        Field::Affiliation => {
            if let Some(author) = accum.authors.last_mut() {
                author.affiliation = Some(text.trim().to_string());
            }
        }
        Field::None => {}
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Extract the identifier from an abstract URL such as
/// `http://arxiv.org/abs/2212.04356v2`. The version suffix is kept.
///
/// Old-style identifiers keep their archive prefix
/// (`http://arxiv.org/abs/hep-th/9901001v1` → `hep-th/9901001v1`).
fn arxiv_id_from_url(url: &str) -> String {
    match url.find("/abs/") {
        Some(idx) => url[idx + "/abs/".len()..].to_string(),
        None => url.rsplit('/').next().unwrap_or(url).to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
