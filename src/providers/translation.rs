//! Translation provider interface (spec §4.4, §9 design note).

use async_trait::async_trait;

use crate::error::{DubError, DubResult, TransientKind};

/// A domain hint for provider B's context-parameterized prompt (spec
/// §4.4: "movie dialogue", "documentary", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentContext {
    MovieDialogue,
    Documentary,
    General,
}

impl ContentContext {
    pub fn as_prompt_hint(&self) -> &'static str {
        match self {
            ContentContext::MovieDialogue => "movie dialogue",
            ContentContext::Documentary => "documentary narration",
            ContentContext::General => "general speech",
        }
    }
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send a pre-formatted numbered-enumeration prompt (spec §4.4:
    /// `"[1] ...\n[2] ..."`) and return the provider's raw text response.
    /// The caller (`stages::translate`) parses the response via
    /// [`parse_numbered_response`], so no provider-specific framing leaks
    /// past this trait.
    async fn translate_numbered_batch(
        &self,
        numbered_prompt: &str,
        target_language: &str,
        context: ContentContext,
    ) -> DubResult<String>;
}

/// Build the `"[1] first\n[2] second\n..."` prompt body for a batch (spec
/// §4.4).
pub fn format_numbered_prompt(texts: &[String]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[{}] {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Provider A: formal grammar-based, tried first (spec §4.4).
pub struct GrammarTranslationProvider {
    pub client: reqwest::Client,
    pub endpoint: String,
}

#[async_trait]
impl TranslationProvider for GrammarTranslationProvider {
    fn name(&self) -> &'static str {
        "translation_provider_a"
    }

    async fn translate_numbered_batch(
        &self,
        numbered_prompt: &str,
        target_language: &str,
        context: ContentContext,
    ) -> DubResult<String> {
        post_numbered_batch(&self.client, &self.endpoint, None, self.name(), numbered_prompt, target_language, context)
            .await
    }
}

/// Provider B: generative, used on provider A's configured failures
/// (spec §4.4).
pub struct GenerativeTranslationProvider {
    pub api_key: String,
    pub client: reqwest::Client,
    pub endpoint: String,
}

#[async_trait]
impl TranslationProvider for GenerativeTranslationProvider {
    fn name(&self) -> &'static str {
        "translation_provider_b"
    }

    async fn translate_numbered_batch(
        &self,
        numbered_prompt: &str,
        target_language: &str,
        context: ContentContext,
    ) -> DubResult<String> {
        post_numbered_batch(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            self.name(),
            numbered_prompt,
            target_language,
            context,
        )
        .await
    }
}

/// POST a numbered batch to a translation backend and classify the
/// outcome into the error taxonomy's transient kinds (spec §4.4: 429
/// and 5xx recover on different timescales). Both providers here are
/// external collaborators with no real backend configured; this path
/// exercises the real request/response classification logic rather than
/// unconditionally returning a kind-less error.
async fn post_numbered_batch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    provider: &'static str,
    numbered_prompt: &str,
    target_language: &str,
    context: ContentContext,
) -> DubResult<String> {
    let mut request = client.post(endpoint).json(&serde_json::json!({
        "text": numbered_prompt,
        "target_language": target_language,
        "context": context.as_prompt_hint(),
    }));
    if let Some(api_key) = api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request
        .send()
        .await
        .map_err(|err| classify_request_error(provider, &err))?;

    let status = response.status();
    if status.is_success() {
        response.text().await.map_err(|err| classify_request_error(provider, &err))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(provider, status, body))
    }
}

fn classify_request_error(provider: &'static str, err: &reqwest::Error) -> DubError {
    let kind = if err.is_timeout() {
        TransientKind::Timeout
    } else {
        TransientKind::Network
    };
    DubError::ProviderTransientKind {
        provider: provider.into(),
        kind,
        message: err.to_string(),
    }
}

fn classify_status(provider: &'static str, status: reqwest::StatusCode, body: String) -> DubError {
    if status.as_u16() == 429 {
        DubError::ProviderTransientKind {
            provider: provider.into(),
            kind: TransientKind::RateLimited,
            message: body,
        }
    } else if status.is_server_error() {
        DubError::ProviderTransientKind {
            provider: provider.into(),
            kind: TransientKind::ServerError,
            message: body,
        }
    } else {
        DubError::ProviderPermanent {
            provider: provider.into(),
            message: format!("{status}: {body}"),
        }
    }
}

/// Parse a numbered enumeration response (`"[1] ...\n[2] ..."`) into an
/// ordered vector. Falls back to plain line-splitting with numeric-prefix
/// stripping when the expected count is not recovered (spec §4.4).
pub fn parse_numbered_response(response: &str, expected_count: usize) -> Vec<String> {
    let numbered = parse_strict_numbered(response);
    if numbered.len() == expected_count {
        return numbered;
    }
    parse_line_split(response)
}

fn parse_strict_numbered(response: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = strip_numeric_prefix(trimmed) {
            out.push(rest.to_string());
        } else {
            return Vec::new();
        }
    }
    out
}

fn parse_line_split(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| strip_numeric_prefix(line).unwrap_or(line).to_string())
        .collect()
}

/// Strip a `[N]` or `N.` numeric prefix from a line, if present.
fn strip_numeric_prefix(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            let (digits, tail) = rest.split_at(close);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return Some(tail[1..].trim());
            }
        }
        return None;
    }
    if let Some(dot) = line.find('.') {
        let (digits, tail) = line.split_at(dot);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return Some(tail[1..].trim());
        }
    }
    None
}
