//! Prompt construction for content-generation requests.
//!
//! A validated [`GenerationRequest`] is substituted into one of two fixed
//! templates: [`TemplateKind::Document`] asks for Markdown articles and backs
//! the single-shot endpoint, [`TemplateKind::Stream`] asks for plain text of
//! roughly the source length and backs the streaming endpoint.

use std::borrow::Cow;
use std::fmt;

/// Maximum number of characters of source text kept in a prompt.
pub const MAX_SOURCE_CHARS: usize = 4000;

/// Appended to source text that was cut at [`MAX_SOURCE_CHARS`].
pub const TRUNCATION_NOTICE: &str =
    "\n\n(The source text above was truncated because it exceeded the length limit.)";

/// A content-generation request whose fields have all been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model_id: String,
    /// Source material to rewrite.
    pub text: String,
    /// Target publishing channel(s).
    pub channels: String,
    /// Content direction or angle.
    pub direction: String,
    /// Free-text requirements from the user.
    pub requirements: String,
    /// Number of articles to produce. Always at least 1.
    pub num: u32,
    pub seo_keywords: String,
    /// Intended usage scope.
    pub scope: String,
}

/// Which fixed template a prompt is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Single-shot response, Markdown output.
    Document,
    /// Streaming response, plain-text output with length parity.
    Stream,
}

/// A fully substituted prompt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cut `text` to [`MAX_SOURCE_CHARS`] characters and append
/// [`TRUNCATION_NOTICE`]. Text at or under the limit is borrowed unchanged.
pub fn truncate_source(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(MAX_SOURCE_CHARS) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_NOTICE.len());
            truncated.extend(text.chars().take(MAX_SOURCE_CHARS));
            truncated.push_str(TRUNCATION_NOTICE);
            Cow::Owned(truncated)
        }
    }
}

/// Build the prompt for `request` from the template `kind`.
pub fn build_prompt(request: &GenerationRequest, kind: TemplateKind) -> Prompt {
    let text = truncate_source(&request.text);
    let GenerationRequest {
        channels,
        direction,
        requirements,
        num,
        seo_keywords,
        scope,
        ..
    } = request;

    let body = match kind {
        TemplateKind::Document => format!(
            "\
You are an experienced content editor. Rewrite the source material below into \
{num} original article(s).

Target channels: {channels}
Content direction: {direction}
Usage scope: {scope}
SEO keywords: {seo_keywords}
Additional requirements: {requirements}

Guidelines:
- Keep every factual claim consistent with the source material.
- Work the SEO keywords in naturally; do not stuff them.
- Give each article a title and clear section headings.
- Format the output as Markdown.

Source material:
{text}"
        ),
        TemplateKind::Stream => format!(
            "\
You are an experienced content editor. Rewrite the source material below into \
{num} original article(s).

Target channels: {channels}
Content direction: {direction}
Usage scope: {scope}
SEO keywords: {seo_keywords}
Additional requirements: {requirements}

Guidelines:
- Keep every factual claim consistent with the source material.
- Work the SEO keywords in naturally; do not stuff them.
- Output plain text only, with no Markdown syntax.
- Keep each article between 90% and 110% of the source material's length.

Source material:
{text}"
        ),
    };

    Prompt(body)
}
