//! URL classification: folder path, display name and method semantics.
//!
//! `https://api.example.com/users/42/posts` with `GET` classifies as folder
//! `/com/example/api/users/posts` and name `GET Users Posts`.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::TranslateError;

/// Number of trailing path segments used for the display name.
const NAME_TAIL_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Upper-cased request method.
    pub method: String,
    pub host: String,
    /// Sanitized folder names, outermost first.
    pub folder_segments: Vec<String>,
    /// POSIX-style absolute path joined from `folder_segments`.
    pub folder_path: String,
    pub request_name: String,
    pub is_mutation: bool,
    pub requires_strict_ordering: bool,
}

impl Classification {
    /// File name of the base request in the namespace.
    pub fn file_name(&self) -> String {
        format!("{}.request", sanitize(&self.request_name))
    }
}

/// Classify a recorded request. Fails with `H002` for a malformed URL,
/// `H003` for a URL without host and `H004` for an unusable method.
pub fn classify(raw_url: &str, method: &str) -> Result<Classification, TranslateError> {
    let method = normalize_method(method)?;

    let url = Url::parse(raw_url).map_err(|e| {
        TranslateError::classify("H002", format!("Malformed URL '{}': {}", raw_url, e))
    })?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            TranslateError::classify("H003", format!("URL '{}' has no host", raw_url))
        })?
        .trim_end_matches('.')
        .to_ascii_lowercase();

    // Segments come percent-encoded; names are built from the decoded text.
    let decoded: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .filter(|s| is_meaningful_segment(s))
                .collect()
        })
        .unwrap_or_default();
    let path_segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

    let mut folder_segments: Vec<String> = host
        .rsplit('.')
        .filter(|s| !s.is_empty())
        .map(sanitize)
        .collect();
    folder_segments.extend(path_segments.iter().map(|s| sanitize(s)));
    let folder_path = format!("/{}", folder_segments.join("/"));

    let request_name = format!("{} {}", method, display_tail(&path_segments, &host));
    let is_mutation = is_mutation(&method);
    let requires_strict_ordering = requires_strict_ordering(&method);

    Ok(Classification {
        method,
        host,
        folder_segments,
        folder_path,
        request_name,
        is_mutation,
        requires_strict_ordering,
    })
}

pub fn is_mutation(method: &str) -> bool {
    ["POST", "PUT", "PATCH", "DELETE"]
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

pub fn requires_strict_ordering(method: &str) -> bool {
    method.eq_ignore_ascii_case("DELETE")
}

/// Replace characters that are unsafe in file and folder names.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ' ' | '/' | '\\' => out.push('_'),
            '?' | '#' | '"' | '\'' => {}
            '&' => out.push_str("_and_"),
            '=' => out.push_str("_eq_"),
            '<' => out.push_str("_lt_"),
            '>' => out.push_str("_gt_"),
            '*' => out.push_str("_star_"),
            other => out.push(other),
        }
    }
    out
}

fn normalize_method(method: &str) -> Result<String, TranslateError> {
    let trimmed = method.trim();
    let is_token = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c));
    if !is_token {
        return Err(TranslateError::classify(
            "H004",
            format!("Unparseable HTTP method '{}'", method),
        ));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Empty, numeric-only (probable ids) and `{placeholder}` segments carry no
/// structure and are skipped.
fn is_meaningful_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()) && !is_placeholder(segment)
}

fn is_placeholder(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    let braced = lower.starts_with('{') && lower.ends_with('}');
    let encoded = lower.starts_with("%7b") && lower.ends_with("%7d");
    braced || encoded
}

fn display_tail(segments: &[&str], host: &str) -> String {
    if segments.is_empty() {
        let host = host.strip_prefix("www.").unwrap_or(host);
        return title_case(&host.replace('.', " "));
    }
    let start = segments.len().saturating_sub(NAME_TAIL_SEGMENTS);
    let tail = segments[start..].join(" ").replace('-', " ");
    title_case(&tail)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
