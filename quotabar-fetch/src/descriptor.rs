//! Captured request descriptors.
//!
//! The descriptor is a `curl` command as produced by a browser's
//! "Copy as cURL" action, saved to a file. It is parsed once at startup into
//! a [`RequestDescriptor`] that executors replay on every fetch.
//!
//! Both the POSIX (`bash`) and Windows (`cmd`) copy formats are accepted.

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use crate::error::DescriptorError;

/// Backslash line continuation (`\` + newline).
static POSIX_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\r?\n\s*").expect("valid regex"));

/// `cmd` caret line continuation (`^` + newline).
static CMD_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^\s*\r?\n\s*").expect("valid regex"));

/// `cmd` caret escape in front of any character other than a quote.
static CMD_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\^([^"])"#).expect("valid regex"));

/// Options that consume the following word and that we have no use for.
const IGNORED_VALUE_OPTIONS: &[&str] = &[
    "-u", "--user", "-o", "--output", "-m", "--max-time", "--connect-timeout", "-x",
    "--proxy", "--retry", "-w", "--write-out", "--cert", "--key", "--cacert", "-K",
    "--config", "--resolve",
];

// ============================================================================
// Request Descriptor
// ============================================================================

/// A fully-formed HTTP request replayed on every fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor directly.
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Loads and parses a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain a
    /// usable `curl` command.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let descriptor = Self::parse(&text)?;
        info!(path = %path.display(), method = %descriptor.method, url = %descriptor.url, "Loaded request descriptor");
        Ok(descriptor)
    }

    /// Parses a `curl` command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, cannot be tokenized, or has no
    /// valid http(s) URL.
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DescriptorError::Empty);
        }

        let normalized = expand_ansi_c_quotes(&normalize_line_continuations(text))?;
        let tokens = shlex::split(&normalized).ok_or(DescriptorError::Tokenize)?;

        let mut method: Option<String> = None;
        let mut url: Option<String> = None;
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut cookie: Option<String> = None;
        let mut body: Option<String> = None;

        let mut iter = tokens.into_iter().peekable();
        if iter.peek().is_some_and(|t| is_curl_binary(t)) {
            iter.next();
        }

        while let Some(token) = iter.next() {
            // `--long=value` form.
            let (flag, inline_value) = match token.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
                _ => (token.clone(), None),
            };

            // `-XPOST` form.
            if let Some(rest) = flag.strip_prefix("-X") {
                if !rest.is_empty() && !flag.starts_with("--") {
                    method = Some(rest.to_uppercase());
                    continue;
                }
            }

            let mut value = |name: &str| -> Result<String, DescriptorError> {
                match inline_value.clone() {
                    Some(v) => Ok(v),
                    None => iter
                        .next()
                        .ok_or_else(|| DescriptorError::MissingValue(name.to_string())),
                }
            };

            match flag.as_str() {
                "-X" | "--request" => method = Some(value(&flag)?.to_uppercase()),
                "-H" | "--header" => {
                    let raw = value(&flag)?;
                    match raw.split_once(':') {
                        Some((name, val)) => {
                            let name = name.trim();
                            if name.is_empty() {
                                debug!("Skipping header without a name");
                                continue;
                            }
                            if !is_header_name(name) {
                                return Err(DescriptorError::InvalidHeader(name.to_string()));
                            }
                            headers.push((name.to_string(), val.trim().to_string()));
                        }
                        None => debug!(header = %raw, "Skipping header without a colon"),
                    }
                }
                "-b" | "--cookie" => cookie = Some(value(&flag)?),
                "-A" | "--user-agent" => headers.push(("User-Agent".to_string(), value(&flag)?)),
                "-e" | "--referer" => headers.push(("Referer".to_string(), value(&flag)?)),
                "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii"
                | "--data-urlencode" => body = Some(value(&flag)?),
                "--url" => url = Some(value(&flag)?),
                f if IGNORED_VALUE_OPTIONS.contains(&f) => {
                    value(f)?;
                }
                f if f.starts_with('-') => debug!(flag = %f, "Ignoring curl option"),
                _ => {
                    if url.is_none() {
                        url = Some(token);
                    }
                }
            }
        }

        // A -b/--cookie value replaces any Cookie header.
        if let Some(cookie) = cookie {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("cookie"));
            headers.push(("Cookie".to_string(), cookie));
        }

        let url = parse_url(&url.ok_or(DescriptorError::MissingUrl)?)?;
        let method = method.unwrap_or_else(|| {
            if body.is_some() { "POST" } else { "GET" }.to_string()
        });

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// HTTP method, upper-case.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers in capture order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Header values carry session cookies; keep them out of logs.
impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &header_names)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_curl_binary(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower == "curl" || lower == "curl.exe" || lower.ends_with("/curl") || lower.ends_with("\\curl.exe")
}

/// Joins continued lines and strips `cmd` caret escaping.
fn normalize_line_continuations(text: &str) -> String {
    let is_cmd = text.contains("^\"") || CMD_CONTINUATION.is_match(text);
    if is_cmd {
        let joined = CMD_CONTINUATION.replace_all(text, " ");
        let unquoted = joined.replace("^\"", "\"");
        CMD_ESCAPE.replace_all(&unquoted, "$1").into_owned()
    } else {
        POSIX_CONTINUATION.replace_all(text, " ").into_owned()
    }
}

/// HTTP token characters (RFC 9110 `tchar`).
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Rewrites bash ANSI-C quoted words (`$'...'`) as plain single-quoted words.
///
/// Browsers emit `$'...'` whenever a value contains `'`, `!` or control
/// characters. Quotes of the other kinds are skipped over untouched.
fn expand_ansi_c_quotes(text: &str) -> Result<String, DescriptorError> {
    if !text.contains("$'") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '\'' {
                        break;
                    }
                }
            }
            '"' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    match inner {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '$' if chars.peek() == Some(&'\'') => {
                chars.next();
                let decoded = decode_ansi_c(&mut chars)?;
                out.push('\'');
                out.push_str(&decoded.replace('\'', r"'\''"));
                out.push('\'');
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Decodes the body of a `$'...'` word up to and including the closing quote.
fn decode_ansi_c(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, DescriptorError> {
    let mut bytes: Vec<u8> = Vec::new();

    loop {
        let c = chars.next().ok_or(DescriptorError::Tokenize)?;
        match c {
            '\'' => break,
            '\\' => {
                let escape = chars.next().ok_or(DescriptorError::Tokenize)?;
                match escape {
                    'a' => bytes.push(0x07),
                    'b' => bytes.push(0x08),
                    'e' | 'E' => bytes.push(0x1b),
                    'f' => bytes.push(0x0c),
                    'n' => bytes.push(b'\n'),
                    'r' => bytes.push(b'\r'),
                    't' => bytes.push(b'\t'),
                    'v' => bytes.push(0x0b),
                    '\\' | '\'' | '"' | '?' => push_char(&mut bytes, escape),
                    'x' => match take_radix(chars, 16, 2) {
                        Some(value) => bytes.push(low_byte(value)),
                        None => bytes.extend_from_slice(b"\\x"),
                    },
                    'u' | 'U' => {
                        let max = if escape == 'u' { 4 } else { 8 };
                        match take_radix(chars, 16, max).and_then(char::from_u32) {
                            Some(decoded) => push_char(&mut bytes, decoded),
                            None => {
                                bytes.push(b'\\');
                                push_char(&mut bytes, escape);
                            }
                        }
                    }
                    '0'..='7' => {
                        let mut value = escape.to_digit(8).unwrap_or(0);
                        for _ in 0..2 {
                            match chars.peek().and_then(|d| d.to_digit(8)) {
                                Some(d) => {
                                    value = value * 8 + d;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        bytes.push(low_byte(value));
                    }
                    'c' => {
                        let control = chars.next().ok_or(DescriptorError::Tokenize)?;
                        bytes.push(low_byte(u32::from(control) & 0x1f));
                    }
                    other => {
                        bytes.push(b'\\');
                        push_char(&mut bytes, other);
                    }
                }
            }
            c => push_char(&mut bytes, c),
        }
    }

    Ok(String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Bash keeps only the low byte of `\nnn` and `\xHH` escapes.
fn low_byte(value: u32) -> u8 {
    value.to_le_bytes()[0]
}

/// Consumes up to `max` digits in `radix`; `None` if there are none.
fn take_radix(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, radix: u32, max: usize) -> Option<u32> {
    let mut value: Option<u32> = None;
    for _ in 0..max {
        let Some(digit) = chars.peek().and_then(|d| d.to_digit(radix)) else {
            break;
        };
        chars.next();
        value = Some(value.unwrap_or(0) * radix + digit);
    }
    value
}

fn parse_url(raw: &str) -> Result<Url, DescriptorError> {
    let url = Url::parse(raw).map_err(|e| DescriptorError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DescriptorError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
