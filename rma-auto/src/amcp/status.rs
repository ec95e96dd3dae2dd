//! Layer status (`INFO`) parsing
//!
//! Only two things are read from the status document: the time markers and
//! the path of the foreground file on one layer. The document is scanned by
//! tag rather than fully parsed; everything outside
//! `<layer_N>…<foreground>…<file>` is ignored.

use regex::Regex;

use crate::error::{Error, Result};

/// `(current, total)` playback position in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    pub current: f64,
    pub total: f64,
}

impl TimeSample {
    pub fn new(current: f64, total: f64) -> Self {
        Self { current, total }
    }

    /// Percent complete, 0 when the total is unknown
    pub fn progress_percent(&self) -> f64 {
        if self.total > 0.0 {
            self.current / self.total * 100.0
        } else {
            0.0
        }
    }
}

/// Foreground file of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct ForegroundFile {
    pub path: Option<String>,
    pub time: Option<TimeSample>,
}

/// Strip the status header line (`201 INFO OK`) if present
fn xml_body(response: &str) -> &str {
    match response.find('<') {
        Some(idx) => &response[idx..],
        None => "",
    }
}

/// Inner text of the first `<tag>…</tag>` inside `haystack`
fn element<'a>(haystack: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = haystack.find(&open)? + open.len();
    let end = haystack[start..].find(&close)? + start;
    Some(&haystack[start..end])
}

/// Find the foreground file node of `layer`
///
/// Returns `Ok(None)` when the document is well-formed enough to read but
/// the layer has no file loaded. Returns a parse error when the response is
/// not a status document at all.
pub fn foreground_file(response: &str, layer: u16) -> Result<Option<ForegroundFile>> {
    let body = xml_body(response);
    if body.is_empty() {
        return Err(Error::Parse("Status response contains no XML".to_string()));
    }
    if !body.contains("</channel>") && !body.contains("</layer>") {
        return Err(Error::Parse("Status response is truncated".to_string()));
    }

    let layer_tag = format!("layer_{}", layer);
    let file = match element(body, &layer_tag)
        .and_then(|layer_xml| element(layer_xml, "foreground"))
        .and_then(|fg| element(fg, "file"))
    {
        Some(file) => file,
        None => return Ok(None),
    };

    let path = element(file, "path").map(|p| unescape(p.trim()));
    let time = time_markers(file)?;

    Ok(Some(ForegroundFile { path, time }))
}

/// First two `<time>` values of a file node
fn time_markers(file_xml: &str) -> Result<Option<TimeSample>> {
    let re = time_regex();
    let mut values = re.captures_iter(file_xml).map(|c| {
        let raw = c[1].trim().to_string();
        raw.parse::<f64>()
            .map_err(|e| Error::Parse(format!("Invalid time marker '{}': {}", raw, e)))
    });

    match (values.next(), values.next()) {
        (Some(current), Some(total)) => Ok(Some(TimeSample::new(current?, total?))),
        _ => Ok(None),
    }
}

/// Decode the predefined XML entities
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn time_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<time>([^<]*)</time>").expect("time pattern is valid"))
}

/// Playback position of the foreground file on `layer`
pub fn playback_time(response: &str, layer: u16) -> Result<Option<TimeSample>> {
    Ok(foreground_file(response, layer)?.and_then(|f| f.time))
}

/// Map a server file path to a catalog path
///
/// `media/ROCK MUSIC\Queen-Radio Gaga.mp4` → `ROCK MUSIC/Queen-Radio Gaga`
pub fn normalize_clip_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");

    // Drop everything up to and including the server's media folder
    let lowered = path.to_ascii_lowercase();
    let media_dir = lowered
        .match_indices("media/")
        .map(|(idx, _)| idx)
        .find(|&idx| idx == 0 || lowered.as_bytes()[idx - 1] == b'/');
    if let Some(idx) = media_dir {
        path = path[idx + "media/".len()..].to_string();
    }

    // Listing names carry no extension
    if let Some(dot) = path.rfind('.') {
        let ext = &path[dot + 1..];
        let is_extension = (1..=5).contains(&ext.len())
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        if is_extension && dot > 0 {
            path.truncate(dot);
        }
    }

    path.trim_start_matches('/').to_string()
}
