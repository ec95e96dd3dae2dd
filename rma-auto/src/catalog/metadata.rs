//! Display metadata derived from clip filenames
//!
//! Clips are named `Artist-Title (Qualifier)`. The artist is everything before
//! the first `-`, the title everything after it with parenthesized parts
//! removed. Both are title-cased.

use std::sync::OnceLock;

use regex::Regex;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Last path segment
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Capitalize the first letter of every word, lowercase the rest
///
/// A "word" starts after any non-alphabetic character, so `ac/dc` becomes
/// `Ac/Dc` and `o'brien` becomes `O'Brien`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

fn parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*?\)").expect("parenthetical pattern is valid"))
}

/// `(artist, title)` for a clip filename
pub fn extract_artist_title(filename: &str) -> (String, String) {
    match filename.split_once('-') {
        None => (UNKNOWN_ARTIST.to_string(), title_case(filename)),
        Some((artist, title)) => {
            let title = parenthetical().replace_all(title, "");
            (
                title_case(artist.trim()),
                title_case(collapse_spaces(&title).trim()),
            )
        }
    }
}

/// `(artist, title)` for a server path
pub fn artist_title_from_path(path: &str) -> (String, String) {
    extract_artist_title(file_name(path))
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Catalog metadata if both parts are present, otherwise derived from the path
pub fn display_metadata(path: &str, artist: Option<&str>, title: Option<&str>) -> (String, String) {
    match (artist, title) {
        (Some(a), Some(t)) if !a.trim().is_empty() && !t.trim().is_empty() => {
            (a.to_string(), t.to_string())
        }
        _ => artist_title_from_path(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_title_with_parenthetical() {
        assert_eq!(
            extract_artist_title("Artist-Title (Live)"),
            ("Artist".to_string(), "Title".to_string())
        );
    }

    #[test]
    fn test_uppercase_names_title_cased() {
        assert_eq!(
            extract_artist_title("DEEP PURPLE-SMOKE ON THE WATER (REMASTERED 2012)"),
            ("Deep Purple".to_string(), "Smoke On The Water".to_string())
        );
    }

    #[test]
    fn test_no_dash() {
        assert_eq!(
            extract_artist_title("some instrumental"),
            ("Unknown Artist".to_string(), "Some Instrumental".to_string())
        );
    }

    #[test]
    fn test_splits_on_first_dash_only() {
        assert_eq!(
            extract_artist_title("Guns N Roses-Sweet Child-O-Mine"),
            ("Guns N Roses".to_string(), "Sweet Child-O-Mine".to_string())
        );
    }

    #[test]
    fn test_inner_parenthetical_removed() {
        assert_eq!(
            extract_artist_title("queen-we will (2011 mix) rock you"),
            ("Queen".to_string(), "We Will Rock You".to_string())
        );
    }

    #[test]
    fn test_title_case_word_boundaries() {
        assert_eq!(title_case("ac/dc"), "Ac/Dc");
        assert_eq!(title_case("o'brien"), "O'Brien");
        assert_eq!(title_case("MOTÖRHEAD"), "Motörhead");
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            artist_title_from_path("ROCK MUSIC/80S/EUROPE-THE FINAL COUNTDOWN"),
            ("Europe".to_string(), "The Final Countdown".to_string())
        );
        assert_eq!(file_name("NO_FOLDER"), "NO_FOLDER");
    }

    #[test]
    fn test_display_metadata_prefers_catalog() {
        assert_eq!(
            display_metadata("ROCK MUSIC/X-Y", Some("Ozzy"), Some("Crazy Train")),
            ("Ozzy".to_string(), "Crazy Train".to_string())
        );
        assert_eq!(
            display_metadata("ROCK MUSIC/X-Y", Some("Ozzy"), None),
            ("X".to_string(), "Y".to_string())
        );
        assert_eq!(
            display_metadata("ROCK MUSIC/X-Y", Some(""), Some("T")),
            ("X".to_string(), "Y".to_string())
        );
    }
}
