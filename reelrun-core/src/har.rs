// ============================================================================
// reelrun-core/src/har.rs
// ============================================================================
//
// HAR CAPTURES: Stream URLs and Cookies From a Browser Network Log
//
// A HAR file saved from the browser's network panel lists every request of
// a streaming page. Main playlists look like `.../<video id>.m3u8` (with an
// optional query); `-manifest-` playlists are per-rendition and ignored.
// Analytics beacons carrying `title=` and `mediaResource=` name the episode
// behind a video id. Results are ordered by numeric video id, ready to feed
// the download pipeline as bare URLs.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult};

static MAIN_PLAYLIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)\.m3u8($|\?)").expect("Invalid playlist regex"));

static PLAYLIST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)\.m3u8").expect("Invalid playlist id regex"));

#[derive(Debug, Default, Deserialize)]
pub struct Har {
    #[serde(default)]
    log: HarLog,
}

#[derive(Debug, Default, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct HarEntry {
    #[serde(default)]
    request: HarRequest,
    #[serde(default)]
    response: HarResponse,
}

#[derive(Debug, Default, Deserialize)]
struct HarRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    headers: Vec<NameValue>,
    #[serde(default)]
    cookies: Vec<NameValue>,
}

#[derive(Debug, Default, Deserialize)]
struct HarResponse {
    #[serde(default)]
    headers: Vec<NameValue>,
}

#[derive(Debug, Default, Deserialize)]
struct NameValue {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

/// One video found in a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarEpisode {
    pub video_id: String,
    /// Main playlist URL, when the capture contains one
    pub url: Option<String>,
    pub title: Option<String>,
}

impl Har {
    pub fn from_json(text: &str) -> CoreResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidInput(format!("not a HAR capture: {e}")))
    }

    pub fn read(path: &Path) -> CoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CoreError::PathError(format!("Cannot read HAR file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    fn urls(&self) -> impl Iterator<Item = &str> {
        self.log.entries.iter().map(|e| e.request.url.as_str())
    }

    /// Episodes by numeric video id. The first title seen for an id wins;
    /// the last main playlist URL seen wins.
    pub fn episodes(&self) -> Vec<HarEpisode> {
        let mut found: HashMap<String, HarEpisode> = HashMap::new();
        for url in self.urls() {
            if url.contains("title=") && url.contains("mediaResource=") {
                if let Some(caps) = PLAYLIST_ID.captures(url) {
                    let episode = episode_mut(&mut found, &caps[1]);
                    if episode.title.is_none() {
                        episode.title = query_value(url, "title");
                    }
                }
            }
            if url.contains("-manifest-") {
                continue;
            }
            if let Some(caps) = MAIN_PLAYLIST.captures(url) {
                episode_mut(&mut found, &caps[1]).url = Some(url.to_string());
            }
        }

        let mut episodes: Vec<HarEpisode> = found.into_values().collect();
        episodes.sort_by(|a, b| {
            numeric_id(&a.video_id)
                .cmp(&numeric_id(&b.video_id))
                .then_with(|| a.video_id.cmp(&b.video_id))
        });
        episodes
    }

    /// Every cookie sent or set during the capture as a `Cookie` header
    /// value (`a=1; b=2`, sorted by name). Later values replace earlier ones.
    pub fn cookie_header(&self) -> Option<String> {
        let mut cookies: BTreeMap<String, String> = BTreeMap::new();
        for entry in &self.log.entries {
            for header in &entry.request.headers {
                if header.name.eq_ignore_ascii_case("cookie") {
                    for pair in header.value.split(';') {
                        if let Some((name, value)) = pair.split_once('=') {
                            insert_cookie(&mut cookies, name, value);
                        }
                    }
                }
            }
            for cookie in &entry.request.cookies {
                insert_cookie(&mut cookies, &cookie.name, &cookie.value);
            }
            for header in &entry.response.headers {
                if header.name.eq_ignore_ascii_case("set-cookie") {
                    let first = header.value.split(';').next().unwrap_or_default();
                    if let Some((name, value)) = first.split_once('=') {
                        insert_cookie(&mut cookies, name, value);
                    }
                }
            }
        }
        if cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = cookies.iter().map(|(n, v)| format!("{n}={v}")).collect();
        Some(pairs.join("; "))
    }
}

fn episode_mut<'a>(found: &'a mut HashMap<String, HarEpisode>, id: &str) -> &'a mut HarEpisode {
    found.entry(id.to_string()).or_insert_with(|| HarEpisode {
        video_id: id.to_string(),
        url: None,
        title: None,
    })
}

fn insert_cookie(cookies: &mut BTreeMap<String, String>, name: &str, value: &str) {
    let name = name.trim();
    if !name.is_empty() {
        cookies.insert(name.to_string(), value.trim().to_string());
    }
}

fn numeric_id(id: &str) -> u128 {
    id.parse().unwrap_or(u128::MAX)
}

/// Percent-decoded value of `key` in the query of `url`.
fn query_value(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = r#"{
      "log": {
        "entries": [
          {"request": {"url": "https://cdn.example.com/v/2002.m3u8?token=abc",
                       "headers": [{"name": "Cookie", "value": "sid=1; lang=es"}]}},
          {"request": {"url": "https://cdn.example.com/v/2002-manifest-720.m3u8"}},
          {"request": {"url": "https://stats.example.com/b?mediaResource=x/1001.m3u8&title=Episodio%201%3A%20Piloto"}},
          {"request": {"url": "https://cdn.example.com/v/1001.m3u8",
                       "cookies": [{"name": "sid", "value": "2"}]},
           "response": {"headers": [{"name": "Set-Cookie", "value": "cdn=z; Path=/; Secure"}]}},
          {"request": {"url": "https://cdn.example.com/v/poster.jpg"}}
        ]
      }
    }"#;

    #[test]
    fn test_episodes_sorted_with_titles() {
        let har = Har::from_json(CAPTURE).unwrap();
        let episodes = har.episodes();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].video_id, "1001");
        assert_eq!(episodes[0].title.as_deref(), Some("Episodio 1: Piloto"));
        assert_eq!(episodes[0].url.as_deref(), Some("https://cdn.example.com/v/1001.m3u8"));
        assert_eq!(episodes[1].video_id, "2002");
        assert_eq!(episodes[1].title, None);
        assert_eq!(
            episodes[1].url.as_deref(),
            Some("https://cdn.example.com/v/2002.m3u8?token=abc")
        );
    }

    #[test]
    fn test_cookie_header_merges_sources() {
        let har = Har::from_json(CAPTURE).unwrap();
        assert_eq!(har.cookie_header().as_deref(), Some("cdn=z; lang=es; sid=2"));
        assert_eq!(Har::default().cookie_header(), None);
    }

    #[test]
    fn test_rejects_non_har_input() {
        assert!(matches!(Har::from_json("not json"), Err(CoreError::InvalidInput(_))));
        assert!(Har::from_json("{}").unwrap().episodes().is_empty());
    }
}
