//! Title and lyric extraction from Melon song detail pages.
//!
//! Two interchangeable extractors read the same data:
//!
//! - [`DomExtractor`] queries the live page through the [`PageDriver`].
//! - [`HtmlExtractor`] takes the rendered page source once and parses it with
//!   `scraper`, descending through the fixed chain of containers the detail
//!   page is built from.
//!
//! Both report a song without an uploaded lyric as an empty lyric rather than
//! an error, as long as the page shows the "no lyric" placeholder.

use crate::config::Strategy;
use crate::driver::{NodeHandle, PageDriver};
use crate::{HarvestError, Result, SongLyric};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Label Melon prints in front of every song title
pub const TITLE_LABEL: &str = "곡명";

pub(crate) const SONG_NAME: &str = ".song_name";
pub(crate) const WRAP_LYRIC: &str = ".wrap_lyric";
pub(crate) const LYRIC: &str = ".lyric";
pub(crate) const LYRIC_NONE: &str = ".lyric_none";

/// Container chain from the document root to the main content block
const CONTENT_CHAIN: [&str; 3] = ["div#wrap", "div#cont_wrap", "div#conts"];
/// Container chain from the content block to the title node
const TITLE_CHAIN: [&str; 4] = [
    "div.section_info",
    "div.wrap_info",
    "div.entry",
    "div.song_name",
];
/// Container chain from the content block to the lyric wrapper
const LYRIC_CHAIN: [&str; 2] = ["div.section_lyric", "div.wrap_lyric"];

/// Pattern of the `href` on an index row's detail button
const SONG_LINK_PATTERN: &str = r"^javascript:melon\.link\.goSongDetail\('(?P<id>\d+)'\);";

/// Extract the numeric song id from a detail button's `href`.
///
/// # Examples
///
/// ```rust
/// use melon_lyrics::extract::parse_song_id;
///
/// assert_eq!(
///     parse_song_id("javascript:melon.link.goSongDetail('30244931');"),
///     Some("30244931".to_string())
/// );
/// assert_eq!(parse_song_id("javascript:void(0);"), None);
/// ```
pub fn parse_song_id(href: &str) -> Option<String> {
    let pattern = Regex::new(SONG_LINK_PATTERN).unwrap();
    pattern
        .captures(href.trim())
        .and_then(|caps| caps.name("id"))
        .map(|id| id.as_str().to_string())
}

/// Strip the [`TITLE_LABEL`] from rendered title text when it is present.
///
/// The label is often hidden with CSS, so text read from the live page may or
/// may not include it.
pub fn strip_title_label(text: &str) -> String {
    let text = text.trim();
    match text.strip_prefix(TITLE_LABEL) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            rest.trim().to_string()
        }
        _ => text.to_string(),
    }
}

/// A way of reading title and lyric from the detail page currently loaded in
/// a driver.
#[async_trait(?Send)]
pub trait LyricExtractor {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the song title and lyric from the loaded page.
    async fn extract(&self, driver: &dyn PageDriver) -> Result<SongLyric>;
}

impl Strategy {
    /// Extractor used for detail pages under this strategy
    pub fn extractor(&self) -> Box<dyn LyricExtractor> {
        match self {
            Strategy::Inline | Strategy::Dom => Box::new(DomExtractor),
            Strategy::Html => Box::new(HtmlExtractor),
        }
    }
}

/// Reads title and lyric by querying the live document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomExtractor;

impl DomExtractor {
    async fn required(driver: &dyn PageDriver, selector: &str) -> Result<NodeHandle> {
        driver.query_one(selector).await?.ok_or_else(|| {
            HarvestError::Structure(format!("no '{selector}' element on detail page"))
        })
    }
}

#[async_trait(?Send)]
impl LyricExtractor for DomExtractor {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn extract(&self, driver: &dyn PageDriver) -> Result<SongLyric> {
        let song_name = Self::required(driver, SONG_NAME).await?;
        let title = strip_title_label(&driver.text(&song_name).await?);

        let wrap = Self::required(driver, WRAP_LYRIC).await?;
        let lyric = match driver.query_one_within(&wrap, LYRIC).await? {
            Some(lyric) => driver.text(&lyric).await?.trim().to_string(),
            None => {
                // No uploaded lyric; the placeholder must be there instead.
                if driver.query_one_within(&wrap, LYRIC_NONE).await?.is_none() {
                    return Err(HarvestError::Structure(format!(
                        "'{title}' has neither '{LYRIC}' nor '{LYRIC_NONE}'"
                    )));
                }
                String::new()
            }
        };

        log::debug!("Extracted '{title}' ({} chars of lyric)", lyric.len());
        Ok(SongLyric { title, lyric })
    }
}

/// Reads title and lyric from the rendered page source.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

#[async_trait(?Send)]
impl LyricExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    async fn extract(&self, driver: &dyn PageDriver) -> Result<SongLyric> {
        let source = driver.page_source().await?;
        let document = Html::parse_document(&source);
        parse_song_detail(&document)
    }
}

/// Follow `chain` from `from`, taking the first match of each step.
fn descend<'a>(from: ElementRef<'a>, chain: &[&str]) -> Result<ElementRef<'a>> {
    let mut current = from;
    for step in chain {
        let selector = Selector::parse(step).unwrap();
        current = current.select(&selector).next().ok_or_else(|| {
            HarvestError::Structure(format!(
                "missing '{step}' in container chain {}",
                chain.join(" > ")
            ))
        })?;
    }
    Ok(current)
}

/// Text of an element with `<br>` rendered as line breaks and every line
/// trimmed.
fn lyric_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(e) if e.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Parse a song detail page.
///
/// The page must contain `div#wrap > div#cont_wrap > div#conts`; under it the
/// title lives in `div.section_info > div.wrap_info > div.entry > div.song_name`
/// and starts with the [`TITLE_LABEL`] token, and the lyric wrapper
/// `div.section_lyric > div.wrap_lyric` holds either `div.lyric` or the
/// `div.lyric_none` placeholder. Anything else is a structural error.
pub fn parse_song_detail(document: &Html) -> Result<SongLyric> {
    let conts = descend(document.root_element(), &CONTENT_CHAIN)?;

    let song_name = descend(conts, &TITLE_CHAIN)?;
    let title_text = song_name.text().collect::<String>();
    let mut tokens = title_text.split_whitespace();
    match tokens.next() {
        Some(TITLE_LABEL) => {}
        other => {
            return Err(HarvestError::Structure(format!(
                "title node starts with {other:?}, expected '{TITLE_LABEL}'"
            )))
        }
    }
    let title = tokens.collect::<Vec<_>>().join(" ");

    let wrap_lyric = descend(conts, &LYRIC_CHAIN)?;
    let lyric_selector = Selector::parse("div.lyric").unwrap();
    let lyric = match wrap_lyric.select(&lyric_selector).next() {
        Some(lyric) => lyric_text(lyric),
        None => {
            let none_selector = Selector::parse("div.lyric_none").unwrap();
            if wrap_lyric.select(&none_selector).next().is_none() {
                return Err(HarvestError::Structure(format!(
                    "'{title}' has neither 'div.lyric' nor 'div.lyric_none'"
                )));
            }
            String::new()
        }
    };

    log::debug!("Parsed '{title}' ({} chars of lyric)", lyric.len());
    Ok(SongLyric { title, lyric })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_song_id_requires_known_prefix() {
        assert_eq!(
            parse_song_id("javascript:melon.link.goSongDetail('8001');"),
            Some("8001".to_string())
        );
        assert_eq!(
            parse_song_id("xjavascript:melon.link.goSongDetail('8001');"),
            None
        );
        assert_eq!(parse_song_id("javascript:melon.link.goSongDetail('abc');"), None);
    }

    #[test]
    fn test_strategy_picks_extractor() {
        assert_eq!(Strategy::Inline.extractor().name(), "dom");
        assert_eq!(Strategy::Dom.extractor().name(), "dom");
        assert_eq!(Strategy::Html.extractor().name(), "html");
    }

    #[test]
    fn test_strip_title_label() {
        assert_eq!(strip_title_label("곡명 밤편지"), "밤편지");
        assert_eq!(strip_title_label("  밤편지 "), "밤편지");
        assert_eq!(strip_title_label("곡명은 비밀"), "곡명은 비밀");
    }

    #[test]
    fn test_lyric_text_renders_line_breaks() {
        let document = Html::parse_fragment(
            r#"<div class="lyric"><!-- expand -->
                이 밤 그날의 반딧불을<br>당신의 창 가까이 보낼게요<br/>음<br></div>"#,
        );
        let selector = Selector::parse("div.lyric").unwrap();
        let lyric = document.select(&selector).next().unwrap();

        assert_eq!(
            lyric_text(lyric),
            "이 밤 그날의 반딧불을\n당신의 창 가까이 보낼게요\n음"
        );
    }

    #[test]
    fn test_title_label_mismatch_is_structural() {
        let document = Html::parse_document(
            r#"<div id="wrap"><div id="cont_wrap"><div id="conts">
                <div class="section_info"><div class="wrap_info"><div class="entry">
                <div class="song_name">Title 밤편지</div></div></div></div>
            </div></div></div>"#,
        );

        match parse_song_detail(&document) {
            Err(HarvestError::Structure(msg)) => assert!(msg.contains("Title")),
            other => panic!("Expected structure error, got: {other:?}"),
        }
    }
}
