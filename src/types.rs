//! Data types for artists, songs, and harvest results.

use crate::storage::validate_filename;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Suffix appended to a song title that collides with one already harvested
/// for the same artist. Applied repeatedly until the title is unique.
pub const DUPLICATE_SUFFIX: &str = "_dup";

/// Whether an artist has been fully crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrawlStatus {
    Pending,
    Done,
}

impl CrawlStatus {
    /// Marker written to the roster for a finished artist
    pub const DONE_MARKER: &'static str = "done";

    /// Interpret a roster status cell. Anything other than the completion
    /// marker, including an empty or missing cell, means not yet crawled.
    pub fn from_marker(marker: &str) -> Self {
        if marker.trim().eq_ignore_ascii_case(Self::DONE_MARKER) {
            CrawlStatus::Done
        } else {
            CrawlStatus::Pending
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            CrawlStatus::Pending => "",
            CrawlStatus::Done => Self::DONE_MARKER,
        }
    }
}

/// An artist listed in the roster.
///
/// # Examples
///
/// ```rust
/// use melon_lyrics::{Artist, CrawlStatus};
///
/// let artist = Artist {
///     name: "아이유".to_string(),
///     id: "261143".to_string(),
///     status: CrawlStatus::Pending,
/// };
///
/// assert_eq!(format!("{artist}"), "아이유 (261143)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artist {
    /// Display name, also used as the output directory name
    pub name: String,
    /// Numeric Melon artist id used to build the song index URL
    pub id: String,
    /// Crawl progress for this artist
    pub status: CrawlStatus,
}

impl Artist {
    pub fn is_done(&self) -> bool {
        self.status == CrawlStatus::Done
    }
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Title and lyric of one song as read from its detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongLyric {
    /// Song title with the page label removed
    pub title: String,
    /// Lyric text; empty when the song has no uploaded lyric
    pub lyric: String,
}

impl SongLyric {
    pub fn new(title: impl Into<String>, lyric: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lyric: lyric.into(),
        }
    }

    pub fn has_lyric(&self) -> bool {
        !self.lyric.is_empty()
    }
}

/// Insertion-ordered mapping from song title to lyric for one artist.
///
/// Titles are unique: inserting a title that is already present, or one whose
/// file name would clash with an existing entry's, stores it under the title
/// with [`DUPLICATE_SUFFIX`] appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestResult {
    entries: Vec<SongLyric>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    file_names: HashSet<String>,
}

impl HarvestResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a song and return the stored entry, whose title is the key it
    /// was stored under.
    pub fn insert(&mut self, song: SongLyric) -> &SongLyric {
        let mut title = song.title.clone();
        while self.index.contains_key(&title)
            || self.file_names.contains(&validate_filename(&title))
        {
            title.push_str(DUPLICATE_SUFFIX);
        }
        if title != song.title {
            log::debug!("Title '{}' already harvested, storing as '{title}'", song.title);
        }

        self.file_names.insert(validate_filename(&title));
        self.index.insert(title.clone(), self.entries.len());
        self.entries.push(SongLyric {
            title,
            lyric: song.lyric,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Lyric stored under `title`
    pub fn get(&self, title: &str) -> Option<&str> {
        self.index
            .get(title)
            .map(|&i| self.entries[i].lyric.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were harvested
    pub fn iter(&self) -> impl Iterator<Item = &SongLyric> {
        self.entries.iter()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.title.as_str()).collect()
    }

    /// Number of entries that carry a lyric
    pub fn with_lyrics(&self) -> usize {
        self.entries.iter().filter(|e| e.has_lyric()).count()
    }
}

impl<'a> IntoIterator for &'a HarvestResult {
    type Item = &'a SongLyric;
    type IntoIter = std::slice::Iter<'a, SongLyric>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
