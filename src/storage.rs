//! Writing harvested lyrics to disk.
//!
//! Lyrics are stored one file per song under `{root}/{artist}/`, named from
//! the song title by [`validate_filename`].

use crate::{HarvestResult, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of every lyric file
pub const LYRIC_EXTENSION: &str = ".txt";

/// Characters that are not allowed in a file or directory name on common
/// file systems.
const ILLEGAL_CHARS: [char; 9] = ['\\', '?', '/', ':', '*', '"', '|', '<', '>'];

/// Replacement for every illegal character
const SUBSTITUTE: char = '`';

/// Make a path component out of arbitrary text: spaces become underscores and
/// illegal characters become a backtick.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' => '_',
            c if ILLEGAL_CHARS.contains(&c) => SUBSTITUTE,
            c => c,
        })
        .collect()
}

/// Turn a song title into a safe lyric file name.
///
/// The result never contains an illegal character and always ends in
/// [`LYRIC_EXTENSION`]. Applying it to its own output changes nothing.
///
/// # Examples
///
/// ```rust
/// use melon_lyrics::storage::validate_filename;
///
/// assert_eq!(validate_filename("이유 / 너 하<나>야?"), "이유_`_너_하`나`야`.txt");
/// ```
pub fn validate_filename(title: &str) -> String {
    let mut name = sanitize_component(title);
    if !name.ends_with(LYRIC_EXTENSION) {
        name.push_str(LYRIC_EXTENSION);
    }
    name
}

/// Root directory of all harvested lyrics.
#[derive(Debug, Clone)]
pub struct LyricStore {
    root: PathBuf,
}

impl LyricStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one artist's lyrics
    pub fn artist_dir(&self, artist: &str) -> PathBuf {
        self.root.join(sanitize_component(artist))
    }

    /// Create the artist's directory if needed and return a writer for it.
    pub fn open_artist(&self, artist: &str) -> Result<ArtistLyrics> {
        let dir = self.artist_dir(artist);
        fs::create_dir_all(&dir)?;
        log::debug!("Writing lyrics for {artist} to {}", dir.display());
        Ok(ArtistLyrics { dir })
    }

    /// Write every non-empty lyric of a harvest result and return how many
    /// files were written.
    pub fn save_all(&self, artist: &str, result: &HarvestResult) -> Result<usize> {
        let shelf = self.open_artist(artist)?;
        let mut saved = 0;
        for song in result {
            if shelf.write(&song.title, &song.lyric)? {
                saved += 1;
            }
        }
        log::info!("Saved {saved} of {} lyrics for {artist}", result.len());
        Ok(saved)
    }
}

/// Writer for a single artist's lyric directory.
#[derive(Debug, Clone)]
pub struct ArtistLyrics {
    dir: PathBuf,
}

impl ArtistLyrics {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the lyric for `title` is written to
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(validate_filename(title))
    }

    /// Write one lyric as UTF-8. Empty lyrics are skipped and report `false`.
    pub fn write(&self, title: &str, lyric: &str) -> Result<bool> {
        if lyric.is_empty() {
            log::debug!("No lyric for '{title}', nothing written");
            return Ok(false);
        }
        fs::write(self.path_for(title), lyric.as_bytes())?;
        Ok(true)
    }
}
