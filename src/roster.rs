//! Crawl progress across artists.
//!
//! The roster lists every artist to crawl with its Melon id and whether it
//! has been crawled. The harvester never touches it; the run loop reads the
//! pending artists up front and marks each one complete after its lyrics have
//! been saved.

use crate::{Artist, CrawlStatus, HarvestError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage of per-artist crawl progress
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Every artist, in roster order
    async fn read_all(&self) -> Result<Vec<Artist>>;

    /// Set the artist's status to done, on every entry with that name
    async fn mark_complete(&mut self, artist: &str) -> Result<()>;

    /// Artists not yet crawled, in roster order
    async fn read_pending(&self) -> Result<Vec<Artist>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|artist| !artist.is_done())
            .collect())
    }

    /// Look an artist up by name.
    async fn lookup(&self, name: &str) -> Result<Artist> {
        self.read_all()
            .await?
            .into_iter()
            .find(|artist| artist.name == name)
            .ok_or_else(|| HarvestError::UnknownArtist(name.to_string()))
    }
}

/// Roster kept in a CSV file with an `artist,artist_id,crawled` header.
///
/// Rows with only a name and an id are accepted and treated as not yet
/// crawled. Marking an artist complete rewrites every line naming that artist
/// and leaves every other byte of the file as it was.
#[derive(Debug, Clone)]
pub struct CsvRoster {
    path: PathBuf,
}

impl CsvRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(line: &str) -> Result<Option<csv::StringRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    fn artist_from_record(record: &csv::StringRecord) -> Option<Artist> {
        let name = record.get(0)?.trim();
        let id = record.get(1)?.trim();
        if name.is_empty() || id.is_empty() {
            return None;
        }
        Some(Artist {
            name: name.to_string(),
            id: id.to_string(),
            status: CrawlStatus::from_marker(record.get(2).unwrap_or("")),
        })
    }

    /// Re-encode a row with its status set to done.
    fn completed_line(record: &csv::StringRecord, terminator: &str) -> Result<String> {
        let mut fields: Vec<&str> = record.iter().collect();
        fields.resize(fields.len().max(3), "");
        fields[2] = CrawlStatus::DONE_MARKER;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&fields)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| HarvestError::Roster(e.to_string()))?;
        let encoded =
            String::from_utf8(bytes).map_err(|e| HarvestError::Roster(e.to_string()))?;
        Ok(format!("{}{terminator}", encoded.trim_end_matches(['\r', '\n'])))
    }
}

#[async_trait]
impl RosterStore for CsvRoster {
    async fn read_all(&self) -> Result<Vec<Artist>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let mut artists = Vec::new();
        for record in reader.records() {
            let record = record?;
            match Self::artist_from_record(&record) {
                Some(artist) => artists.push(artist),
                None => log::warn!("Skipping roster row {:?}", record),
            }
        }
        log::debug!(
            "Read {} artists from {}",
            artists.len(),
            self.path.display()
        );
        Ok(artists)
    }

    async fn mark_complete(&mut self, artist: &str) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let mut updated = String::with_capacity(contents.len() + 8);
        let mut found = false;

        for (line_number, line) in contents.split_inclusive('\n').enumerate() {
            let body = line.trim_end_matches(['\r', '\n']);
            let terminator = &line[body.len()..];

            // Header stays as it is. Every row listing the artist is marked.
            if line_number > 0 {
                if let Some(record) = Self::parse_line(body)? {
                    if record.get(0).map(str::trim) == Some(artist) {
                        updated.push_str(&Self::completed_line(&record, terminator)?);
                        found = true;
                        continue;
                    }
                }
            }
            updated.push_str(line);
        }

        if !found {
            return Err(HarvestError::UnknownArtist(artist.to_string()));
        }

        fs::write(&self.path, updated)?;
        log::info!("Marked {artist} complete in {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = "artist,artist_id,crawled\n\
                          아이유,261143,\n\
                          \"Crying Nut, The\",101,done\n\
                          X,42\r\n\
                          볼빨간사춘기,900000,\n";

    fn roster_file(contents: &str) -> (tempfile::TempDir, CsvRoster) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artist_id.csv");
        fs::write(&path, contents).unwrap();
        (dir, CsvRoster::new(path))
    }

    #[tokio::test]
    async fn test_read_all_and_pending() {
        let (_dir, roster) = roster_file(ROSTER);

        let all = roster.read_all().await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].name, "Crying Nut, The");
        assert!(all[1].is_done());
        assert_eq!(all[2].id, "42");
        assert_eq!(all[2].status, CrawlStatus::Pending);

        let pending: Vec<_> = roster
            .read_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(pending, vec!["아이유", "X", "볼빨간사춘기"]);
    }

    #[tokio::test]
    async fn test_mark_complete_is_selective() {
        let (_dir, mut roster) = roster_file(ROSTER);

        roster.mark_complete("X").await.unwrap();

        let contents = fs::read_to_string(roster.path()).unwrap();
        let expected = ROSTER.replace("X,42\r\n", "X,42,done\r\n");
        assert_eq!(contents, expected);
        assert!(roster.lookup("X").await.unwrap().is_done());
    }

    #[tokio::test]
    async fn test_mark_complete_keeps_quoting_of_other_rows() {
        let (_dir, mut roster) = roster_file(ROSTER);

        roster.mark_complete("아이유").await.unwrap();

        let contents = fs::read_to_string(roster.path()).unwrap();
        assert_eq!(contents, ROSTER.replace("아이유,261143,\n", "아이유,261143,done\n"));
        assert!(contents.contains("\"Crying Nut, The\",101,done\n"));
    }

    #[tokio::test]
    async fn test_mark_complete_covers_repeated_rows() {
        let roster_text = "artist,artist_id,crawled\n\
                           아이유,261143,\n\
                           X,42,\n\
                           아이유,261143\n";
        let (_dir, mut roster) = roster_file(roster_text);
        assert_eq!(roster.read_pending().await.unwrap().len(), 3);

        roster.mark_complete("아이유").await.unwrap();

        let pending: Vec<_> = roster
            .read_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(pending, vec!["X"]);
        assert_eq!(
            fs::read_to_string(roster.path()).unwrap(),
            "artist,artist_id,crawled\n아이유,261143,done\nX,42,\n아이유,261143,done\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_artist() {
        let (_dir, mut roster) = roster_file(ROSTER);

        assert!(matches!(
            roster.lookup("Nobody").await,
            Err(HarvestError::UnknownArtist(_))
        ));
        assert!(matches!(
            roster.mark_complete("Nobody").await,
            Err(HarvestError::UnknownArtist(_))
        ));
        assert_eq!(fs::read_to_string(roster.path()).unwrap(), ROSTER);
    }
}
