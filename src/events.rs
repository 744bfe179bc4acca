//! # Harvest Events
//!
//! This module provides a broadcast channel system for emitting progress events
//! while an artist is being harvested, so that a front end can report progress
//! without the harvester printing anything itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HarvestEvent {
    /// An index page has been read
    PageVisited {
        /// The timestamp when the page was processed
        timestamp: DateTime<Utc>,
        /// Melon artist id
        artist_id: String,
        /// 0-based page index
        page: u32,
        /// Number of index pages, as known after reading this page
        page_count: u32,
    },
    /// A song's title and lyric have been extracted
    SongHarvested {
        /// The timestamp when the song was extracted
        timestamp: DateTime<Utc>,
        /// Title the song was stored under
        title: String,
        /// Whether the song has an uploaded lyric
        has_lyric: bool,
        /// 1-based position among the songs harvested so far
        position: usize,
        /// Total number of songs, when known up front
        total: Option<usize>,
    },
    /// A song could not be extracted and was skipped
    SongFailed {
        /// The timestamp when the failure happened
        timestamp: DateTime<Utc>,
        /// Page and row index of the song
        page: u32,
        row: usize,
        /// Error message
        reason: String,
    },
    /// Every page of an artist has been processed
    ArtistFinished {
        /// The timestamp when the harvest ended
        timestamp: DateTime<Utc>,
        /// Melon artist id
        artist_id: String,
        /// Number of songs in the harvest result
        songs: usize,
        /// Number of lyric files written during the harvest
        saved: usize,
    },
}

/// A handle for receiving harvest events.
pub type HarvestEventReceiver = broadcast::Receiver<HarvestEvent>;

/// A handle for sending harvest events.
pub type HarvestEventSender = broadcast::Sender<HarvestEvent>;

/// Creates a new broadcast channel for harvest events.
///
/// The channel has a capacity of 256 events; slow receivers see
/// `RecvError::Lagged` rather than blocking the harvester.
pub fn create_event_channel() -> (HarvestEventSender, HarvestEventReceiver) {
    broadcast::channel(256)
}

/// Helper trait for emitting harvest events.
pub trait HarvestEventEmitter {
    fn emit_page_visited(&self, artist_id: &str, page: u32, page_count: u32);

    fn emit_song_harvested(&self, title: &str, has_lyric: bool, position: usize, total: Option<usize>);

    fn emit_song_failed(&self, page: u32, row: usize, reason: String);

    fn emit_artist_finished(&self, artist_id: &str, songs: usize, saved: usize);
}

impl HarvestEventEmitter for Option<HarvestEventSender> {
    fn emit_page_visited(&self, artist_id: &str, page: u32, page_count: u32) {
        if let Some(sender) = self {
            let event = HarvestEvent::PageVisited {
                timestamp: Utc::now(),
                artist_id: artist_id.to_string(),
                page,
                page_count,
            };
            let _ = sender.send(event); // Ignore send errors (no receivers)
        }
    }

    fn emit_song_harvested(&self, title: &str, has_lyric: bool, position: usize, total: Option<usize>) {
        if let Some(sender) = self {
            let event = HarvestEvent::SongHarvested {
                timestamp: Utc::now(),
                title: title.to_string(),
                has_lyric,
                position,
                total,
            };
            let _ = sender.send(event);
        }
    }

    fn emit_song_failed(&self, page: u32, row: usize, reason: String) {
        if let Some(sender) = self {
            let event = HarvestEvent::SongFailed {
                timestamp: Utc::now(),
                page,
                row,
                reason,
            };
            let _ = sender.send(event);
        }
    }

    fn emit_artist_finished(&self, artist_id: &str, songs: usize, saved: usize) {
        if let Some(sender) = self {
            let event = HarvestEvent::ArtistFinished {
                timestamp: Utc::now(),
                artist_id: artist_id.to_string(),
                songs,
                saved,
            };
            let _ = sender.send(event);
        }
    }
}
