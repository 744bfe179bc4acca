pub mod chrome;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod extract;
pub mod harvest;
pub mod roster;
pub mod storage;
pub mod types;
pub mod wait;

pub use chrome::{ChromeDriver, ChromeSession};
pub use config::{HarvestConfig, Strategy};
pub use driver::{NodeHandle, PageDriver};
pub use error::HarvestError;
pub use events::{
    create_event_channel, HarvestEvent, HarvestEventReceiver, HarvestEventSender,
};
pub use extract::{DomExtractor, HtmlExtractor, LyricExtractor};
pub use harvest::Harvester;
pub use roster::{CsvRoster, RosterStore};
pub use storage::{validate_filename, ArtistLyrics, LyricStore};
pub use types::{Artist, CrawlStatus, HarvestResult, SongLyric, DUPLICATE_SUFFIX};
pub use wait::{DelayRange, WaitConfig};

#[cfg(feature = "mock")]
pub use driver::MockPageDriver;

// Re-export scraper types for testing
pub use scraper::Html;

pub type Result<T> = std::result::Result<T, HarvestError>;
