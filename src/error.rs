use thiserror::Error;

/// Error types for lyric harvesting.
///
/// This enum covers everything that can go wrong while driving the browser,
/// reading the Melon pages, and writing results to disk.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use melon_lyrics::{ChromeSession, HarvestConfig, Harvester, HarvestError};
///
/// #[tokio::main]
/// async fn main() {
///     let session = ChromeSession::launch(true).unwrap();
///     let harvester = Harvester::new(session.driver().unwrap(), HarvestConfig::default());
///
///     match harvester.harvest("261143", None).await {
///         Ok(result) => println!("{} songs", result.len()),
///         Err(HarvestError::WaitTimeout { condition, .. }) => {
///             eprintln!("Page never settled while waiting for {}", condition);
///         }
///         Err(HarvestError::Structure(msg)) => eprintln!("Unexpected page layout: {}", msg),
///         Err(e) => eprintln!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Browser/automation errors.
    ///
    /// This includes a Chrome process that failed to launch, a tab that
    /// crashed, or a DevTools call that was rejected.
    #[error("Browser error: {0}")]
    Browser(String),

    /// A wait condition did not hold before the timeout elapsed.
    ///
    /// The page is rendered asynchronously, so every navigation is followed by
    /// a wait on some DOM condition. When that condition never holds the wait
    /// fails with this error.
    #[error("Timed out after {timeout_ms}ms waiting for {condition}")]
    WaitTimeout {
        /// Human readable description of the condition
        condition: String,
        /// How long the wait lasted before giving up
        timeout_ms: u64,
    },

    /// The page does not have the shape the harvester assumes.
    ///
    /// A container in the expected chain is missing, a title label does not
    /// carry the expected marker, or a song link does not match the known
    /// pattern. These are contract violations and are never retried.
    #[error("Unexpected page structure: {0}")]
    Structure(String),

    /// An artist name was not found in the roster.
    #[error("Artist not found in roster: {0}")]
    UnknownArtist(String),

    /// The roster file is malformed.
    #[error("Roster error: {0}")]
    Roster(String),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether this error is a wait that ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarvestError::WaitTimeout { .. })
    }
}
