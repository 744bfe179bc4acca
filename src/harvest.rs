//! Paginated traversal of an artist's song index.
//!
//! The index page lists songs in `#pageList`, one table row per song, with a
//! `.page_num` pagination block underneath when the artist has more than one
//! page. The pagination block holds a link for every page except the current
//! one, so after moving to page `n` the link for page `n + 1` sits at index
//! `n` of the link list.

use crate::config::{HarvestConfig, Strategy};
use crate::driver::{NodeHandle, PageDriver};
use crate::events::{HarvestEventEmitter, HarvestEventSender};
use crate::extract::{parse_song_id, LyricExtractor, SONG_NAME};
use crate::storage::ArtistLyrics;
use crate::wait::{presence_of, staleness_of};
use crate::{HarvestError, HarvestResult, Result, SongLyric};

pub(crate) const ROW_LIST: &str = "#pageList tbody tr";
pub(crate) const DETAIL_BUTTON: &str = ".btn_icon_detail";
pub(crate) const PAGINATION: &str = ".page_num";
pub(crate) const PAGINATION_LINKS: &str = ".page_num a";

/// Accumulated state while one artist is being harvested.
struct Progress<'s> {
    result: HarvestResult,
    song_ids: Vec<String>,
    sink: Option<&'s ArtistLyrics>,
    saved: usize,
    detail_loads: usize,
}

impl<'s> Progress<'s> {
    fn new(sink: Option<&'s ArtistLyrics>) -> Self {
        Self {
            result: HarvestResult::new(),
            song_ids: Vec::new(),
            sink,
            saved: 0,
            detail_loads: 0,
        }
    }
}

/// Harvests every song of an artist from the Melon song index.
///
/// The harvester owns the browser tab for the duration of a run and drives it
/// strictly sequentially: every navigation or click is followed by a wait on a
/// DOM condition before the next step.
///
/// # Examples
///
/// ```rust,no_run
/// use melon_lyrics::{ChromeSession, HarvestConfig, Harvester, LyricStore, Strategy};
///
/// #[tokio::main]
/// async fn main() -> melon_lyrics::Result<()> {
///     let session = ChromeSession::launch(true)?;
///     let config = HarvestConfig {
///         strategy: Strategy::Html,
///         ..HarvestConfig::default()
///     };
///     let harvester = Harvester::new(session.driver()?, config);
///
///     let store = LyricStore::new("lyrics");
///     let shelf = store.open_artist("아이유")?;
///     let result = harvester.harvest("261143", Some(&shelf)).await?;
///     println!("{} songs harvested", result.len());
///     Ok(())
/// }
/// ```
pub struct Harvester<D: PageDriver> {
    driver: D,
    detail_driver: Option<D>,
    config: HarvestConfig,
    extractor: Box<dyn LyricExtractor>,
    events: Option<HarvestEventSender>,
}

impl<D: PageDriver> Harvester<D> {
    /// Create a harvester driving `driver`, with the extractor picked by the
    /// configured strategy.
    pub fn new(driver: D, config: HarvestConfig) -> Self {
        let extractor = config.strategy.extractor();
        Self {
            driver,
            detail_driver: None,
            config,
            extractor,
            events: None,
        }
    }

    /// Load detail pages in a second tab, leaving the index tab untouched.
    ///
    /// Only the id-collecting strategies visit detail pages by URL; the inline
    /// strategy ignores the second tab.
    pub fn with_detail_driver(mut self, detail_driver: D) -> Self {
        self.detail_driver = Some(detail_driver);
        self
    }

    /// Emit progress events on `sender`.
    pub fn with_events(mut self, sender: HarvestEventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest all songs of an artist.
    ///
    /// When `sink` is given each lyric is written as soon as it is extracted;
    /// empty lyrics are kept in the result but never written.
    ///
    /// # Errors
    ///
    /// With the id-collecting strategies any wait timeout or structural error
    /// stops the harvest. The inline strategy logs and skips songs whose
    /// detail view fails, and only fails on errors while paging the index or
    /// when the index cannot be restored after a detail view.
    pub async fn harvest(
        &self,
        artist_id: &str,
        sink: Option<&ArtistLyrics>,
    ) -> Result<HarvestResult> {
        log::info!(
            "Harvesting artist {artist_id} with the {} strategy ({} extractor)",
            self.config.strategy,
            self.extractor.name()
        );
        let mut progress = Progress::new(sink);

        self.driver.goto(&self.config.artist_url(artist_id)).await?;
        presence_of(&self.driver, ROW_LIST, &self.config.wait).await?;

        let pages = self.traverse(artist_id, &mut progress).await?;

        if self.config.strategy.uses_song_ids() {
            log::info!(
                "Collected {} song ids from {pages} page(s)",
                progress.song_ids.len()
            );
            self.harvest_details(&mut progress).await?;
        }

        log::info!(
            "Finished artist {artist_id}: {} songs, {} with lyrics, {} written",
            progress.result.len(),
            progress.result.with_lyrics(),
            progress.saved
        );
        self.events
            .emit_artist_finished(artist_id, progress.result.len(), progress.saved);
        Ok(progress.result)
    }

    /// Walk every index page, reading each one, and return the number of pages
    /// visited.
    async fn traverse(&self, artist_id: &str, progress: &mut Progress<'_>) -> Result<u32> {
        let mut page_index = 0usize;

        loop {
            let has_pagination = self.driver.query_one(PAGINATION).await?.is_some();
            self.read_index_page(page_index as u32, has_pagination, progress)
                .await?;

            // Pagination is only trusted while the index itself is showing.
            presence_of(&self.driver, ROW_LIST, &self.config.wait).await?;

            if self.driver.query_one(PAGINATION).await?.is_none() {
                log::debug!("No pagination control, single index page");
                self.events.emit_page_visited(artist_id, 0, 1);
                return Ok(1);
            }

            // Every page except the current one is a link.
            let links = self.driver.query(PAGINATION_LINKS).await?;
            let page_count = links.len() + 1;
            log::debug!("Read index page {}/{page_count}", page_index + 1);
            self.events
                .emit_page_visited(artist_id, page_index as u32, page_count as u32);

            if page_index + 1 >= page_count {
                return Ok(page_count as u32);
            }

            let next_page = &links[page_index];
            self.driver.click(next_page).await?;
            staleness_of(&self.driver, next_page, &self.config.wait).await?;
            presence_of(&self.driver, ROW_LIST, &self.config.wait).await?;
            page_index += 1;
        }
    }

    /// Number of rows to read from a page holding `rows` rows
    fn row_count(&self, rows: usize) -> usize {
        match self.config.songs_per_page {
            Some(cap) => rows.min(cap),
            None => rows,
        }
    }

    async fn read_index_page(
        &self,
        page: u32,
        has_pagination: bool,
        progress: &mut Progress<'_>,
    ) -> Result<()> {
        match self.config.strategy {
            Strategy::Inline => self.harvest_page_inline(page, has_pagination, progress).await,
            Strategy::Dom | Strategy::Html => {
                let ids = self.collect_song_ids(page).await?;
                progress.song_ids.extend(ids);
                Ok(())
            }
        }
    }

    /// Read the song id behind every row of the current index page.
    async fn collect_song_ids(&self, page: u32) -> Result<Vec<String>> {
        let rows = self.driver.query(ROW_LIST).await?;
        let count = self.row_count(rows.len());
        let mut ids = Vec::with_capacity(count);

        for (row_index, row) in rows.iter().take(count).enumerate() {
            let button = self.detail_button(row, page, row_index).await?;
            let href = self
                .driver
                .attribute(&button, "href")
                .await?
                .ok_or_else(|| {
                    HarvestError::Structure(format!(
                        "detail button of row {row_index} on page {page} has no href"
                    ))
                })?;
            let song_id = parse_song_id(&href).ok_or_else(|| {
                HarvestError::Structure(format!(
                    "row {row_index} on page {page} links to '{href}', not a song detail"
                ))
            })?;
            ids.push(song_id);
        }

        log::debug!("Page {page}: {} song ids", ids.len());
        Ok(ids)
    }

    async fn detail_button(
        &self,
        row: &NodeHandle,
        page: u32,
        row_index: usize,
    ) -> Result<NodeHandle> {
        self.driver
            .query_one_within(row, DETAIL_BUTTON)
            .await?
            .ok_or_else(|| {
                HarvestError::Structure(format!(
                    "row {row_index} on page {page} has no '{DETAIL_BUTTON}'"
                ))
            })
    }

    /// Open every row's detail view in place. Failing rows are skipped.
    async fn harvest_page_inline(
        &self,
        page: u32,
        has_pagination: bool,
        progress: &mut Progress<'_>,
    ) -> Result<()> {
        let rows = self.driver.query(ROW_LIST).await?.len();
        let count = self.row_count(rows);

        for row_index in 0..count {
            self.pause_before_detail(progress).await;
            // Outer error: the index is gone and the page cannot continue.
            match self
                .harvest_row_inline(page, row_index, has_pagination)
                .await?
            {
                Ok(song) => self.record(song, progress, None)?,
                Err(e) => {
                    log::warn!("Skipping row {row_index} on page {page}: {e}");
                    self.events.emit_song_failed(page, row_index, e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Read one row's detail view and come back to the index.
    ///
    /// The inner result is the row's own outcome. Once the click has left the
    /// index, the index is restored before that outcome is returned; failing
    /// to restore it is the outer error.
    async fn harvest_row_inline(
        &self,
        page: u32,
        row_index: usize,
        has_pagination: bool,
    ) -> Result<Result<SongLyric>> {
        let button = match self.open_detail(page, row_index).await {
            Ok(button) => button,
            Err(e) => return Ok(Err(e)),
        };

        let song = match presence_of(&self.driver, SONG_NAME, &self.config.wait).await {
            Ok(_) => self.extractor.extract(&self.driver).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.restore_index(page, has_pagination).await {
            log::error!("Lost index page {page} after opening row {row_index} ({button}): {e}");
            return Err(e);
        }
        Ok(song)
    }

    /// Click a row's detail control and wait until the index is replaced.
    async fn open_detail(&self, page: u32, row_index: usize) -> Result<NodeHandle> {
        // Going back re-renders the list, so rows are looked up fresh each time.
        let rows = self.driver.query(ROW_LIST).await?;
        let row = rows.get(row_index).ok_or_else(|| {
            HarvestError::Structure(format!("row {row_index} on page {page} disappeared"))
        })?;
        let button = self.detail_button(row, page, row_index).await?;

        self.driver.click(&button).await?;
        staleness_of(&self.driver, &button, &self.config.wait).await?;
        Ok(button)
    }

    async fn restore_index(&self, page: u32, has_pagination: bool) -> Result<()> {
        self.driver.back().await?;
        presence_of(&self.driver, ROW_LIST, &self.config.wait).await?;
        presence_of(&self.driver, DETAIL_BUTTON, &self.config.wait).await?;
        if has_pagination {
            presence_of(&self.driver, PAGINATION, &self.config.wait).await?;
        }
        log::debug!("Back on index page {page}");
        Ok(())
    }

    /// Load every collected song id and extract it.
    async fn harvest_details(&self, progress: &mut Progress<'_>) -> Result<()> {
        let driver = self.detail_driver.as_ref().unwrap_or(&self.driver);
        let song_ids = std::mem::take(&mut progress.song_ids);
        let total = song_ids.len();

        for song_id in &song_ids {
            self.pause_before_detail(progress).await;
            driver.goto(&self.config.song_url(song_id)).await?;
            presence_of(driver, SONG_NAME, &self.config.wait).await?;

            let song = self.extractor.extract(driver).await?;
            self.record(song, progress, Some(total))?;
        }
        Ok(())
    }

    async fn pause_before_detail(&self, progress: &mut Progress<'_>) {
        if progress.detail_loads > 0 {
            if let Some(delay) = &self.config.delay {
                delay.pause().await;
            }
        }
        progress.detail_loads += 1;
    }

    /// Store a song in the result and write it out if a sink is attached.
    fn record(
        &self,
        song: SongLyric,
        progress: &mut Progress<'_>,
        total: Option<usize>,
    ) -> Result<()> {
        let stored = progress.result.insert(song).clone();
        if let Some(sink) = progress.sink {
            if sink.write(&stored.title, &stored.lyric)? {
                progress.saved += 1;
            }
        }
        self.events.emit_song_harvested(
            &stored.title,
            stored.has_lyric(),
            progress.result.len(),
            total,
        );
        Ok(())
    }
}
