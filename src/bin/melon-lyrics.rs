use clap::Parser;
use melon_lyrics::events::HarvestEventReceiver;
use melon_lyrics::{
    create_event_channel, Artist, ChromeDriver, ChromeSession, CsvRoster, DelayRange,
    HarvestConfig, HarvestEvent, Harvester, LyricStore, RosterStore, Strategy,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Environment variable overriding the default lyrics directory
const LYRICS_DIR_ENV: &str = "MELON_LYRICS_DIR";
const DEFAULT_LYRICS_DIR: &str = "lyrics";

/// Songs read per index page in `--test` mode unless overridden
const TEST_SONGS_PER_PAGE: usize = 3;

/// Melon lyrics harvester
#[derive(Parser)]
#[command(
    name = "melon-lyrics",
    about = "Harvest song lyrics for every artist in a roster from Melon",
    long_about = None
)]
struct Cli {
    /// How songs are harvested: inline, dom or html
    #[arg(long, default_value = "inline")]
    strategy: Strategy,

    /// Load detail pages in a second browser tab (dom and html strategies)
    #[arg(long)]
    dual_window: bool,

    /// Harvest one artist without saving and report timings
    #[arg(long, conflicts_with = "test")]
    profile: bool,

    /// Harvest a few songs per page of one artist and print their titles
    #[arg(long)]
    test: bool,

    /// Artist name to use with --profile or --test
    #[arg(long)]
    artist: Option<String>,

    /// Maximum number of songs read from each index page
    #[arg(long)]
    songs_per_page: Option<usize>,

    /// Roster CSV with artist,artist_id,crawled columns
    #[arg(long, default_value = "artist_id.csv")]
    roster: PathBuf,

    /// Root directory for lyric files [default: $MELON_LYRICS_DIR or "lyrics"]
    #[arg(long)]
    lyrics_dir: Option<PathBuf>,

    /// Crawl artists already marked as done as well
    #[arg(long)]
    all: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Seconds to wait for the page before giving up on a step
    #[arg(long, default_value = "3")]
    timeout_secs: u64,

    /// Lower bound of the pause between detail pages
    #[arg(long, default_value = "500")]
    min_delay_ms: u64,

    /// Upper bound of the pause between detail pages
    #[arg(long, default_value = "1500")]
    max_delay_ms: u64,

    /// Show detailed debug information
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn harvest_config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::from_env();
        config.strategy = self.strategy;
        config.songs_per_page = self.songs_per_page;
        config.wait.timeout = Duration::from_secs(self.timeout_secs);
        config.delay = Some(DelayRange::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        ));
        if self.test && config.songs_per_page.is_none() {
            config.songs_per_page = Some(TEST_SONGS_PER_PAGE);
        }
        config
    }

    fn lyrics_dir(&self) -> PathBuf {
        self.lyrics_dir
            .clone()
            .or_else(|| std::env::var_os(LYRICS_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LYRICS_DIR))
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Print harvest progress as it happens.
fn spawn_progress_printer(mut events: HarvestEventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(HarvestEvent::PageVisited {
                    page, page_count, ..
                }) => {
                    println!("📄 Index page {}/{page_count}", page + 1);
                }
                Ok(HarvestEvent::SongHarvested {
                    title,
                    has_lyric,
                    position,
                    total,
                    ..
                }) => {
                    let marker = if has_lyric { "🎵" } else { "🔇" };
                    match total {
                        Some(total) => println!("  {marker} [{position}/{total}] {title}"),
                        None => println!("  {marker} [{position}] {title}"),
                    }
                }
                Ok(HarvestEvent::SongFailed {
                    page, row, reason, ..
                }) => {
                    println!("  ⚠️  Skipped row {row} on page {}: {reason}", page + 1);
                }
                Ok(HarvestEvent::ArtistFinished { songs, saved, .. }) => {
                    println!("✅ {songs} songs harvested, {saved} lyrics written");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    log::debug!("Progress printer missed {missed} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn build_harvester(
    session: &ChromeSession,
    cli: &Cli,
) -> Result<Harvester<ChromeDriver>, Box<dyn std::error::Error>> {
    let config = cli.harvest_config();
    let mut harvester = Harvester::new(session.driver()?, config);
    if cli.dual_window {
        if cli.strategy.uses_song_ids() {
            harvester = harvester.with_detail_driver(session.driver()?);
        } else {
            log::warn!("--dual-window has no effect with the inline strategy");
        }
    }
    Ok(harvester)
}

async fn single_artist(
    cli: &Cli,
    roster: &CsvRoster,
) -> Result<Artist, Box<dyn std::error::Error>> {
    let name = cli
        .artist
        .as_deref()
        .ok_or("--artist is required with --profile and --test")?;
    Ok(roster.lookup(name).await?)
}

/// Harvest one artist without writing anything and print the titles found.
async fn run_test(
    cli: &Cli,
    harvester: &Harvester<ChromeDriver>,
    roster: &CsvRoster,
) -> Result<(), Box<dyn std::error::Error>> {
    let artist = single_artist(cli, roster).await?;
    println!(
        "🧪 Test harvest of {artist}, {} song(s) per page",
        harvester
            .config()
            .songs_per_page
            .unwrap_or(TEST_SONGS_PER_PAGE)
    );

    let result = harvester.harvest(&artist.id, None).await?;
    println!("{}", serde_json::to_string_pretty(&result.titles())?);
    println!("📊 {} songs, {} with lyrics", result.len(), result.with_lyrics());
    Ok(())
}

/// Harvest one artist without writing anything and report how long it took.
async fn run_profile(
    cli: &Cli,
    harvester: &Harvester<ChromeDriver>,
    roster: &CsvRoster,
) -> Result<(), Box<dyn std::error::Error>> {
    let artist = single_artist(cli, roster).await?;
    println!(
        "⏱️  Profiling {artist} with the {} strategy",
        harvester.config().strategy
    );

    let started = Instant::now();
    let result = harvester.harvest(&artist.id, None).await?;
    let elapsed = started.elapsed();

    println!("📊 {} songs in {:.2}s", result.len(), elapsed.as_secs_f64());
    if !result.is_empty() {
        println!(
            "   {:.0}ms per song",
            elapsed.as_millis() as f64 / result.len() as f64
        );
    }
    Ok(())
}

/// Harvest every artist of the roster and mark each one done once its lyrics
/// are on disk.
async fn run_crawl(
    cli: &Cli,
    harvester: &Harvester<ChromeDriver>,
    roster: &mut CsvRoster,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut artists = if cli.all {
        roster.read_all().await?
    } else {
        roster.read_pending().await?
    };
    // Marking an artist done covers every roster row with its name.
    let mut seen = HashSet::new();
    artists.retain(|artist| {
        let first = seen.insert(artist.name.clone());
        if !first {
            log::warn!("{artist} is listed more than once, crawling it once");
        }
        first
    });
    if artists.is_empty() {
        println!("🎉 Nothing to crawl, every artist is done");
        return Ok(());
    }

    let store = LyricStore::new(cli.lyrics_dir());
    println!(
        "🚀 Crawling {} artist(s) into {}",
        artists.len(),
        store.root().display()
    );

    let mut completed = 0usize;
    for (n, artist) in artists.iter().enumerate() {
        println!("\n🎤 [{}/{}] {artist}", n + 1, artists.len());

        let shelf = match store.open_artist(&artist.name) {
            Ok(shelf) => shelf,
            Err(e) => {
                log::error!("Cannot create lyrics directory for {artist}: {e}");
                continue;
            }
        };

        match harvester.harvest(&artist.id, Some(&shelf)).await {
            Ok(_) => {
                if let Err(e) = roster.mark_complete(&artist.name).await {
                    log::error!("Harvested {artist} but could not update the roster: {e}");
                    continue;
                }
                completed += 1;
            }
            Err(e) => {
                log::error!("Harvest of {artist} failed, moving on: {e}");
            }
        }
    }

    println!("\n🏁 {completed}/{} artist(s) completed", artists.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.verbose {
        println!("🔍 Verbose mode enabled");
    }

    let started = Instant::now();
    let mut roster = CsvRoster::new(&cli.roster);

    let session = match ChromeSession::launch(!cli.headed) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ Failed to launch Chrome: {e}");
            std::process::exit(1);
        }
    };

    let (sender, receiver) = create_event_channel();
    let printer = spawn_progress_printer(receiver);
    let harvester = build_harvester(&session, &cli)?.with_events(sender);

    let outcome = if cli.test {
        run_test(&cli, &harvester, &roster).await
    } else if cli.profile {
        run_profile(&cli, &harvester, &roster).await
    } else {
        run_crawl(&cli, &harvester, &mut roster).await
    };

    // Dropping the harvester closes the channel and stops the printer.
    drop(harvester);
    let _ = printer.await;

    println!("⏱️  Total time: {:.2}s", started.elapsed().as_secs_f64());

    if let Err(e) = outcome {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
    Ok(())
}
