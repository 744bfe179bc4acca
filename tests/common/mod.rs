#![allow(dead_code)]
//! A scripted stand-in for the Melon site, driven through [`PageDriver`].
//!
//! Every view change bumps a generation counter and handles carry the
//! generation they were issued in, so handles from a previous page report
//! stale exactly like detached DOM nodes do in a real browser.

use async_trait::async_trait;
use melon_lyrics::{HarvestConfig, HarvestError, NodeHandle, PageDriver, Result, WaitConfig};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// One song as listed on the index and shown on its detail page.
#[derive(Debug, Clone)]
pub struct FakeSong {
    pub id: String,
    pub title: String,
    /// `None` renders the "no lyric" placeholder
    pub lyric: Option<String>,
    /// Clicking the detail button of a broken song does nothing
    pub broken: bool,
    /// The detail page lacks both the lyric and its placeholder
    pub malformed: bool,
    /// The detail page never renders its title block
    pub untitled: bool,
    /// The detail page cannot be left with `back`
    pub stranded: bool,
}

impl FakeSong {
    pub fn new(id: &str, title: &str, lyric: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            lyric: Some(lyric.to_string()),
            broken: false,
            malformed: false,
            untitled: false,
            stranded: false,
        }
    }

    pub fn without_lyric(id: &str, title: &str) -> Self {
        Self {
            lyric: None,
            ..Self::new(id, title, "")
        }
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn malformed(mut self) -> Self {
        self.malformed = true;
        self
    }

    pub fn untitled(mut self) -> Self {
        self.untitled = true;
        self
    }

    pub fn stranded(mut self) -> Self {
        self.stranded = true;
        self
    }
}

/// Index pages of one artist.
#[derive(Debug, Clone)]
pub struct FakeSite {
    pub pages: Vec<Vec<FakeSong>>,
}

impl FakeSite {
    pub fn new(pages: Vec<Vec<FakeSong>>) -> Self {
        Self { pages }
    }

    /// `page_count` pages of `per_page` songs each, numbered from 1
    pub fn uniform(page_count: usize, per_page: usize) -> Self {
        let pages = (0..page_count)
            .map(|page| {
                (0..per_page)
                    .map(|row| {
                        let n = page * per_page + row + 1;
                        FakeSong::new(
                            &format!("{}", 1000 + n),
                            &format!("Song {n}"),
                            &format!("lyric {n}\nline two"),
                        )
                    })
                    .collect()
            })
            .collect();
        Self { pages }
    }

    fn song(&self, id: &str) -> Option<&FakeSong> {
        self.pages.iter().flatten().find(|song| song.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum View {
    Blank,
    Index(usize),
    Detail(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Row(usize),
    Button(usize),
    Pagination,
    PageLink(usize),
    SongName,
    WrapLyric,
    Lyric,
    LyricNone,
}

impl Node {
    fn encode(self) -> String {
        match self {
            Node::Row(i) => format!("row:{i}"),
            Node::Button(i) => format!("button:{i}"),
            Node::Pagination => "pagination".to_string(),
            Node::PageLink(i) => format!("link:{i}"),
            Node::SongName => "song_name".to_string(),
            Node::WrapLyric => "wrap_lyric".to_string(),
            Node::Lyric => "lyric".to_string(),
            Node::LyricNone => "lyric_none".to_string(),
        }
    }

    fn decode(s: &str) -> Option<Self> {
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => (kind, index.parse().ok()),
            None => (s, None),
        };
        Some(match (kind, index) {
            ("row", Some(i)) => Node::Row(i),
            ("button", Some(i)) => Node::Button(i),
            ("pagination", None) => Node::Pagination,
            ("link", Some(i)) => Node::PageLink(i),
            ("song_name", None) => Node::SongName,
            ("wrap_lyric", None) => Node::WrapLyric,
            ("lyric", None) => Node::Lyric,
            ("lyric_none", None) => Node::LyricNone,
            _ => return None,
        })
    }
}

/// What the fake browser was asked to do.
#[derive(Debug, Default, Clone)]
pub struct Activity {
    pub visited_urls: Vec<String>,
    pub pagination_clicks: usize,
    pub index_pages_shown: Vec<usize>,
    pub detail_clicks: usize,
}

#[derive(Debug)]
struct State {
    view: View,
    generation: u64,
    history: Vec<View>,
    activity: Activity,
}

/// A fake browser tab serving a [`FakeSite`].
///
/// Clones share the same tab.
#[derive(Debug, Clone)]
pub struct FakeMelon {
    site: Rc<FakeSite>,
    state: Rc<RefCell<State>>,
}

impl FakeMelon {
    pub fn new(site: FakeSite) -> Self {
        Self::on_site(Rc::new(site))
    }

    /// Another tab on the same site, with its own history and activity.
    pub fn second_tab(&self) -> Self {
        Self::on_site(Rc::clone(&self.site))
    }

    fn on_site(site: Rc<FakeSite>) -> Self {
        Self {
            site,
            state: Rc::new(RefCell::new(State {
                view: View::Blank,
                generation: 0,
                history: Vec::new(),
                activity: Activity::default(),
            })),
        }
    }

    pub fn activity(&self) -> Activity {
        self.state.borrow().activity.clone()
    }

    fn show(&self, view: View, remember: bool) {
        let mut state = self.state.borrow_mut();
        if remember {
            let previous = std::mem::replace(&mut state.view, view.clone());
            state.history.push(previous);
        } else {
            state.view = view.clone();
        }
        state.generation += 1;
        match view {
            View::Index(page) if remember => state.activity.index_pages_shown.push(page),
            _ => {}
        }
    }

    fn handle(&self, node: Node) -> NodeHandle {
        let generation = self.state.borrow().generation;
        NodeHandle::new(format!("{generation}/{}", node.encode()))
    }

    fn handles(&self, nodes: impl IntoIterator<Item = Node>) -> Vec<NodeHandle> {
        nodes.into_iter().map(|node| self.handle(node)).collect()
    }

    /// Decode a handle that must belong to the current page.
    fn live(&self, handle: &NodeHandle) -> Result<Node> {
        let (generation, node) = handle
            .as_str()
            .split_once('/')
            .and_then(|(g, n)| Some((g.parse::<u64>().ok()?, Node::decode(n)?)))
            .ok_or_else(|| HarvestError::Browser(format!("bad handle {handle}")))?;
        if generation != self.state.borrow().generation {
            return Err(HarvestError::Browser(format!("stale handle {handle}")));
        }
        Ok(node)
    }

    fn view(&self) -> View {
        self.state.borrow().view.clone()
    }

    fn current_page(&self) -> Option<&[FakeSong]> {
        match self.view() {
            View::Index(page) => self.site.pages.get(page).map(Vec::as_slice),
            _ => None,
        }
    }

    fn current_song(&self) -> Option<FakeSong> {
        match self.view() {
            View::Detail(id) => self.site.song(&id).cloned(),
            _ => None,
        }
    }

    /// Pages reachable from the pagination links of `page`, in link order.
    fn link_targets(&self, page: usize) -> Vec<usize> {
        (0..self.site.pages.len()).filter(|&p| p != page).collect()
    }

    fn detail_html(song: &FakeSong) -> String {
        let lyric = if song.malformed {
            String::new()
        } else {
            match &song.lyric {
                Some(lyric) => format!(
                    r#"<div class="lyric" id="d_video_summary"><!-- height:auto; -->{}</div>"#,
                    lyric.replace('\n', "<br>")
                ),
                None => r#"<div class="lyric_none"><p>가사 준비중</p></div>"#.to_string(),
            }
        };
        format!(
            r#"<html><head><title>{title}</title></head><body>
<div id="wrap"><div id="cont_wrap"><div id="conts">
  <div class="section_info"><div class="wrap_info"><div class="entry">
    <div class="info"><div class="song_name"><strong class="none">곡명</strong>
      {title}</div></div>
  </div></div></div>
  <div class="section_lyric"><div class="wrap_lyric">{lyric}</div></div>
</div></div></div>
</body></html>"#,
            title = song.title
        )
    }
}

#[async_trait(?Send)]
impl PageDriver for FakeMelon {
    async fn goto(&self, url: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .activity
            .visited_urls
            .push(url.to_string());
        let view = if url.contains("artistId=") {
            View::Index(0)
        } else if let Some((_, id)) = url.split_once("songId=") {
            View::Detail(id.to_string())
        } else {
            return Err(HarvestError::Browser(format!("unknown url {url}")));
        };
        self.show(view, true);
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let nodes: Vec<Node> = match (self.view(), selector) {
            (View::Index(_), "#pageList tbody tr") => {
                (0..self.current_page().map_or(0, |p| p.len())).map(Node::Row).collect()
            }
            (View::Index(_), ".btn_icon_detail") => {
                (0..self.current_page().map_or(0, |p| p.len())).map(Node::Button).collect()
            }
            (View::Index(_), ".page_num") if self.site.pages.len() > 1 => vec![Node::Pagination],
            (View::Index(page), ".page_num a") if self.site.pages.len() > 1 => {
                (0..self.link_targets(page).len()).map(Node::PageLink).collect()
            }
            (View::Detail(_), ".song_name") => match self.current_song() {
                Some(song) if song.untitled => Vec::new(),
                _ => vec![Node::SongName],
            },
            (View::Detail(_), ".wrap_lyric") => vec![Node::WrapLyric],
            _ => Vec::new(),
        };
        Ok(self.handles(nodes))
    }

    async fn query_within(&self, parent: &NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        let parent = self.live(parent)?;
        let song = self.current_song();
        let nodes = match (parent, selector, song) {
            (Node::Row(i), ".btn_icon_detail", _) => vec![Node::Button(i)],
            (Node::WrapLyric, ".lyric", Some(song)) if song.lyric.is_some() && !song.malformed => {
                vec![Node::Lyric]
            }
            (Node::WrapLyric, ".lyric_none", Some(song)) if song.lyric.is_none() && !song.malformed => {
                vec![Node::LyricNone]
            }
            _ => Vec::new(),
        };
        Ok(self.handles(nodes))
    }

    async fn text(&self, node: &NodeHandle) -> Result<String> {
        let node = self.live(node)?;
        let song = self.current_song();
        match (node, song) {
            (Node::SongName, Some(song)) => Ok(format!("곡명 {}", song.title)),
            (Node::Lyric, Some(song)) => Ok(song.lyric.unwrap_or_default()),
            (Node::LyricNone, Some(_)) => Ok("가사 준비중".to_string()),
            (node, _) => Err(HarvestError::Browser(format!("no text for {node:?}"))),
        }
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        let node = self.live(node)?;
        match (node, name) {
            (Node::Button(i), "href") => Ok(self.current_page().and_then(|songs| {
                songs
                    .get(i)
                    .map(|song| format!("javascript:melon.link.goSongDetail('{}');", song.id))
            })),
            _ => Ok(None),
        }
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        match self.live(node)? {
            Node::Button(i) => {
                self.state.borrow_mut().activity.detail_clicks += 1;
                let song = self
                    .current_page()
                    .and_then(|songs| songs.get(i).cloned())
                    .ok_or_else(|| HarvestError::Browser(format!("no row {i}")))?;
                if !song.broken {
                    self.show(View::Detail(song.id), true);
                }
                if song.stranded {
                    self.state.borrow_mut().history.clear();
                }
                Ok(())
            }
            Node::PageLink(i) => {
                let View::Index(page) = self.view() else {
                    return Err(HarvestError::Browser("not on an index page".to_string()));
                };
                let target = self.link_targets(page)[i];
                self.state.borrow_mut().activity.pagination_clicks += 1;
                self.show(View::Index(target), true);
                Ok(())
            }
            other => Err(HarvestError::Browser(format!("{other:?} is not clickable"))),
        }
    }

    async fn is_stale(&self, node: &NodeHandle) -> Result<bool> {
        Ok(self.live(node).is_err())
    }

    async fn back(&self) -> Result<()> {
        let previous = self.state.borrow_mut().history.pop();
        match previous {
            Some(view) => {
                self.show(view, false);
                Ok(())
            }
            None => Err(HarvestError::Browser("no history".to_string())),
        }
    }

    async fn page_source(&self) -> Result<String> {
        match self.current_song() {
            Some(song) => Ok(Self::detail_html(&song)),
            None => Ok("<html><body></body></html>".to_string()),
        }
    }
}

/// Configuration with short waits and no pauses.
pub fn quick_config() -> HarvestConfig {
    HarvestConfig {
        wait: WaitConfig {
            timeout: Duration::from_millis(40),
            poll_interval: Duration::from_millis(2),
        },
        delay: None,
        ..HarvestConfig::default()
    }
}
