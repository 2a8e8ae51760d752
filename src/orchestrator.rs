//! Stash orchestrator. Owns the service bundle and the busy guard, resolves
//! the stash home, and drives the four operations: stash a window, stash the
//! selected tabs, unstash a bookmark, unstash a folder.

use crate::browser::Browser;
use crate::codec;
use crate::config::Config;
use crate::containers;
use crate::directory::{FolderDirectory, StashFolder};
use crate::guard::{OpGuard, OpKind};
use crate::relations;
use crate::schema;
use crate::types::{
    CreateNode, HomeKind, Node, NodeId, NodeKind, ProtoTab, StashHome, StashableTab, Tab, TabId,
    Window, WindowId,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::form_urlencoded;

const HOME_ID_KEY: &str = "stash_home_id";

// ==== requests ====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Stash a whole window into a new or reused stash folder.
    Stash {
        window_id: WindowId,
        #[serde(default)]
        name: Option<String>,
    },
    /// Stash the focused window's selected tabs at `node_id`: a folder
    /// receives them at its head, a bookmark just before itself.
    StashSelected { node_id: NodeId },
    /// Reopen a bookmark as a tab, or a folder as a window.
    Unstash {
        node_id: NodeId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_remove")]
        remove: bool,
    },
}

fn default_remove() -> bool {
    true
}

#[derive(Debug, Clone)]
pub enum Response {
    Stashed { folder: Node },
    TabsStashed { folder: Node, count: usize },
    TabOpened { tab: Tab },
    WindowOpened { window: Window },
}

pub struct Orchestrator {
    browser: Browser,
    config: Config,
    guard: OpGuard,
    home: OnceCell<StashHome>,
}

impl Orchestrator {
    pub fn new(browser: Browser, config: Config) -> Self {
        Self {
            browser,
            config,
            guard: OpGuard::new(),
            home: OnceCell::new(),
        }
    }

    pub fn guard(&self) -> &OpGuard {
        &self.guard
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::Stash { window_id, name } => {
                let folder = self.stash_window(window_id, name).await?;
                Ok(Response::Stashed { folder })
            }
            Request::StashSelected { node_id } => {
                let (folder, count) = self.stash_selected(&node_id).await?;
                Ok(Response::TabsStashed { folder, count })
            }
            Request::Unstash {
                node_id,
                name,
                remove,
            } => {
                if self.browser.bookmarks.is_root(&node_id) {
                    return Err(anyhow!("cannot unstash a root"));
                }
                let node = self.browser.bookmarks.node(&node_id).await?;
                match node.kind {
                    NodeKind::Bookmark => {
                        let tab = self.unstash_bookmark(node, remove).await?;
                        Ok(Response::TabOpened { tab })
                    }
                    NodeKind::Folder => {
                        let window = self.unstash_folder(node, name, remove).await?;
                        Ok(Response::WindowOpened { window })
                    }
                    NodeKind::Separator => Err(anyhow!("cannot unstash a separator")),
                }
            }
        }
    }

    // ==== affordances ====

    /// Whether tabs may be stashed at `node_id` from `window_id` right now.
    pub async fn can_stash_here(&self, node_id: &NodeId, window_id: WindowId) -> Result<bool> {
        let node = self.browser.bookmarks.node(node_id).await?;
        Ok(self.guard.can_stash_here(&node, window_id))
    }

    /// Whether `node_id` may be unstashed right now.
    pub async fn can_unstash(&self, node_id: &NodeId) -> Result<bool> {
        let node = self.browser.bookmarks.node(node_id).await?;
        Ok(self.guard.can_unstash(
            &node,
            self.browser.bookmarks.is_root(node_id),
            self.browser.windows.private_allowed(),
        ))
    }

    /// Current stash folders, newest first, with bookmark counts.
    pub async fn stash_folders(&self) -> Result<Vec<StashFolder>> {
        let home = self.stash_home().await?;
        let bookmarks = self.browser.bookmarks.as_ref();
        let mut directory =
            FolderDirectory::load(bookmarks, home, self.browser.windows.private_allowed()).await?;
        directory.count_bookmarks(bookmarks).await;
        Ok(directory.into_folders())
    }

    // ==== stash home ====

    /// The folder stash folders live under. Resolved once and cached, with
    /// the id also kept in the session store so a restart skips the search.
    pub async fn stash_home(&self) -> Result<&StashHome> {
        self.home.get_or_try_init(|| self.resolve_home()).await
    }

    async fn resolve_home(&self) -> Result<StashHome> {
        let kind = if self.config.home_folder.is_some() {
            HomeKind::Subfolder
        } else {
            HomeKind::Root
        };
        if let Some(cached) = self.browser.session.get(HOME_ID_KEY).await? {
            if self.browser.bookmarks.node(&cached).await.is_ok() {
                return Ok(StashHome { id: cached, kind });
            }
            debug!("cached stash home {cached} is gone, resolving again");
        }
        let id = match &self.config.home_folder {
            None => self.config.home_root.clone(),
            Some(title) => {
                let children = self
                    .browser
                    .bookmarks
                    .children(&self.config.home_root)
                    .await
                    .context("failed to list the home root")?;
                match children
                    .into_iter()
                    .find(|node| node.is_folder() && node.title == *title)
                {
                    Some(node) => node.id,
                    // find-then-create is not atomic; concurrent resolvers
                    // may leave a duplicate folder behind
                    None => {
                        self.browser
                            .bookmarks
                            .create(CreateNode::folder(self.config.home_root.clone(), title))
                            .await
                            .context("failed to create the stash home folder")?
                            .id
                    }
                }
            }
        };
        self.browser.session.set(HOME_ID_KEY, &id).await?;
        Ok(StashHome { id, kind })
    }

    // ==== stash ====

    /// Stash every tab of `window_id` into one folder and close the window.
    /// Returns the folder.
    pub async fn stash_window(&self, window_id: WindowId, name: Option<String>) -> Result<Node> {
        let mut window_busy = Some(self.guard.acquire(OpKind::Stash, window_id));
        let window = self.browser.windows.get(window_id, true).await?;
        let tabs = window.tabs.clone();
        if tabs.is_empty() {
            return Err(anyhow!("window {window_id} has no tabs"));
        }
        let name = name
            .filter(|name| !name.is_empty())
            .or_else(|| window.name.clone().filter(|name| !name.is_empty()))
            .unwrap_or_else(|| codec::default_stash_name(Utc::now()));

        let home = self.stash_home().await?;
        let bookmarks = self.browser.bookmarks.as_ref();
        let mut directory =
            FolderDirectory::load(bookmarks, home, self.browser.windows.private_allowed()).await?;
        let reusable = directory
            .find_bookmarkless_by_title(bookmarks, &self.guard, &name)
            .await
            .map(|folder| folder.node.clone());
        let folder = match reusable {
            Some(node) => node,
            None => {
                let title = codec::stringify(&name, schema::window_note(&window));
                directory.add_new(bookmarks, &title).await?.node.clone()
            }
        };
        let folder_busy = self.guard.acquire(OpKind::Stash, folder.id.clone());

        // the window can go away now; the tab snapshot carries the rest
        let last_window = self.browser.windows.all().await?.len() <= 1;
        if last_window {
            if let Err(err) = self.browser.windows.minimize(window_id).await {
                warn!("could not minimize window {window_id}: {err}");
            }
        } else {
            self.browser
                .windows
                .remove(window_id)
                .await
                .context("failed to close the stashed window")?;
            if let Some(token) = window_busy.take() {
                token.release();
            }
        }

        let protos = self.bookmark_protos(&folder.id, tabs).await;
        self.create_bookmarks_ordered(0, protos).await?;
        folder_busy.release();

        if last_window {
            self.browser
                .windows
                .remove(window_id)
                .await
                .context("failed to close the stashed window")?;
        }
        Ok(folder)
    }

    /// Stash the focused window's selected tabs at `target_id`. Returns the
    /// receiving folder and how many tabs were stashed.
    pub async fn stash_selected(&self, target_id: &NodeId) -> Result<(Node, usize)> {
        let target = self.browser.bookmarks.node(target_id).await?;
        let (folder_id, insert_at) = match target.kind {
            NodeKind::Folder => (target.id.clone(), 0),
            NodeKind::Bookmark => (
                target
                    .parent_id
                    .clone()
                    .ok_or_else(|| anyhow!("bookmark {} has no parent", target.id))?,
                target.index,
            ),
            NodeKind::Separator => return Err(anyhow!("cannot stash onto a separator")),
        };
        let folder = if target.is_folder() {
            target
        } else {
            self.browser.bookmarks.node(&folder_id).await?
        };

        let window = self.browser.windows.last_focused().await?;
        let mut window_busy = Some(self.guard.acquire(OpKind::Stash, window.id));
        let all_tabs = self.browser.tabs.of_window(window.id).await?;
        let selected: Vec<Tab> = all_tabs.iter().filter(|tab| tab.selected).cloned().collect();
        if selected.is_empty() {
            return Err(anyhow!("no selected tabs in window {}", window.id));
        }
        let whole_window = selected.len() == all_tabs.len();
        let folder_busy = self.guard.acquire(OpKind::Stash, folder_id.clone());

        // stashing every tab empties the window, so it follows the same
        // close rules as a whole-window stash
        let mut close_after = false;
        if whole_window {
            if self.browser.windows.all().await?.len() <= 1 {
                if let Err(err) = self.browser.windows.minimize(window.id).await {
                    warn!("could not minimize window {}: {err}", window.id);
                }
                close_after = true;
            } else {
                self.browser
                    .windows
                    .remove(window.id)
                    .await
                    .context("failed to close the stashed window")?;
                if let Some(token) = window_busy.take() {
                    token.release();
                }
            }
        }

        let protos = self.bookmark_protos(&folder_id, selected.clone()).await;
        let count = protos.len();
        self.create_bookmarks_ordered(insert_at, protos).await?;
        folder_busy.release();

        if close_after {
            self.browser
                .windows
                .remove(window.id)
                .await
                .context("failed to close the stashed window")?;
        } else if !whole_window {
            let ids: Vec<TabId> = selected.iter().map(|tab| tab.id).collect();
            if let Err(err) = self.browser.tabs.remove(&ids).await {
                warn!("stashed tabs were not removed: {err}");
            }
        }
        Ok((folder, count))
    }

    /// Stage `tabs`, resolve containers and opener links, and encode each
    /// tab as a bookmark blueprint under `folder_id`.
    async fn bookmark_protos(&self, folder_id: &NodeId, tabs: Vec<Tab>) -> Vec<CreateNode> {
        let mut batch: Vec<StashableTab> = tabs.into_iter().map(StashableTab::new).collect();
        containers::prepare(self.browser.containers.as_ref(), &mut batch).await;
        relations::prepare(&mut batch);
        batch
            .iter()
            .map(|entry| {
                let title = codec::stringify(&entry.tab.title, schema::tab_note(entry, folder_id));
                CreateNode::bookmark(folder_id.clone(), &title, &entry.tab.url)
            })
            .collect()
    }

    /// Create `protos` left to right at child position `at`. Creation runs
    /// right to left: every node lands at the same fixed index and pushes the
    /// ones already created rightward, which keeps batch order without
    /// trusting append position under concurrent writes.
    async fn create_bookmarks_ordered(
        &self,
        at: usize,
        protos: Vec<CreateNode>,
    ) -> Result<Vec<Node>> {
        let mut created = Vec::with_capacity(protos.len());
        for proto in protos.into_iter().rev() {
            created.push(
                self.browser
                    .bookmarks
                    .create(proto.at(at))
                    .await
                    .context("failed to create stash bookmark")?,
            );
        }
        created.reverse();
        Ok(created)
    }

    // ==== unstash ====

    /// Reopen one stashed bookmark as a tab in the focused window.
    pub async fn unstash_bookmark(&self, node: Node, remove: bool) -> Result<Tab> {
        let busy = self.guard.acquire(OpKind::Unstash, node.id.clone());
        let url = node
            .url
            .clone()
            .ok_or_else(|| anyhow!("bookmark {} has no url", node.id))?;
        let (title, props) = codec::parse(&node.title);
        let window = self.browser.windows.last_focused().await?;
        let mut protos = [schema::proto_tab(&url, &title, props.as_ref())];
        protos[0].window_id = Some(window.id);
        protos[0].active = true;
        containers::restore(
            self.browser.containers.as_ref(),
            &mut protos,
            window.incognito,
        )
        .await;
        let [proto] = protos;
        let tab = self.create_tab_or_placeholder(&proto).await?;
        if remove {
            if let Err(err) = self.browser.bookmarks.remove(&node.id).await {
                debug!("stash bookmark {} was not removed: {err}", node.id);
            }
        }
        busy.release();
        Ok(tab)
    }

    /// Reopen a stash folder as a window. Returns the window with its tabs.
    pub async fn unstash_folder(
        &self,
        folder: Node,
        name: Option<String>,
        remove: bool,
    ) -> Result<Window> {
        let folder_busy = self.guard.acquire(OpKind::Unstash, folder.id.clone());
        let (given_name, props) = codec::parse(&folder.title);
        let proto_window = props
            .as_ref()
            .map(schema::window_from_note)
            .unwrap_or_default();
        // window creation cannot be deferred; open it empty, then fill it
        let window = self
            .browser
            .windows
            .create(&proto_window)
            .await
            .context("failed to open a window for the stash")?;
        let window_busy = self.guard.acquire(OpKind::Unstash, window.id);
        let name = name.filter(|name| !name.is_empty()).unwrap_or(given_name);
        if !name.is_empty() {
            if let Err(err) = self.browser.windows.set_name(window.id, &name).await {
                warn!("window name was not applied: {err}");
            }
        }

        let children = self.browser.bookmarks.children(&folder.id).await?;
        let keeps_subfolders = children.iter().any(|node| node.is_folder());
        let items: Vec<&Node> = children.iter().filter(|node| node.is_bookmark()).collect();

        let mut protos = Vec::with_capacity(items.len());
        for node in &items {
            let Some(url) = node.url.as_deref() else {
                warn!("bookmark {} has no url, skipped", node.id);
                continue;
            };
            let (title, props) = codec::parse(&node.title);
            let mut proto = schema::proto_tab(url, &title, props.as_ref());
            proto.window_id = Some(window.id);
            protos.push(proto);
        }
        containers::restore(
            self.browser.containers.as_ref(),
            &mut protos,
            window.incognito,
        )
        .await;

        let initial_tab = window.tabs.first().map(|tab| tab.id);
        let mut new_tabs = Vec::with_capacity(protos.len());
        for proto in &protos {
            let tab = self.create_tab_or_placeholder(proto).await?;
            if new_tabs.is_empty() {
                // the blank tab a fresh window opens with has served its purpose
                if let Some(blank) = initial_tab {
                    if let Err(err) = self.browser.tabs.remove(&[blank]).await {
                        debug!("initial tab was already gone: {err}");
                    }
                }
            }
            new_tabs.push(tab);
        }
        relations::restore(
            self.browser.tabs.as_ref(),
            &new_tabs,
            &relations::specs_by_surrogate(&protos),
        )
        .await;
        window_busy.release();

        if remove {
            if keeps_subfolders {
                // sub-folders survive; only the unstashed bookmarks go
                for node in &items {
                    if let Err(err) = self.browser.bookmarks.remove(&node.id).await {
                        debug!("stash bookmark {} was not removed: {err}", node.id);
                    }
                }
            } else if let Err(err) = self.browser.bookmarks.remove_tree(&folder.id).await {
                debug!("stash folder {} was not removed: {err}", folder.id);
            }
        }
        folder_busy.release();
        self.browser.windows.get(window.id, true).await
    }

    // ==== helpers ====

    /// Create a tab from `proto`, falling back twice: once without the
    /// container, then to the placeholder page carrying the original url and
    /// title in its query.
    async fn create_tab_or_placeholder(&self, proto: &ProtoTab) -> Result<Tab> {
        let first = match self.browser.tabs.create(proto).await {
            Ok(tab) => return Ok(tab),
            Err(err) => err,
        };
        if proto.cookie_store.is_some() {
            let mut bare = proto.clone();
            bare.cookie_store = None;
            if let Ok(tab) = self.browser.tabs.create(&bare).await {
                warn!("tab opened without its container: {first}");
                return Ok(tab);
            }
        }
        warn!("substituting the placeholder page for {}: {first}", proto.url);
        let mut placeholder = proto.clone();
        placeholder.cookie_store = None;
        placeholder.url = self.placeholder_url(&proto.url, proto.title.as_deref());
        self.browser
            .tabs
            .create(&placeholder)
            .await
            .context("failed to create a placeholder tab")
    }

    fn placeholder_url(&self, original: &str, title: Option<&str>) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", original);
        if let Some(title) = title {
            query.append_pair("title", title);
        }
        format!("{}?{}", self.config.placeholder_page, query.finish())
    }
}
