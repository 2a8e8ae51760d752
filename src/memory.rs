//! In-memory browser backing the whole service surface. Mirrors the host
//! behaviors the orchestrator leans on: a fresh window opens with one blank
//! tab, a window whose last tab closes goes away, privileged urls are
//! rejected at tab creation, and container tabs cannot open in private
//! windows.

use crate::browser::{Bookmarks, Browser, Containers, SessionStore, Tabs, Windows};
use crate::types::{
    ContainerIdentity, ContextId, CreateNode, Node, NodeId, NodeKind, ProtoTab, ProtoWindow, Tab,
    TabId, TabPatch, Window, WindowId, DEFAULT_COOKIE_STORE, PRIVATE_COOKIE_STORE,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const ROOT_ID: &str = "root";
pub const TOOLBAR_ID: &str = "toolbar";
pub const MENU_ID: &str = "menu";
pub const OTHER_ID: &str = "other";

const ROOTS: [&str; 4] = [ROOT_ID, TOOLBAR_ID, MENU_ID, OTHER_ID];

struct StoredNode {
    node: Node,
    children: Vec<NodeId>,
}

struct StoredWindow {
    incognito: bool,
    name: Option<String>,
    minimized: bool,
    tabs: Vec<TabId>,
}

#[derive(Default)]
struct BrowserState {
    nodes: HashMap<NodeId, StoredNode>,
    windows: HashMap<WindowId, StoredWindow>,
    tabs: HashMap<TabId, Tab>,
    identities: Vec<ContainerIdentity>,
    session: HashMap<String, String>,
    /// Most recently focused window first.
    focus: Vec<WindowId>,
    next_window: WindowId,
    next_tab: TabId,
    containers_available: bool,
    private_allowed: bool,
}

#[derive(Clone)]
pub struct MemoryBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl Default for MemoryBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBrowser {
    pub fn new() -> Self {
        let mut state = BrowserState {
            next_window: 1,
            next_tab: 1,
            containers_available: true,
            private_allowed: true,
            ..Default::default()
        };
        let root = Node {
            id: ROOT_ID.to_string(),
            parent_id: None,
            index: 0,
            title: String::new(),
            url: None,
            kind: NodeKind::Folder,
        };
        state.nodes.insert(
            ROOT_ID.to_string(),
            StoredNode {
                node: root,
                children: vec![
                    TOOLBAR_ID.to_string(),
                    MENU_ID.to_string(),
                    OTHER_ID.to_string(),
                ],
            },
        );
        for (id, title) in [
            (TOOLBAR_ID, "Bookmarks Toolbar"),
            (MENU_ID, "Bookmarks Menu"),
            (OTHER_ID, "Other Bookmarks"),
        ] {
            let node = Node {
                id: id.to_string(),
                parent_id: Some(ROOT_ID.to_string()),
                index: 0,
                title: title.to_string(),
                url: None,
                kind: NodeKind::Folder,
            };
            state.nodes.insert(
                id.to_string(),
                StoredNode {
                    node,
                    children: Vec::new(),
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Service bundle backed by this browser.
    pub fn browser(&self) -> Browser {
        Browser {
            bookmarks: Arc::new(self.clone()),
            windows: Arc::new(self.clone()),
            tabs: Arc::new(self.clone()),
            containers: Arc::new(self.clone()),
            session: Arc::new(self.clone()),
        }
    }

    pub fn set_containers_available(&self, available: bool) {
        self.state.lock().containers_available = available;
    }

    pub fn set_private_allowed(&self, allowed: bool) {
        self.state.lock().private_allowed = allowed;
    }

    // ==== fixture helpers ====

    /// Open a window directly, as a user would. Unlike `Windows::create`
    /// this bypasses the private-browsing permission, which gates only what
    /// the stash machinery may do, and starts with no tabs so fixtures
    /// contain exactly the tabs they open.
    pub fn open_window(&self, incognito: bool) -> WindowId {
        open_window(&mut self.state.lock(), incognito, None)
    }

    pub fn name_window(&self, id: WindowId, name: &str) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.name = Some(name.to_string());
        }
    }

    /// Append a plain tab to `window_id` and return its id.
    pub fn open_tab(&self, window_id: WindowId, url: &str, title: &str) -> TabId {
        let mut state = self.state.lock();
        let store = state
            .windows
            .get(&window_id)
            .map(|window| default_store(window.incognito).to_string())
            .unwrap_or_else(|| DEFAULT_COOKIE_STORE.to_string());
        mint_tab(&mut state, window_id, url, Some(title), store)
    }

    pub fn select_tabs(&self, ids: &[TabId]) {
        let mut state = self.state.lock();
        for id in ids {
            if let Some(tab) = state.tabs.get_mut(id) {
                tab.selected = true;
            }
        }
    }

    pub fn activate_tab(&self, id: TabId) {
        let mut state = self.state.lock();
        if let Some(window_id) = state.tabs.get(&id).map(|tab| tab.window_id) {
            activate(&mut state, window_id, id);
        }
    }

    pub fn pin_tab(&self, id: TabId) {
        if let Some(tab) = self.state.lock().tabs.get_mut(&id) {
            tab.pinned = true;
        }
    }

    pub fn mute_tab(&self, id: TabId) {
        if let Some(tab) = self.state.lock().tabs.get_mut(&id) {
            tab.muted = true;
        }
    }

    pub fn set_opener(&self, id: TabId, opener: TabId) {
        if let Some(tab) = self.state.lock().tabs.get_mut(&id) {
            tab.opener_tab_id = Some(opener);
        }
    }

    pub fn set_cookie_store(&self, id: TabId, store: &str) {
        if let Some(tab) = self.state.lock().tabs.get_mut(&id) {
            tab.cookie_store = store.to_string();
        }
    }

    /// Seed a container identity, as if created through browser settings.
    pub fn add_identity(&self, name: &str) -> ContextId {
        let identity = mint_identity(name);
        let context_id = identity.context_id.clone();
        self.state.lock().identities.push(identity);
        context_id
    }

    pub fn tab(&self, id: TabId) -> Option<Tab> {
        tab_view(&self.state.lock(), id)
    }

    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }
}

// ==== bookmarks ====

#[async_trait]
impl Bookmarks for MemoryBrowser {
    async fn node(&self, id: &NodeId) -> Result<Node> {
        node_view(&self.state.lock(), id).ok_or_else(|| anyhow!("no such node: {id}"))
    }

    async fn children(&self, parent_id: &NodeId) -> Result<Vec<Node>> {
        let state = self.state.lock();
        let stored = state
            .nodes
            .get(parent_id)
            .ok_or_else(|| anyhow!("no such node: {parent_id}"))?;
        let mut nodes = Vec::with_capacity(stored.children.len());
        for (index, child_id) in stored.children.iter().enumerate() {
            if let Some(child) = state.nodes.get(child_id) {
                let mut node = child.node.clone();
                node.index = index;
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    async fn create(&self, req: CreateNode) -> Result<Node> {
        let mut state = self.state.lock();
        let slot = {
            let parent = state
                .nodes
                .get(&req.parent_id)
                .ok_or_else(|| anyhow!("no such parent: {}", req.parent_id))?;
            if parent.node.kind != NodeKind::Folder {
                return Err(anyhow!("parent {} is not a folder", req.parent_id));
            }
            let len = parent.children.len();
            req.index.unwrap_or(len).min(len)
        };
        let id = format!("bk{}", Uuid::new_v4().simple());
        let node = Node {
            id: id.clone(),
            parent_id: Some(req.parent_id.clone()),
            index: slot,
            title: req.title,
            url: req.url,
            kind: req.kind,
        };
        state.nodes.insert(
            id.clone(),
            StoredNode {
                node: node.clone(),
                children: Vec::new(),
            },
        );
        if let Some(parent) = state.nodes.get_mut(&req.parent_id) {
            parent.children.insert(slot, id);
        }
        Ok(node)
    }

    async fn remove(&self, id: &NodeId) -> Result<()> {
        let mut state = self.state.lock();
        if ROOTS.contains(&id.as_str()) {
            return Err(anyhow!("cannot remove a root: {id}"));
        }
        let stored = state
            .nodes
            .get(id)
            .ok_or_else(|| anyhow!("no such node: {id}"))?;
        if stored.node.kind == NodeKind::Folder && !stored.children.is_empty() {
            return Err(anyhow!("folder {id} is not empty"));
        }
        detach(&mut state, id);
        state.nodes.remove(id);
        Ok(())
    }

    async fn remove_tree(&self, id: &NodeId) -> Result<()> {
        let mut state = self.state.lock();
        if ROOTS.contains(&id.as_str()) {
            return Err(anyhow!("cannot remove a root: {id}"));
        }
        if !state.nodes.contains_key(id) {
            return Err(anyhow!("no such node: {id}"));
        }
        detach(&mut state, id);
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(stored) = state.nodes.remove(&current) {
                stack.extend(stored.children);
            }
        }
        Ok(())
    }

    fn is_root(&self, id: &NodeId) -> bool {
        ROOTS.contains(&id.as_str())
    }
}

// ==== windows ====

#[async_trait]
impl Windows for MemoryBrowser {
    async fn create(&self, proto: &ProtoWindow) -> Result<Window> {
        let mut state = self.state.lock();
        if proto.incognito && !state.private_allowed {
            return Err(anyhow!("private windows are not permitted"));
        }
        let id = open_window(&mut state, proto.incognito, proto.name.clone());
        // a real window never opens empty
        let blank = mint_tab(
            &mut state,
            id,
            "about:blank",
            Some("New Tab"),
            default_store(proto.incognito).to_string(),
        );
        if let Some(tab) = state.tabs.get_mut(&blank) {
            tab.active = true;
        }
        window_view(&state, id, true).ok_or_else(|| anyhow!("window {id} vanished"))
    }

    async fn get(&self, id: WindowId, with_tabs: bool) -> Result<Window> {
        window_view(&self.state.lock(), id, with_tabs).ok_or_else(|| anyhow!("no such window: {id}"))
    }

    async fn all(&self) -> Result<Vec<Window>> {
        let state = self.state.lock();
        let mut ids: Vec<WindowId> = state.windows.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .filter_map(|id| window_view(&state, id, false))
            .collect())
    }

    async fn last_focused(&self) -> Result<Window> {
        let state = self.state.lock();
        let id = state
            .focus
            .first()
            .copied()
            .ok_or_else(|| anyhow!("no window is focused"))?;
        window_view(&state, id, false).ok_or_else(|| anyhow!("no such window: {id}"))
    }

    async fn set_name(&self, id: WindowId, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no such window: {id}"))?;
        window.name = Some(name.to_string());
        Ok(())
    }

    async fn minimize(&self, id: WindowId) -> Result<()> {
        let mut state = self.state.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no such window: {id}"))?;
        window.minimized = true;
        Ok(())
    }

    async fn remove(&self, id: WindowId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.windows.contains_key(&id) {
            return Err(anyhow!("no such window: {id}"));
        }
        drop_window(&mut state, id);
        Ok(())
    }

    fn private_allowed(&self) -> bool {
        self.state.lock().private_allowed
    }
}

// ==== tabs ====

#[async_trait]
impl Tabs for MemoryBrowser {
    async fn create(&self, proto: &ProtoTab) -> Result<Tab> {
        let mut state = self.state.lock();
        let window_id = proto
            .window_id
            .ok_or_else(|| anyhow!("tab creation needs a window"))?;
        let incognito = state
            .windows
            .get(&window_id)
            .map(|window| window.incognito)
            .ok_or_else(|| anyhow!("no such window: {window_id}"))?;
        if illegal_url(&proto.url) {
            return Err(anyhow!("illegal url: {}", proto.url));
        }
        let store = match &proto.cookie_store {
            Some(store) => {
                if incognito && store != PRIVATE_COOKIE_STORE {
                    return Err(anyhow!("container tabs cannot open in private windows"));
                }
                if store != DEFAULT_COOKIE_STORE
                    && store != PRIVATE_COOKIE_STORE
                    && !state
                        .identities
                        .iter()
                        .any(|identity| identity.context_id == *store)
                {
                    return Err(anyhow!("no such cookie store: {store}"));
                }
                store.clone()
            }
            None => default_store(incognito).to_string(),
        };
        let id = mint_tab(&mut state, window_id, &proto.url, proto.title.as_deref(), store);
        if let Some(tab) = state.tabs.get_mut(&id) {
            tab.pinned = proto.pinned;
            tab.muted = proto.muted;
        }
        if proto.active {
            activate(&mut state, window_id, id);
        }
        tab_view(&state, id).ok_or_else(|| anyhow!("tab {id} vanished"))
    }

    async fn of_window(&self, window_id: WindowId) -> Result<Vec<Tab>> {
        let state = self.state.lock();
        let stored = state
            .windows
            .get(&window_id)
            .ok_or_else(|| anyhow!("no such window: {window_id}"))?;
        Ok(stored
            .tabs
            .iter()
            .filter_map(|id| tab_view(&state, *id))
            .collect())
    }

    async fn update(&self, id: TabId, patch: TabPatch) -> Result<Tab> {
        let mut state = self.state.lock();
        let window_id = state
            .tabs
            .get(&id)
            .map(|tab| tab.window_id)
            .ok_or_else(|| anyhow!("no such tab: {id}"))?;
        if let Some(opener) = patch.opener_tab_id {
            if !state.tabs.contains_key(&opener) {
                return Err(anyhow!("no such opener tab: {opener}"));
            }
        }
        if let Some(tab) = state.tabs.get_mut(&id) {
            if let Some(pinned) = patch.pinned {
                tab.pinned = pinned;
            }
            if let Some(muted) = patch.muted {
                tab.muted = muted;
            }
            if let Some(opener) = patch.opener_tab_id {
                tab.opener_tab_id = Some(opener);
            }
            if patch.active == Some(false) {
                tab.active = false;
            }
        }
        if patch.active == Some(true) {
            activate(&mut state, window_id, id);
        }
        tab_view(&state, id).ok_or_else(|| anyhow!("no such tab: {id}"))
    }

    async fn remove(&self, ids: &[TabId]) -> Result<()> {
        let mut state = self.state.lock();
        for id in ids {
            if !state.tabs.contains_key(id) {
                return Err(anyhow!("no such tab: {id}"));
            }
        }
        let mut touched = Vec::new();
        for id in ids {
            if let Some(tab) = state.tabs.remove(id) {
                if let Some(window) = state.windows.get_mut(&tab.window_id) {
                    window.tabs.retain(|member| member != id);
                }
                if tab.active {
                    let survivor = state
                        .windows
                        .get(&tab.window_id)
                        .and_then(|window| window.tabs.first().copied());
                    if let Some(survivor) = survivor {
                        if let Some(next) = state.tabs.get_mut(&survivor) {
                            next.active = true;
                        }
                    }
                }
                if !touched.contains(&tab.window_id) {
                    touched.push(tab.window_id);
                }
            }
        }
        // a window does not outlive its last tab
        for window_id in touched {
            let empty = state
                .windows
                .get(&window_id)
                .is_some_and(|window| window.tabs.is_empty());
            if empty {
                drop_window(&mut state, window_id);
            }
        }
        Ok(())
    }
}

// ==== containers ====

#[async_trait]
impl Containers for MemoryBrowser {
    async fn get(&self, context_id: &ContextId) -> Result<ContainerIdentity> {
        let state = self.state.lock();
        if !state.containers_available {
            return Err(anyhow!("containers are unavailable"));
        }
        state
            .identities
            .iter()
            .find(|identity| identity.context_id == *context_id)
            .cloned()
            .ok_or_else(|| anyhow!("no such container: {context_id}"))
    }

    async fn query_by_name(&self, name: &str) -> Result<Vec<ContainerIdentity>> {
        let state = self.state.lock();
        if !state.containers_available {
            return Err(anyhow!("containers are unavailable"));
        }
        Ok(state
            .identities
            .iter()
            .filter(|identity| identity.name == name)
            .cloned()
            .collect())
    }

    async fn create(&self, name: &str) -> Result<ContainerIdentity> {
        let mut state = self.state.lock();
        if !state.containers_available {
            return Err(anyhow!("containers are unavailable"));
        }
        let identity = mint_identity(name);
        state.identities.push(identity.clone());
        Ok(identity)
    }

    fn available(&self) -> bool {
        self.state.lock().containers_available
    }
}

// ==== session store ====

#[async_trait]
impl SessionStore for MemoryBrowser {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().session.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .session
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ==== state helpers ====

fn default_store(incognito: bool) -> &'static str {
    if incognito {
        PRIVATE_COOKIE_STORE
    } else {
        DEFAULT_COOKIE_STORE
    }
}

fn illegal_url(url: &str) -> bool {
    if url == "about:blank" {
        return false;
    }
    ["about:", "chrome:", "javascript:", "file:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn mint_identity(name: &str) -> ContainerIdentity {
    ContainerIdentity {
        context_id: format!("ctx{}", Uuid::new_v4().simple()),
        name: name.to_string(),
    }
}

fn node_view(state: &BrowserState, id: &NodeId) -> Option<Node> {
    let stored = state.nodes.get(id)?;
    let mut node = stored.node.clone();
    node.index = node
        .parent_id
        .as_ref()
        .and_then(|parent_id| state.nodes.get(parent_id))
        .and_then(|parent| parent.children.iter().position(|child| child == id))
        .unwrap_or(0);
    Some(node)
}

fn detach(state: &mut BrowserState, id: &NodeId) {
    let parent_id = state
        .nodes
        .get(id)
        .and_then(|stored| stored.node.parent_id.clone());
    if let Some(parent_id) = parent_id {
        if let Some(parent) = state.nodes.get_mut(&parent_id) {
            parent.children.retain(|child| child != id);
        }
    }
}

fn open_window(state: &mut BrowserState, incognito: bool, name: Option<String>) -> WindowId {
    let id = state.next_window;
    state.next_window += 1;
    state.windows.insert(
        id,
        StoredWindow {
            incognito,
            name,
            minimized: false,
            tabs: Vec::new(),
        },
    );
    state.focus.insert(0, id);
    id
}

fn drop_window(state: &mut BrowserState, id: WindowId) {
    if let Some(window) = state.windows.remove(&id) {
        for tab_id in window.tabs {
            state.tabs.remove(&tab_id);
        }
    }
    state.focus.retain(|member| *member != id);
}

fn mint_tab(
    state: &mut BrowserState,
    window_id: WindowId,
    url: &str,
    title: Option<&str>,
    store: ContextId,
) -> TabId {
    let id = state.next_tab;
    state.next_tab += 1;
    let tab = Tab {
        id,
        window_id,
        index: 0,
        url: url.to_string(),
        title: title.map(str::to_string).unwrap_or_else(|| url.to_string()),
        active: false,
        pinned: false,
        muted: false,
        selected: false,
        opener_tab_id: None,
        cookie_store: store,
    };
    state.tabs.insert(id, tab);
    if let Some(window) = state.windows.get_mut(&window_id) {
        window.tabs.push(id);
    }
    id
}

fn activate(state: &mut BrowserState, window_id: WindowId, tab_id: TabId) {
    let members: Vec<TabId> = state
        .windows
        .get(&window_id)
        .map(|window| window.tabs.clone())
        .unwrap_or_default();
    for member in members {
        if let Some(tab) = state.tabs.get_mut(&member) {
            tab.active = member == tab_id;
        }
    }
}

fn window_view(state: &BrowserState, id: WindowId, with_tabs: bool) -> Option<Window> {
    let stored = state.windows.get(&id)?;
    let tabs = if with_tabs {
        stored
            .tabs
            .iter()
            .filter_map(|tab_id| tab_view(state, *tab_id))
            .collect()
    } else {
        Vec::new()
    };
    Some(Window {
        id,
        focused: state.focus.first() == Some(&id),
        incognito: stored.incognito,
        name: stored.name.clone(),
        tabs,
    })
}

fn tab_view(state: &BrowserState, id: TabId) -> Option<Tab> {
    let tab = state.tabs.get(&id)?;
    let index = state
        .windows
        .get(&tab.window_id)
        .and_then(|window| window.tabs.iter().position(|member| *member == id))
        .unwrap_or(0);
    Some(Tab {
        index,
        ..tab.clone()
    })
}
