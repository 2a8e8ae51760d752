pub type NodeId = String;
pub type WindowId = u64;
pub type TabId = u64;
pub type ContextId = String;

/// Cookie store id shared by every tab outside a container.
pub const DEFAULT_COOKIE_STORE: &str = "firefox-default";
/// Cookie store id shared by every private-browsing tab.
pub const PRIVATE_COOKIE_STORE: &str = "firefox-private";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Bookmark,
    Separator,
}

/// One entry in the bookmark tree. `index` is the position among the
/// parent's children at the time the node was fetched.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub index: usize,
    pub title: String,
    pub url: Option<String>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_bookmark(&self) -> bool {
        self.kind == NodeKind::Bookmark
    }
}

/// Request to create a bookmark node. Without an explicit index the node
/// is appended after the parent's existing children.
#[derive(Debug, Clone)]
pub struct CreateNode {
    pub parent_id: NodeId,
    pub title: String,
    pub url: Option<String>,
    pub kind: NodeKind,
    pub index: Option<usize>,
}

impl CreateNode {
    pub fn folder(parent_id: NodeId, title: &str) -> Self {
        Self {
            parent_id,
            title: title.to_string(),
            url: None,
            kind: NodeKind::Folder,
            index: None,
        }
    }

    pub fn bookmark(parent_id: NodeId, title: &str, url: &str) -> Self {
        Self {
            parent_id,
            title: title.to_string(),
            url: Some(url.to_string()),
            kind: NodeKind::Bookmark,
            index: None,
        }
    }

    pub fn separator(parent_id: NodeId) -> Self {
        Self {
            parent_id,
            title: String::new(),
            url: None,
            kind: NodeKind::Separator,
            index: None,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    pub id: WindowId,
    pub focused: bool,
    pub incognito: bool,
    pub name: Option<String>,
    /// Populated only when the window was fetched with its tabs.
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: usize,
    pub url: String,
    pub title: String,
    pub active: bool,
    pub pinned: bool,
    pub muted: bool,
    pub selected: bool,
    pub opener_tab_id: Option<TabId>,
    pub cookie_store: ContextId,
}

/// Blueprint for a window that does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct ProtoWindow {
    pub incognito: bool,
    pub name: Option<String>,
}

/// Blueprint for a tab that does not exist yet. `container` carries a
/// container name still waiting to be resolved into a cookie store;
/// `surrogate_id` and `parent_surrogate` carry opener correlation keys
/// decoded from stash annotations.
#[derive(Debug, Clone)]
pub struct ProtoTab {
    pub url: String,
    pub title: Option<String>,
    pub window_id: Option<WindowId>,
    pub active: bool,
    pub pinned: bool,
    pub muted: bool,
    pub cookie_store: Option<ContextId>,
    pub container: Option<String>,
    pub surrogate_id: Option<String>,
    pub parent_surrogate: Option<String>,
}

impl ProtoTab {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            window_id: None,
            active: false,
            pinned: false,
            muted: false,
            cookie_store: None,
            container: None,
            surrogate_id: None,
            parent_surrogate: None,
        }
    }
}

/// Field updates for an existing tab. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TabPatch {
    pub active: Option<bool>,
    pub pinned: Option<bool>,
    pub muted: Option<bool>,
    pub opener_tab_id: Option<TabId>,
}

/// A live tab staged for stashing, annotated with what the codec needs
/// beyond the tab itself: the resolved container name, and opener links
/// confined to the batch.
#[derive(Debug, Clone)]
pub struct StashableTab {
    pub tab: Tab,
    pub container: Option<String>,
    pub is_parent: bool,
    pub opener_in_batch: Option<TabId>,
}

impl StashableTab {
    pub fn new(tab: Tab) -> Self {
        Self {
            tab,
            container: None,
            is_parent: false,
            opener_in_batch: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeKind {
    /// The home is a designated root; stash folders live after the last
    /// separator among its children.
    Root,
    /// The home is a dedicated subfolder; every child is a candidate.
    Subfolder,
}

/// The folder under which stash folders are kept.
#[derive(Debug, Clone)]
pub struct StashHome {
    pub id: NodeId,
    pub kind: HomeKind,
}

#[derive(Debug, Clone)]
pub struct ContainerIdentity {
    pub context_id: ContextId,
    pub name: String,
}
