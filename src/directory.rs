//! Directory of stash folders under the stash home. Decides which children
//! count as stash folders, where a new one goes, and which existing folder a
//! stash may reuse.

use crate::browser::Bookmarks;
use crate::codec;
use crate::guard::OpGuard;
use crate::schema;
use crate::types::{CreateNode, HomeKind, Node, NodeKind, ProtoWindow, StashHome};
use anyhow::Result;
use futures_util::future::join_all;
use log::warn;

/// One stash folder: its node, the name with the annotation stripped, the
/// decoded window blueprint, and a bookmark count once fetched.
#[derive(Debug, Clone)]
pub struct StashFolder {
    pub node: Node,
    pub given_name: String,
    pub proto: Option<ProtoWindow>,
    pub bookmark_count: Option<usize>,
}

impl StashFolder {
    /// Name to show in listings. Machine-generated names render as a
    /// relative phrase.
    pub fn display_name(&self) -> String {
        codec::friendly_name(&self.given_name)
    }
}

pub struct FolderDirectory {
    home: StashHome,
    /// Child position where the stash region begins; new folders never land
    /// before it.
    region_start: usize,
    folders: Vec<StashFolder>,
}

impl FolderDirectory {
    pub async fn load(
        svc: &dyn Bookmarks,
        home: &StashHome,
        private_allowed: bool,
    ) -> Result<Self> {
        let children = svc.children(&home.id).await?;
        Self::from_children(svc, home, children, private_allowed).await
    }

    /// Build the directory from an already-fetched child list. When the home
    /// is a root and `children` is its full child set, only nodes after the
    /// last separator belong to the stash region; a root with no separator
    /// yet gets one appended, fencing off whatever the root already held.
    /// Subfolder homes have no separator convention.
    pub async fn from_children(
        svc: &dyn Bookmarks,
        home: &StashHome,
        children: Vec<Node>,
        private_allowed: bool,
    ) -> Result<Self> {
        let mut region = children;
        let full_set = region.first().map_or(true, |node| node.index == 0);
        let mut region_start = region.first().map_or(0, |node| node.index);
        if home.kind == HomeKind::Root && full_set {
            match region.iter().rposition(|node| node.kind == NodeKind::Separator) {
                Some(at) => {
                    region_start = region[at].index + 1;
                    region.drain(..=at);
                }
                None => {
                    let separator = svc.create(CreateNode::separator(home.id.clone())).await?;
                    region_start = separator.index + 1;
                    region.clear();
                }
            }
        }
        let mut folders = Vec::new();
        for node in region {
            if node.kind != NodeKind::Folder {
                continue;
            }
            let (given_name, props) = codec::parse(&node.title);
            let proto = props.as_ref().map(schema::window_from_note);
            if proto.as_ref().is_some_and(|proto| proto.incognito) && !private_allowed {
                // private stashes stay hidden until private windows may open
                continue;
            }
            folders.push(StashFolder {
                node,
                given_name,
                proto,
                bookmark_count: None,
            });
        }
        Ok(Self {
            home: home.clone(),
            region_start,
            folders,
        })
    }

    pub fn folders(&self) -> &[StashFolder] {
        &self.folders
    }

    pub fn into_folders(self) -> Vec<StashFolder> {
        self.folders
    }

    /// Fetch every folder's bookmark count, one child fetch per folder, all
    /// in flight at once. A folder whose fetch fails keeps an unknown count.
    pub async fn count_bookmarks(&mut self, svc: &dyn Bookmarks) {
        let fetches = self
            .folders
            .iter()
            .map(|folder| svc.children(&folder.node.id));
        let results = join_all(fetches).await;
        for (folder, children) in self.folders.iter_mut().zip(results) {
            match children {
                Ok(children) => {
                    folder.bookmark_count =
                        Some(children.iter().filter(|node| node.is_bookmark()).count());
                }
                Err(err) => warn!("bookmark count failed for {}: {err}", folder.node.id),
            }
        }
    }

    /// First folder whose given name matches and which no operation holds.
    pub fn find_by_title(&self, guard: &OpGuard, title: &str) -> Option<&StashFolder> {
        self.folders
            .iter()
            .find(|folder| folder.given_name == title && !guard.is_busy(folder.node.id.clone()))
    }

    /// Like [`find_by_title`](Self::find_by_title), but the folder must also
    /// hold no bookmarks, so a stash can fill it without mixing batches.
    /// Counts are fetched lazily and only as far as needed.
    pub async fn find_bookmarkless_by_title(
        &mut self,
        svc: &dyn Bookmarks,
        guard: &OpGuard,
        title: &str,
    ) -> Option<&StashFolder> {
        let mut found = None;
        for at in 0..self.folders.len() {
            if self.folders[at].given_name != title
                || guard.is_busy(self.folders[at].node.id.clone())
            {
                continue;
            }
            let count = match self.folders[at].bookmark_count {
                Some(count) => count,
                None => match svc.children(&self.folders[at].node.id).await {
                    Ok(children) => {
                        let count = children.iter().filter(|node| node.is_bookmark()).count();
                        self.folders[at].bookmark_count = Some(count);
                        count
                    }
                    Err(err) => {
                        warn!("bookmark count failed for {}: {err}", self.folders[at].node.id);
                        continue;
                    }
                },
            };
            if count == 0 {
                found = Some(at);
                break;
            }
        }
        found.map(move |at| &self.folders[at])
    }

    /// Create a stash folder titled `title` at the head of the region, just
    /// before the current newest stash folder.
    pub async fn add_new(&mut self, svc: &dyn Bookmarks, title: &str) -> Result<&StashFolder> {
        let at = self
            .folders
            .first()
            .map(|folder| folder.node.index)
            .unwrap_or(self.region_start);
        let node = svc
            .create(CreateNode::folder(self.home.id.clone(), title).at(at))
            .await?;
        let (given_name, props) = codec::parse(&node.title);
        let proto = props.as_ref().map(schema::window_from_note);
        self.folders.insert(
            0,
            StashFolder {
                node,
                given_name,
                proto,
                bookmark_count: Some(0),
            },
        );
        Ok(&self.folders[0])
    }
}
