//! Service boundaries around the host browser. Everything the stash
//! machinery touches goes through these traits, so the whole crate can run
//! against the in-memory browser in tests.

use crate::types::{
    ContainerIdentity, ContextId, CreateNode, Node, NodeId, ProtoTab, ProtoWindow, Tab, TabId,
    TabPatch, Window, WindowId,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Bookmarks: Send + Sync {
    async fn node(&self, id: &NodeId) -> Result<Node>;
    async fn children(&self, parent_id: &NodeId) -> Result<Vec<Node>>;
    async fn create(&self, req: CreateNode) -> Result<Node>;
    /// Remove a single node. Fails on non-empty folders.
    async fn remove(&self, id: &NodeId) -> Result<()>;
    /// Remove a folder and everything under it.
    async fn remove_tree(&self, id: &NodeId) -> Result<()>;
    /// Whether `id` names one of the browser's fixed top-level roots.
    fn is_root(&self, id: &NodeId) -> bool;
}

#[async_trait]
pub trait Windows: Send + Sync {
    async fn create(&self, proto: &ProtoWindow) -> Result<Window>;
    async fn get(&self, id: WindowId, with_tabs: bool) -> Result<Window>;
    async fn all(&self) -> Result<Vec<Window>>;
    async fn last_focused(&self) -> Result<Window>;
    async fn set_name(&self, id: WindowId, name: &str) -> Result<()>;
    async fn minimize(&self, id: WindowId) -> Result<()>;
    async fn remove(&self, id: WindowId) -> Result<()>;
    /// Whether private windows may be opened and their stashes listed.
    fn private_allowed(&self) -> bool;
}

#[async_trait]
pub trait Tabs: Send + Sync {
    async fn create(&self, proto: &ProtoTab) -> Result<Tab>;
    async fn of_window(&self, window_id: WindowId) -> Result<Vec<Tab>>;
    async fn update(&self, id: TabId, patch: TabPatch) -> Result<Tab>;
    async fn remove(&self, ids: &[TabId]) -> Result<()>;
}

#[async_trait]
pub trait Containers: Send + Sync {
    async fn get(&self, context_id: &ContextId) -> Result<ContainerIdentity>;
    async fn query_by_name(&self, name: &str) -> Result<Vec<ContainerIdentity>>;
    async fn create(&self, name: &str) -> Result<ContainerIdentity>;
    /// Whether the contextual-identity feature is present at all.
    fn available(&self) -> bool;
}

/// Session-scoped key/value store used to cache resolved ids.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Bundle of every service the orchestrator needs.
#[derive(Clone)]
pub struct Browser {
    pub bookmarks: Arc<dyn Bookmarks>,
    pub windows: Arc<dyn Windows>,
    pub tabs: Arc<dyn Tabs>,
    pub containers: Arc<dyn Containers>,
    pub session: Arc<dyn SessionStore>,
}
