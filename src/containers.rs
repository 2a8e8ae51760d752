//! Container resolver. Cookie store ids are meaningless across sessions, so
//! stashing records container names and unstashing turns names back into
//! live cookie stores, creating identities on demand. Everything here is
//! best effort; a tab that loses its container still opens.

use crate::browser::Containers;
use crate::types::{ContextId, ProtoTab, StashableTab, DEFAULT_COOKIE_STORE, PRIVATE_COOKIE_STORE};
use log::warn;
use std::collections::HashMap;

/// Stash direction: resolve each staged tab's cookie store into a container
/// name. Tabs in the two built-in stores carry no name. One lookup per
/// distinct store, no matter how many tabs share it.
pub async fn prepare(svc: &dyn Containers, batch: &mut [StashableTab]) {
    if !svc.available() {
        return;
    }
    let mut by_store: HashMap<ContextId, Vec<usize>> = HashMap::new();
    for (at, entry) in batch.iter().enumerate() {
        let store = entry.tab.cookie_store.as_str();
        if store == DEFAULT_COOKIE_STORE || store == PRIVATE_COOKIE_STORE {
            continue;
        }
        by_store.entry(store.to_string()).or_default().push(at);
    }
    for (store, members) in by_store {
        match svc.get(&store).await {
            Ok(identity) => {
                for at in members {
                    batch[at].container = Some(identity.name.clone());
                }
            }
            Err(err) => warn!("container lookup failed for {store}: {err}"),
        }
    }
}

/// Unstash direction: resolve each blueprint's container name into a cookie
/// store, reusing an existing identity of that name or creating one. Names
/// that cannot be resolved are dropped. Private windows never get
/// containers, so there the names are stripped outright.
pub async fn restore(svc: &dyn Containers, protos: &mut [ProtoTab], window_private: bool) {
    if window_private || !svc.available() {
        for proto in protos.iter_mut() {
            proto.container = None;
            proto.cookie_store = None;
        }
        return;
    }
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
    for (at, proto) in protos.iter().enumerate() {
        if let Some(name) = proto.container.as_deref().filter(|name| !name.is_empty()) {
            by_name.entry(name.to_string()).or_default().push(at);
        }
    }
    for (name, members) in by_name {
        let resolved = resolve_name(svc, &name).await;
        for at in members {
            protos[at].container = None;
            protos[at].cookie_store = resolved.clone();
        }
    }
}

async fn resolve_name(svc: &dyn Containers, name: &str) -> Option<ContextId> {
    let existing = svc
        .query_by_name(name)
        .await
        .ok()
        .and_then(|mut found| (!found.is_empty()).then(|| found.remove(0)));
    if let Some(identity) = existing {
        return Some(identity.context_id);
    }
    match svc.create(name).await {
        Ok(identity) => Some(identity.context_id),
        Err(err) => {
            warn!("container create failed for {name}: {err}");
            None
        }
    }
}
