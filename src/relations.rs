//! Opener relationship resolver. Tab ids change whenever tabs are
//! recreated, so opener links are carried as correlation keys and re-linked
//! onto the new ids after creation. The same pass serves both moves within
//! a session (keys are the old tab ids) and unstashes (keys are surrogate
//! ids decoded from annotations).

use crate::browser::Tabs;
use crate::types::{ProtoTab, StashableTab, Tab, TabPatch};
use log::debug;
use std::collections::{HashMap, HashSet};

/// One tab's correlation keys: how it names itself and which key its
/// opener goes by. Either side may be absent.
#[derive(Debug, Clone, Default)]
pub struct OpenerSpec {
    pub self_key: Option<String>,
    pub opener_key: Option<String>,
}

/// Stash direction: confine opener links to the batch. A tab whose opener
/// is outside the batch (or is itself) loses the link; tabs referenced as
/// openers are flagged so the codec records their identity.
pub fn prepare(batch: &mut [StashableTab]) {
    let in_batch: HashSet<_> = batch.iter().map(|entry| entry.tab.id).collect();
    let mut parents = HashSet::new();
    for entry in batch.iter_mut() {
        entry.opener_in_batch = entry
            .tab
            .opener_tab_id
            .filter(|opener| *opener != entry.tab.id && in_batch.contains(opener));
        if let Some(opener) = entry.opener_in_batch {
            parents.insert(opener);
        }
    }
    for entry in batch.iter_mut() {
        entry.is_parent = parents.contains(&entry.tab.id);
    }
}

/// Correlation specs for re-linking tabs moved within the same session:
/// the live tab ids are the keys.
pub fn specs_by_tab_id(tabs: &[Tab]) -> Vec<OpenerSpec> {
    tabs.iter()
        .map(|tab| OpenerSpec {
            self_key: Some(tab.id.to_string()),
            opener_key: tab.opener_tab_id.map(|id| id.to_string()),
        })
        .collect()
}

/// Correlation specs for freshly created tabs: the surrogate ids decoded
/// from stash annotations are the keys.
pub fn specs_by_surrogate(protos: &[ProtoTab]) -> Vec<OpenerSpec> {
    protos
        .iter()
        .map(|proto| OpenerSpec {
            self_key: proto.surrogate_id.clone(),
            opener_key: proto.parent_surrogate.clone(),
        })
        .collect()
}

/// Re-link opener relationships onto `new_tabs`, which correspond
/// position-for-position to `specs`. Keys that resolve nowhere, or resolve
/// to the tab itself, are dropped silently.
pub async fn restore(svc: &dyn Tabs, new_tabs: &[Tab], specs: &[OpenerSpec]) {
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for (at, spec) in specs.iter().enumerate().take(new_tabs.len()) {
        if let Some(key) = spec.self_key.as_deref() {
            by_key.insert(key, at);
        }
    }
    for (at, spec) in specs.iter().enumerate().take(new_tabs.len()) {
        let Some(opener_key) = spec.opener_key.as_deref() else {
            continue;
        };
        let Some(&parent_at) = by_key.get(opener_key) else {
            continue;
        };
        if parent_at == at {
            continue;
        }
        let patch = TabPatch {
            opener_tab_id: Some(new_tabs[parent_at].id),
            ..Default::default()
        };
        if let Err(err) = svc.update(new_tabs[at].id, patch).await {
            debug!("opener link skipped for tab {}: {err}", new_tabs[at].id);
        }
    }
}
