//! End-to-end stash coverage against the in-memory browser: windows and
//! selected tabs go in as annotated bookmarks, and folders come back out as
//! windows with their state intact.

use anyhow::Result;
use winstash::codec;
use winstash::config::Config;
use winstash::memory::{MemoryBrowser, OTHER_ID};
use winstash::orchestrator::{Orchestrator, Request, Response};
use winstash::schema;
use winstash::types::{CreateNode, Node, NodeKind, TabId, WindowId};

/// Browser plus an orchestrator stashing straight into the "other" root.
fn setup() -> (MemoryBrowser, Orchestrator) {
    let mem = MemoryBrowser::new();
    let orchestrator = Orchestrator::new(mem.browser(), Config::default());
    (mem, orchestrator)
}

/// A second window so stashing does not trip the last-window rule.
fn keeper_window(mem: &MemoryBrowser) -> WindowId {
    let keeper = mem.open_window(false);
    mem.open_tab(keeper, "https://example.com/keep", "keep");
    keeper
}

fn three_tab_window(mem: &MemoryBrowser) -> (WindowId, Vec<TabId>) {
    let window = mem.open_window(false);
    let tabs = vec![
        mem.open_tab(window, "https://example.com/a", "A"),
        mem.open_tab(window, "https://example.com/b", "B"),
        mem.open_tab(window, "https://example.com/c", "C"),
    ];
    (window, tabs)
}

async fn stash(orchestrator: &Orchestrator, window: WindowId, name: Option<&str>) -> Result<Node> {
    match orchestrator
        .dispatch(Request::Stash {
            window_id: window,
            name: name.map(str::to_string),
        })
        .await?
    {
        Response::Stashed { folder } => Ok(folder),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn test_stash_window_creates_ordered_bookmarks() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let (window, _) = three_tab_window(&mem);
    mem.name_window(window, "Work");

    let folder = stash(&orchestrator, window, None).await?;
    assert_eq!(folder.title, "Work");

    let children = mem.browser().bookmarks.children(&folder.id).await?;
    let titles: Vec<&str> = children.iter().map(|node| node.title.as_str()).collect();
    assert_eq!(titles, ["A", "B", "C"]);
    assert!(children.iter().all(|node| node.kind == NodeKind::Bookmark));
    assert_eq!(children[0].url.as_deref(), Some("https://example.com/a"));

    // the stashed window is gone, the keeper stays
    assert_eq!(mem.window_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stash_window_annotates_tab_state() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let window = mem.open_window(false);
    let first = mem.open_tab(window, "https://example.com/a", "A");
    let second = mem.open_tab(window, "https://example.com/b", "B");
    mem.pin_tab(first);
    mem.mute_tab(second);
    mem.activate_tab(second);
    mem.set_opener(second, first);

    let folder = stash(&orchestrator, window, Some("annotated")).await?;
    let children = mem.browser().bookmarks.children(&folder.id).await?;

    let parent_key = schema::surrogate_id(&folder.id, first);
    assert_eq!(
        children[0].title,
        format!("A {{\"pinned\":true,\"id\":\"{parent_key}\"}}")
    );
    assert_eq!(
        children[1].title,
        format!("B {{\"active\":true,\"muted\":true,\"parentId\":\"{parent_key}\"}}")
    );
    Ok(())
}

#[tokio::test]
async fn test_stash_round_trip_restores_tab_state() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let (window, tabs) = three_tab_window(&mem);
    mem.pin_tab(tabs[0]);
    mem.activate_tab(tabs[1]);
    mem.mute_tab(tabs[2]);
    mem.set_opener(tabs[2], tabs[1]);
    let store = mem.add_identity("Work");
    mem.set_cookie_store(tabs[2], &store);

    let folder = stash(&orchestrator, window, Some("round")).await?;
    assert_eq!(mem.window_count(), 1);

    let response = orchestrator
        .dispatch(Request::Unstash {
            node_id: folder.id.clone(),
            name: None,
            remove: true,
        })
        .await?;
    let Response::WindowOpened { window: reopened } = response else {
        panic!("expected a window");
    };

    assert_eq!(reopened.name.as_deref(), Some("round"));
    let urls: Vec<&str> = reopened.tabs.iter().map(|tab| tab.url.as_str()).collect();
    assert_eq!(
        urls,
        [
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c"
        ]
    );
    assert!(reopened.tabs[0].pinned);
    assert!(reopened.tabs[1].active);
    assert!(reopened.tabs[2].muted);
    // the container annotation resolved back to the same identity
    assert_eq!(reopened.tabs[2].cookie_store, store);
    // the opener link points at the new id of its parent
    assert_eq!(reopened.tabs[2].opener_tab_id, Some(reopened.tabs[1].id));

    // removal was requested and nothing needed preserving
    assert!(mem.browser().bookmarks.node(&folder.id).await.is_err());
    assert_eq!(mem.window_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stash_window_reuses_bookmarkless_folder() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let window = mem.open_window(false);
    mem.open_tab(window, "https://example.com/a", "A");
    mem.open_tab(window, "https://example.com/b", "B");
    mem.name_window(window, "Work");
    let browser = mem.browser();

    let folder = stash(&orchestrator, window, None).await?;
    // a hand-made sub-folder keeps the shell alive through unstash
    let notes = browser
        .bookmarks
        .create(CreateNode::folder(folder.id.clone(), "notes"))
        .await?;

    let Response::WindowOpened { window: reopened } = orchestrator
        .dispatch(Request::Unstash {
            node_id: folder.id.clone(),
            name: None,
            remove: true,
        })
        .await?
    else {
        panic!("expected a window");
    };

    // bookmarks went, the folder and its sub-folder did not
    let children = browser.bookmarks.children(&folder.id).await?;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, notes.id);

    // stashing the same name again fills the empty folder instead of
    // creating a duplicate, and lands before the sub-folder
    let again = stash(&orchestrator, reopened.id, None).await?;
    assert_eq!(again.id, folder.id);
    let children = browser.bookmarks.children(&folder.id).await?;
    assert_eq!(children.len(), 3);
    // A came back as the reopened window's active tab, so its title
    // regained an annotation; compare the decoded text
    assert_eq!(codec::parse(&children[0].title).0, "A");
    assert_eq!(codec::parse(&children[1].title).0, "B");
    assert_eq!(children[2].id, notes.id);
    Ok(())
}

#[tokio::test]
async fn test_stash_window_defaults_to_generated_name() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let (window, _) = three_tab_window(&mem);

    let folder = stash(&orchestrator, window, None).await?;
    assert!(folder.title.starts_with("saved-20"), "got {}", folder.title);
    Ok(())
}

#[tokio::test]
async fn test_stash_last_window_still_completes() -> Result<()> {
    let (mem, orchestrator) = setup();
    let window = mem.open_window(false);
    mem.open_tab(window, "https://example.com/a", "A");
    mem.open_tab(window, "https://example.com/b", "B");

    let folder = stash(&orchestrator, window, Some("last")).await?;

    let children = mem.browser().bookmarks.children(&folder.id).await?;
    assert_eq!(children.len(), 2);
    assert_eq!(mem.window_count(), 0);

    // both busy marks were dropped when the operation finished
    assert!(!orchestrator.guard().is_busy(window));
    assert!(!orchestrator.guard().is_busy(folder.id.clone()));
    Ok(())
}

#[tokio::test]
async fn test_stash_home_subfolder_created_once() -> Result<()> {
    let mem = MemoryBrowser::new();
    let config = Config {
        home_folder: Some("Stashed Windows".to_string()),
        ..Config::default()
    };
    let orchestrator = Orchestrator::new(mem.browser(), config.clone());
    keeper_window(&mem);
    let browser = mem.browser();

    let (window, _) = three_tab_window(&mem);
    mem.name_window(window, "Work");
    stash(&orchestrator, window, None).await?;

    let other_id = OTHER_ID.to_string();
    let roots_children = browser.bookmarks.children(&other_id).await?;
    assert_eq!(roots_children.len(), 1);
    assert_eq!(roots_children[0].title, "Stashed Windows");
    assert_eq!(roots_children[0].kind, NodeKind::Folder);
    let home_id = roots_children[0].id.clone();

    let inside = browser.bookmarks.children(&home_id).await?;
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0].title, "Work");

    // a fresh orchestrator finds the cached home id instead of creating
    // a second subfolder
    let second = Orchestrator::new(mem.browser(), config);
    let (window, _) = three_tab_window(&mem);
    mem.name_window(window, "Play");
    stash(&second, window, None).await?;

    let roots_children = browser.bookmarks.children(&other_id).await?;
    assert_eq!(roots_children.len(), 1);
    let inside = browser.bookmarks.children(&home_id).await?;
    let titles: Vec<&str> = inside.iter().map(|node| node.title.as_str()).collect();
    // newest first
    assert_eq!(titles, ["Play", "Work"]);
    Ok(())
}

#[tokio::test]
async fn test_stash_selected_into_folder_head() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let browser = mem.browser();
    let other_id = OTHER_ID.to_string();
    let folder = browser
        .bookmarks
        .create(CreateNode::folder(other_id, "drop zone"))
        .await?;

    let window = mem.open_window(false);
    let p = mem.open_tab(window, "https://example.com/p", "P");
    let q = mem.open_tab(window, "https://example.com/q", "Q");
    let r = mem.open_tab(window, "https://example.com/r", "R");
    mem.select_tabs(&[p, r]);

    let Response::TabsStashed { folder: target, count } = orchestrator
        .dispatch(Request::StashSelected {
            node_id: folder.id.clone(),
        })
        .await?
    else {
        panic!("expected stashed tabs");
    };
    assert_eq!(target.id, folder.id);
    assert_eq!(count, 2);

    let children = browser.bookmarks.children(&folder.id).await?;
    let titles: Vec<&str> = children.iter().map(|node| node.title.as_str()).collect();
    assert_eq!(titles, ["P", "R"]);

    // the stashed tabs left the window, the unselected one stayed
    let remaining = browser.tabs.of_window(window).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, q);
    Ok(())
}

#[tokio::test]
async fn test_stash_selected_before_bookmark() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let browser = mem.browser();
    let other_id = OTHER_ID.to_string();
    let folder = browser
        .bookmarks
        .create(CreateNode::folder(other_id, "drop zone"))
        .await?;
    browser
        .bookmarks
        .create(CreateNode::bookmark(
            folder.id.clone(),
            "X",
            "https://example.com/x",
        ))
        .await?;
    let anchor = browser
        .bookmarks
        .create(CreateNode::bookmark(
            folder.id.clone(),
            "Y",
            "https://example.com/y",
        ))
        .await?;

    let window = mem.open_window(false);
    let p = mem.open_tab(window, "https://example.com/p", "P");
    mem.open_tab(window, "https://example.com/q", "Q");
    mem.select_tabs(&[p]);

    orchestrator
        .dispatch(Request::StashSelected {
            node_id: anchor.id.clone(),
        })
        .await?;

    let children = browser.bookmarks.children(&folder.id).await?;
    let titles: Vec<&str> = children.iter().map(|node| node.title.as_str()).collect();
    assert_eq!(titles, ["X", "P", "Y"]);
    Ok(())
}

#[tokio::test]
async fn test_stash_selected_whole_window_closes_it() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let browser = mem.browser();
    let other_id = OTHER_ID.to_string();
    let folder = browser
        .bookmarks
        .create(CreateNode::folder(other_id, "drop zone"))
        .await?;

    let window = mem.open_window(false);
    let p = mem.open_tab(window, "https://example.com/p", "P");
    let q = mem.open_tab(window, "https://example.com/q", "Q");
    mem.select_tabs(&[p, q]);

    orchestrator
        .dispatch(Request::StashSelected {
            node_id: folder.id.clone(),
        })
        .await?;

    let children = browser.bookmarks.children(&folder.id).await?;
    assert_eq!(children.len(), 2);
    assert_eq!(mem.window_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stash_selected_last_window_still_completes() -> Result<()> {
    let (mem, orchestrator) = setup();
    let browser = mem.browser();
    let folder = browser
        .bookmarks
        .create(CreateNode::folder(OTHER_ID.to_string(), "drop zone"))
        .await?;

    let window = mem.open_window(false);
    let p = mem.open_tab(window, "https://example.com/p", "P");
    let q = mem.open_tab(window, "https://example.com/q", "Q");
    mem.select_tabs(&[p, q]);

    orchestrator
        .dispatch(Request::StashSelected {
            node_id: folder.id.clone(),
        })
        .await?;

    // selecting every tab of the only window defers the close until the
    // bookmarks exist
    let children = browser.bookmarks.children(&folder.id).await?;
    let titles: Vec<&str> = children.iter().map(|node| node.title.as_str()).collect();
    assert_eq!(titles, ["P", "Q"]);
    assert_eq!(mem.window_count(), 0);
    assert!(!orchestrator.guard().is_busy(window));
    assert!(!orchestrator.guard().is_busy(folder.id.clone()));
    Ok(())
}

#[tokio::test]
async fn test_stash_selected_requires_a_selection() -> Result<()> {
    let (mem, orchestrator) = setup();
    keeper_window(&mem);
    let browser = mem.browser();
    let other_id = OTHER_ID.to_string();
    let folder = browser
        .bookmarks
        .create(CreateNode::folder(other_id, "drop zone"))
        .await?;

    let window = mem.open_window(false);
    mem.open_tab(window, "https://example.com/p", "P");

    let result = orchestrator
        .dispatch(Request::StashSelected {
            node_id: folder.id.clone(),
        })
        .await;
    assert!(result.is_err());
    Ok(())
}
