//! End-to-end: a full investigation streamed through the session runtime,
//! observed purely through snapshots.

use inquest_core::{EngineConfig, Interaction, Lane, RuntimeConfig, ViewState};
use inquest_graph::Snapshot;
use inquest_runtime::{drive, DemoFeed, FeedSource, SessionRegistry};
use std::time::Duration;
use tokio::sync::broadcast;

async fn recv_until<F>(rx: &mut broadcast::Receiver<Snapshot>, mut pred: F) -> Snapshot
where
    F: FnMut(&Snapshot) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(snapshot) if pred(&snapshot) => return snapshot,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(e) => panic!("snapshot stream ended early: {e}"),
        }
    }
}

#[tokio::test]
async fn demo_session_streams_to_a_complete_graph() {
    let registry = SessionRegistry::new(EngineConfig::default(), RuntimeConfig::default());
    let feed = DemoFeed::new("ACME", Duration::ZERO);
    let handle = registry.open(feed.investigation_id()).unwrap();
    let mut rx = handle.subscribe();

    drive(feed, &handle).await.unwrap();
    let done = recv_until(&mut rx, |s| s.terminated).await;

    assert_eq!(done.nodes.len(), 7);
    assert_eq!(done.positions.len(), 7);
    assert!(done.diagnostics.is_empty());

    // Every lane of the canonical investigation is on screen.
    for lane in [
        Lane::Main,
        Lane::thematic("news"),
        Lane::thematic("financial"),
        Lane::thematic("market"),
        Lane::Validation,
        Lane::Final,
    ] {
        assert!(
            done.positions.iter().any(|p| p.lane == lane),
            "lane {lane} missing from final layout"
        );
    }

    // The master inference is the rightmost node.
    let max_level = done.positions.iter().map(|p| p.level).max().unwrap();
    let final_node = done
        .positions
        .iter()
        .find(|p| p.lane == Lane::Final)
        .unwrap();
    assert_eq!(final_node.level, max_level);
}

#[tokio::test]
async fn interactions_ride_the_same_queue_without_touching_layout() {
    let registry = SessionRegistry::new(EngineConfig::default(), RuntimeConfig::default());
    let feed = DemoFeed::new("ACME", Duration::ZERO);
    let handle = registry.open(feed.investigation_id()).unwrap();
    let mut rx = handle.subscribe();

    drive(feed, &handle).await.unwrap();
    let done = recv_until(&mut rx, |s| s.terminated).await;
    let expand_target = done.positions[0].node_id.clone();

    handle
        .interact(Interaction::Zoom {
            factor: 10.0,
            focal: None,
        })
        .await
        .unwrap();
    handle
        .interact(Interaction::ToggleExpand {
            id: expand_target.clone(),
        })
        .await
        .unwrap();
    let after = recv_until(&mut rx, |s| !s.expanded.is_empty()).await;

    // Zoom clamped, expansion recorded, and not a single node moved.
    assert_eq!(after.view.scale, 3.0);
    assert_eq!(after.expanded, vec![expand_target]);
    assert_eq!(after.positions, done.positions);
}

#[tokio::test]
async fn reset_clears_the_whole_session_at_once() {
    let registry = SessionRegistry::new(EngineConfig::default(), RuntimeConfig::default());
    let feed = DemoFeed::new("ACME", Duration::ZERO);
    let handle = registry.open(feed.investigation_id()).unwrap();
    let mut rx = handle.subscribe();

    drive(feed, &handle).await.unwrap();
    let done = recv_until(&mut rx, |s| s.terminated).await;
    handle
        .interact(Interaction::ToggleExpand {
            id: done.positions[0].node_id.clone(),
        })
        .await
        .unwrap();
    handle
        .interact(Interaction::ToggleExpand {
            id: done.positions[1].node_id.clone(),
        })
        .await
        .unwrap();
    handle
        .interact(Interaction::Pan { dx: 80.0, dy: 40.0 })
        .await
        .unwrap();

    handle.reset().await.unwrap();
    let cleared = recv_until(&mut rx, |s| s.positions.is_empty() && !s.terminated).await;

    assert!(cleared.nodes.is_empty());
    assert!(cleared.edges.is_empty());
    assert!(cleared.expanded.is_empty());
    assert!(cleared.diagnostics.is_empty());
    assert_eq!(cleared.view, ViewState::default());
}
