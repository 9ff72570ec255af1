mod common;

use std::sync::Arc;
use std::time::Duration;

use autoplay_core_types::{HostPage, ItemOutcome, Phase};
use autoplay_event_bus::RunEvent;
use playback_flow::sim::{SimEntry, SimulatedPage};
use playback_flow::{
    build_queue, queue_offset_for_raw, PauseSource, StartOutcome, COMPLETION_NOTICE,
};

use common::*;

#[tokio::test(start_paused = true)]
async fn three_items_play_in_order_then_complete() {
    let page = Arc::new(table_page(3));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();

    assert_eq!(seq.start(0).await.unwrap(), StartOutcome::Started { total: 3 });

    let mut started = Vec::new();
    let mut saw_completed = false;
    loop {
        match next_run_event(&mut events, |_| true).await {
            RunEvent::ItemStarted { original_index, .. } => started.push(original_index),
            RunEvent::PhaseChanged(Phase::Completed) => saw_completed = true,
            RunEvent::Notice(message) => {
                assert_eq!(message, COMPLETION_NOTICE);
                break;
            }
            _ => {}
        }
    }
    seq.join().await;

    assert_eq!(started, vec![0, 1, 2]);
    assert!(saw_completed);
    assert_eq!(seq.phase(), Phase::Idle);
    assert!(page.navigations().is_empty());
    assert_eq!(page.activations().len(), 6);
    assert!(page.highlighted().is_empty());
    assert!(page.host().is_none());
}

#[tokio::test(start_paused = true)]
async fn pause_mid_item_retries_the_same_item_on_resume() {
    let page = Arc::new(table_page(5));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();
    let mut sim = page.subscribe();

    seq.start(0).await.unwrap();
    activated(&mut sim, 1, 0).await;

    assert!(seq.pause(PauseSource::Button).await);
    assert_eq!(seq.phase(), Phase::Paused);

    let finished = next_run_event(&mut events, |event| {
        matches!(event, RunEvent::ItemFinished { position: 1, .. })
    })
    .await;
    assert_eq!(
        finished,
        RunEvent::ItemFinished {
            position: 1,
            original_index: 1,
            outcome: ItemOutcome::Interrupted,
        }
    );

    let snapshot = seq.snapshot();
    assert_eq!(snapshot.cursor, 1);
    assert_eq!(snapshot.current().unwrap().original_index, 1);

    let activations_while_paused = page.activations().len();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(page.activations().len(), activations_while_paused);
    assert!(page.host().is_none());

    assert_eq!(seq.start(0).await.unwrap(), StartOutcome::Resumed);
    let restarted = next_run_event(&mut events, |event| {
        matches!(event, RunEvent::ItemStarted { .. })
    })
    .await;
    assert_eq!(
        restarted,
        RunEvent::ItemStarted {
            position: 1,
            total: 5,
            original_index: 1,
        }
    );
    activated(&mut sim, 1, 0).await;

    assert!(seq.stop().await);
}

#[tokio::test(start_paused = true)]
async fn start_row_maps_onto_playable_items() {
    let page = Arc::new(table_page_with(|url| {
        vec![
            SimEntry::new(url, 0, 1, CLIP_SECONDS),
            SimEntry::new(url, 1, 1, CLIP_SECONDS),
            SimEntry::silent(url, 2),
            SimEntry::new(url, 3, 1, CLIP_SECONDS),
            SimEntry::silent(url, 4),
        ]
    }));

    let queue = build_queue(&page.scan().await.unwrap()).unwrap();
    assert_eq!(queue.len(), 3);
    assert_eq!(queue_offset_for_raw(&queue, 3), Some(2));

    let seq = sequencer(&page);
    let mut events = seq.subscribe();
    assert_eq!(seq.start(3).await.unwrap(), StartOutcome::Started { total: 1 });
    assert_eq!(started_until_idle(&mut events).await, vec![3]);

    let mut events = seq.subscribe();
    assert_eq!(seq.start(2).await.unwrap(), StartOutcome::Started { total: 1 });
    assert_eq!(started_until_idle(&mut events).await, vec![3]);
}

#[tokio::test(start_paused = true)]
async fn start_past_last_playable_row_is_refused() {
    let page = Arc::new(table_page_with(|url| {
        vec![SimEntry::new(url, 0, 1, CLIP_SECONDS), SimEntry::silent(url, 1)]
    }));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();

    assert!(seq.start(1).await.is_err());
    assert_eq!(seq.phase(), Phase::Idle);
    assert!(matches!(
        next_run_event(&mut events, |_| true).await,
        RunEvent::Notice(_)
    ));
}

#[tokio::test]
async fn stop_without_a_run_is_a_no_op() {
    let page = Arc::new(table_page(2));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();

    assert!(!seq.stop().await);
    assert_eq!(seq.phase(), Phase::Idle);
    assert!(seq.snapshot().queue.is_empty());
    assert!(events.try_recv().is_err());
    assert!(page.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_page_refuses_to_start() {
    let page = Arc::new(table_page_with(|url| {
        vec![SimEntry::silent(url, 0), SimEntry::silent(url, 1)]
    }));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();

    let err = seq.start(0).await.unwrap_err();
    assert!(err.is_blocking());
    assert_eq!(seq.phase(), Phase::Idle);
    assert!(matches!(
        next_run_event(&mut events, |_| true).await,
        RunEvent::Notice(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn completion_hands_off_to_next_page() {
    let page = Arc::new(table_page(2).with_next_page("/und-hani/tshiau?lui=tai_su&iahbe=2"));
    let seq = sequencer(&page);
    let mut events = seq.subscribe();

    seq.start(0).await.unwrap();
    let navigating = next_run_event(&mut events, |event| {
        matches!(event, RunEvent::Navigating { .. })
    })
    .await;
    seq.join().await;

    let expected =
        "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=2&autoplay=true";
    assert_eq!(
        navigating,
        RunEvent::Navigating {
            url: expected.to_string()
        }
    );
    assert_eq!(page.navigations().len(), 1);
    assert_eq!(page.navigations()[0].as_str(), expected);
    assert_eq!(seq.phase(), Phase::Idle);
    assert!(page.highlighted().is_empty());
}
