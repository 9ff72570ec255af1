#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use autoplay_event_bus::RunEvent;
use playback_flow::sim::{SimEntry, SimEvent, SimulatedPage};
use playback_flow::{Sequencer, SequencerConfig};
use autoplay_core_types::PageShape;
use tokio::sync::broadcast;
use url::Url;

pub const CLIP_SECONDS: f64 = 1.0;

pub fn page_url() -> Url {
    Url::parse("https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=1").unwrap()
}

pub fn table_page(count: usize) -> SimulatedPage {
    let url = page_url();
    let entries = (0..count)
        .map(|id| SimEntry::new(&url, id, 2, CLIP_SECONDS))
        .collect();
    SimulatedPage::new(PageShape::Table, url, entries)
}

pub fn table_page_with(entries: impl FnOnce(&Url) -> Vec<SimEntry>) -> SimulatedPage {
    let url = page_url();
    let entries = entries(&url);
    SimulatedPage::new(PageShape::Table, url, entries)
}

pub fn sequencer(page: &Arc<SimulatedPage>) -> Sequencer {
    sequencer_with(page, SequencerConfig::default())
}

pub fn sequencer_with(page: &Arc<SimulatedPage>, config: SequencerConfig) -> Sequencer {
    Sequencer::new(page.clone(), page.clone(), config)
}

/// Receive run events until one matches.
pub async fn next_run_event<F>(rx: &mut broadcast::Receiver<RunEvent>, mut pred: F) -> RunEvent
where
    F: FnMut(&RunEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            let event = rx.recv().await.expect("run event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("run event never arrived")
}

/// Receive page events until one matches.
pub async fn next_sim_event<F>(rx: &mut broadcast::Receiver<SimEvent>, mut pred: F) -> SimEvent
where
    F: FnMut(&SimEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            let event = rx.recv().await.expect("page event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("page event never arrived")
}

pub async fn activated(rx: &mut broadcast::Receiver<SimEvent>, entry: usize, clip: usize) {
    let wanted = SimulatedPage::clip_element(entry, clip);
    next_sim_event(rx, |event| {
        matches!(event, SimEvent::Activated { element, .. } if *element == wanted)
    })
    .await;
}

/// Original indices of every `ItemStarted` seen until the run goes idle.
pub async fn started_until_idle(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<usize> {
    let mut started = Vec::new();
    loop {
        match next_run_event(rx, |_| true).await {
            RunEvent::ItemStarted { original_index, .. } => started.push(original_index),
            RunEvent::PhaseChanged(autoplay_core_types::Phase::Idle) => return started,
            _ => {}
        }
    }
}
