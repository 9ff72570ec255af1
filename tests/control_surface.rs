use std::sync::Arc;
use std::time::Duration;

use autoplay_core_types::{
    ControlCommand, ControlsView, HostPage, PageShape, Phase, StatusLine,
};
use playback_flow::sim::{SimEntry, SimEvent, SimulatedPage};
use playback_flow::{Sequencer, SequencerConfig};
use sutian_autoplay::{ControlSurface, PumpExit, ALREADY_PLAYING_NOTICE};
use tokio::sync::broadcast;
use url::Url;

const PAGE: &str = "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=1";

fn table_page_at(url: &str, count: usize) -> Arc<SimulatedPage> {
    let url = Url::parse(url).unwrap();
    let entries = (0..count).map(|id| SimEntry::new(&url, id, 2, 1.0)).collect();
    Arc::new(SimulatedPage::new(PageShape::Table, url, entries))
}

fn surface_with(page: &Arc<SimulatedPage>, config: SequencerConfig) -> ControlSurface {
    let sequencer = Sequencer::new(page.clone(), page.clone(), config);
    ControlSurface::new(
        sequencer,
        page.clone(),
        page.clone(),
        "autoplay",
        Duration::from_millis(100),
    )
}

fn surface(page: &Arc<SimulatedPage>) -> ControlSurface {
    surface_with(page, SequencerConfig::default())
}

async fn next_sim_event<F>(rx: &mut broadcast::Receiver<SimEvent>, mut pred: F) -> SimEvent
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

#[tokio::test(start_paused = true)]
async fn row_start_while_playing_is_refused_with_notice() {
    let page = table_page_at(PAGE, 3);
    let surface = surface(&page);

    surface.dispatch(ControlCommand::Start).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Running);

    surface
        .dispatch(ControlCommand::StartFromRow(2))
        .await
        .unwrap();

    assert_eq!(page.notices(), vec![ALREADY_PLAYING_NOTICE.to_string()]);
    let snapshot = surface.sequencer().snapshot();
    assert_eq!(snapshot.phase, Phase::Running);
    assert_eq!(snapshot.queue.len(), 3);

    surface.sequencer().stop().await;
}

#[tokio::test(start_paused = true)]
async fn row_start_while_paused_restarts_from_that_row() {
    let page = table_page_at(PAGE, 3);
    let surface = surface(&page);

    surface.dispatch(ControlCommand::Start).await.unwrap();
    surface.dispatch(ControlCommand::Pause).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Paused);
    let first_run = surface.sequencer().snapshot().run_id;

    surface
        .dispatch(ControlCommand::StartFromRow(2))
        .await
        .unwrap();

    let snapshot = surface.sequencer().snapshot();
    assert_eq!(snapshot.phase, Phase::Running);
    assert_ne!(snapshot.run_id, first_run);
    let rows: Vec<usize> = snapshot.queue.iter().map(|i| i.original_index).collect();
    assert_eq!(rows, vec![2]);
    assert!(page.notices().is_empty());

    surface.sequencer().stop().await;
}

#[tokio::test(start_paused = true)]
async fn row_start_while_idle_starts_there() {
    let page = table_page_at(PAGE, 4);
    let surface = surface(&page);

    surface
        .dispatch(ControlCommand::StartFromRow(1))
        .await
        .unwrap();

    let rows: Vec<usize> = surface
        .sequencer()
        .snapshot()
        .queue
        .iter()
        .map(|i| i.original_index)
        .collect();
    assert_eq!(rows, vec![1, 2, 3]);
    surface.sequencer().stop().await;
}

#[tokio::test(start_paused = true)]
async fn toggle_and_stop_follow_the_phase() {
    let page = table_page_at(PAGE, 2);
    let surface = surface(&page);

    surface.dispatch(ControlCommand::Stop).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Idle);

    surface.dispatch(ControlCommand::Start).await.unwrap();
    surface.dispatch(ControlCommand::TogglePause).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Paused);
    surface.dispatch(ControlCommand::TogglePause).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Running);
    surface.dispatch(ControlCommand::Pause).await.unwrap();
    surface.dispatch(ControlCommand::Resume).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Running);

    surface.dispatch(ControlCommand::Stop).await.unwrap();
    assert_eq!(surface.sequencer().phase(), Phase::Idle);
    assert!(page.highlighted().is_empty());
    assert_eq!(page.host(), None);
}

#[tokio::test(start_paused = true)]
async fn backdrop_click_pauses_and_closes_the_host() {
    let page = table_page_at(PAGE, 2);
    let surface = surface_with(
        &page,
        SequencerConfig {
            keep_host_on_pause: true,
            ..SequencerConfig::default()
        },
    );
    let mut sims = page.subscribe();

    surface.dispatch(ControlCommand::Start).await.unwrap();
    next_sim_event(&mut sims, |e| matches!(e, SimEvent::HostOpened(_))).await;

    surface
        .dispatch(ControlCommand::BackdropClicked)
        .await
        .unwrap();

    assert_eq!(surface.sequencer().phase(), Phase::Paused);
    assert_eq!(page.host(), None);
    surface.sequencer().stop().await;
}

#[tokio::test(start_paused = true)]
async fn resume_marker_is_stripped_and_playback_starts() {
    let page = table_page_at(
        "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=2&autoplay=true",
        2,
    );
    let surface = surface(&page);

    assert!(surface.on_page_load().await.unwrap());

    assert_eq!(
        page.current_url().await.unwrap().as_str(),
        "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=2"
    );
    assert_eq!(surface.sequencer().phase(), Phase::Running);
    surface.sequencer().stop().await;
}

#[tokio::test(start_paused = true)]
async fn plain_page_load_stays_idle() {
    let page = table_page_at(PAGE, 2);
    let surface = surface(&page);

    assert!(!surface.on_page_load().await.unwrap());
    assert_eq!(surface.sequencer().phase(), Phase::Idle);
    assert_eq!(page.current_url().await.unwrap().as_str(), PAGE);
}

#[tokio::test(start_paused = true)]
async fn forwarder_mirrors_phase_and_progress() {
    let page = table_page_at(PAGE, 3);
    let surface = surface(&page);
    let mut sims = page.subscribe();
    let forwarder = surface.spawn_forwarder();

    surface.install().await.unwrap();
    assert!(page.controls_installed());
    assert_eq!(page.rendered(), Some((ControlsView::Idle, StatusLine::Cleared)));

    surface.dispatch(ControlCommand::Start).await.unwrap();
    next_sim_event(&mut sims, |e| {
        matches!(
            e,
            SimEvent::Rendered {
                view: ControlsView::Running,
                status: StatusLine::Running { position: 0, total: 3 },
            }
        )
    })
    .await;

    surface.dispatch(ControlCommand::Pause).await.unwrap();
    next_sim_event(&mut sims, |e| {
        matches!(
            e,
            SimEvent::Rendered {
                view: ControlsView::Paused,
                status: StatusLine::Paused { position: 0, total: 3 },
            }
        )
    })
    .await;

    surface.dispatch(ControlCommand::Stop).await.unwrap();
    next_sim_event(&mut sims, |e| {
        matches!(
            e,
            SimEvent::Rendered {
                view: ControlsView::Idle,
                status: StatusLine::Cleared,
            }
        )
    })
    .await;

    forwarder.abort();
}

#[tokio::test(start_paused = true)]
async fn pump_dispatches_page_clicks_and_returns_on_pagination() {
    let page = Arc::new(
        SimulatedPage::new(
            PageShape::Table,
            Url::parse(PAGE).unwrap(),
            vec![SimEntry::new(&Url::parse(PAGE).unwrap(), 0, 1, 1.0)],
        )
        .with_next_page("/und-hani/tshiau?lui=tai_su&iahbe=2"),
    );
    let surface = surface(&page);
    page.push_command(ControlCommand::Start);

    let exit = tokio::time::timeout(
        Duration::from_secs(3600),
        surface.pump(Duration::from_millis(250), std::future::pending::<()>()),
    )
    .await
    .expect("pump never returned");

    let expected = "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=2&autoplay=true";
    assert_eq!(exit, PumpExit::Navigated(expected.to_string()));
    surface.sequencer().join().await;
    assert_eq!(
        page.navigations()
            .iter()
            .map(Url::to_string)
            .collect::<Vec<_>>(),
        vec![expected.to_string()]
    );
    assert!(page.controls_installed());
}

#[tokio::test(start_paused = true)]
async fn pump_stops_on_shutdown() {
    let page = table_page_at(PAGE, 1);
    let surface = surface(&page);
    let exit = surface
        .pump(Duration::from_millis(250), tokio::time::sleep(Duration::from_secs(1)))
        .await;
    assert_eq!(exit, PumpExit::Shutdown);
    assert_eq!(surface.sequencer().phase(), Phase::Idle);
}
