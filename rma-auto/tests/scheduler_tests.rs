//! Selection policy and play cycles against a seeded catalog

mod helpers;

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use helpers::{context, movie_line, temp_store, test_config, MockServer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rma_auto::amcp::parse_listing_line;
use rma_auto::catalog::CatalogStore;
use rma_auto::workers::scheduler::{play_next, run_stinger, setup_logo};
use rma_auto::workers::selection::select_clip;
use rma_auto::Error;
use rma_common::config::SchedulerConfig;
use rma_common::events::AutomationEvent;
use rma_common::time::secs_to_chrono;

async fn seed(store: &CatalogStore, paths: &[&str]) -> Vec<i64> {
    let listing: Vec<_> = paths
        .iter()
        .map(|p| parse_listing_line(&movie_line(p, 5000)).unwrap())
        .collect();
    store.reconcile(&listing, Utc::now()).await.unwrap();

    let mut ids = Vec::new();
    for path in paths {
        ids.push(store.entry_by_path(path).await.unwrap().unwrap().id);
    }
    ids
}

#[tokio::test]
async fn test_first_cycle_draws_from_every_clip() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO", "ROCK MUSIC/C-THREE"]).await;
    let policy = SchedulerConfig::default();

    let mut seen = HashSet::new();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let selection = select_clip(&store, &policy, "ROCK MUSIC/", Utc::now(), &mut rng)
            .await
            .unwrap();
        assert!(!selection.degraded);
        seen.insert(selection.candidate.media_id);
    }
    assert_eq!(seen, ids.into_iter().collect());
}

#[tokio::test]
async fn test_played_clip_excluded_inside_window() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO", "ROCK MUSIC/C-THREE"]).await;
    let policy = SchedulerConfig::default();

    store.record_play(ids[0], Utc::now()).await.unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..50 {
        let selection = select_clip(&store, &policy, "ROCK MUSIC/", Utc::now(), &mut rng)
            .await
            .unwrap();
        assert_ne!(selection.candidate.media_id, ids[0]);
    }
}

#[tokio::test]
async fn test_play_outside_window_is_eligible_again() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/A-ONE"]).await;
    let policy = SchedulerConfig::default();

    let long_ago = Utc::now() - secs_to_chrono(policy.anti_repeat_secs + 60);
    store.record_play(ids[0], long_ago).await.unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let selection = select_clip(&store, &policy, "ROCK MUSIC/", Utc::now(), &mut rng)
        .await
        .unwrap();
    assert_eq!(selection.candidate.media_id, ids[0]);
    assert!(!selection.degraded);
}

#[tokio::test]
async fn test_repeats_allowed_when_window_empties_the_pool() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO"]).await;
    let policy = SchedulerConfig::default();
    for id in &ids {
        store.record_play(*id, Utc::now()).await.unwrap();
    }

    let mut rng = StdRng::seed_from_u64(9);
    let selection = select_clip(&store, &policy, "ROCK MUSIC/", Utc::now(), &mut rng)
        .await
        .unwrap();
    assert!(selection.degraded);
    assert!(ids.contains(&selection.candidate.media_id));
}

#[tokio::test]
async fn test_blocked_and_foreign_clips_never_selected() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO", "JINGLES/C-THREE"]).await;
    assert!(store.set_blocked("rock music/a-one", true).await.unwrap());
    let policy = SchedulerConfig::default();

    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..30 {
        let selection = select_clip(&store, &policy, "ROCK MUSIC/", Utc::now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(selection.candidate.media_id, ids[1]);
    }
}

#[tokio::test]
async fn test_nothing_playable_is_an_error() {
    let (_dir, store) = temp_store().await;
    seed(&store, &["ROCK MUSIC/A-ONE"]).await;
    store.set_blocked("ROCK MUSIC/A-ONE", true).await.unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let result = select_clip(&store, &SchedulerConfig::default(), "ROCK MUSIC/", Utc::now(), &mut rng).await;
    assert!(matches!(result, Err(Error::NoEligibleClip(_))));
}

#[tokio::test]
async fn test_artist_cooldown_preferred() {
    let (_dir, store) = temp_store().await;
    let ids = seed(
        &store,
        &[
            "ROCK MUSIC/QUEEN-BOHEMIAN RHAPSODY",
            "ROCK MUSIC/QUEEN-RADIO GAGA",
            "ROCK MUSIC/QUEEN-UNDER PRESSURE",
            "ROCK MUSIC/HEART-BARRACUDA",
        ],
    )
    .await;
    store.record_play(ids[0], Utc::now()).await.unwrap();

    for seed_value in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed_value);
        let selection = select_clip(&store, &SchedulerConfig::default(), "ROCK MUSIC/", Utc::now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(selection.candidate.media_id, ids[3]);
        assert!(!selection.forced_artist);
    }
}

#[tokio::test]
async fn test_artist_cooldown_gives_way_after_budget() {
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/QUEEN-ONE", "ROCK MUSIC/QUEEN-TWO"]).await;
    store.record_play(ids[0], Utc::now()).await.unwrap();

    let mut rng = StdRng::seed_from_u64(4);
    let selection = select_clip(&store, &SchedulerConfig::default(), "ROCK MUSIC/", Utc::now(), &mut rng)
        .await
        .unwrap();
    assert_eq!(selection.candidate.media_id, ids[1]);
    assert!(selection.forced_artist);
}

#[tokio::test]
async fn test_play_cycle_sends_play_and_overlay() {
    let server = MockServer::start().await;
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/LED ZEPPELIN-KASHMIR (REMASTER)"]).await;

    let ctx = context(helpers::test_config(server.port()), store.clone());
    let mut events = ctx.state.events().subscribe();
    let client = ctx.client();
    let mut rng = StdRng::seed_from_u64(1);

    let selection = play_next(&client, &ctx, &mut rng).await.unwrap();
    assert_eq!(selection.candidate.media_id, ids[0]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        server.commands(),
        vec![
            "PLAY 1-10 \"ROCK MUSIC/LED ZEPPELIN-KASHMIR (REMASTER)\" MIX 30".to_string(),
            r#"CG 1 ADD 1 NOW_PLAYING 1 "{\"artist\":\"Led Zeppelin\",\"song\":\"Kashmir\"}""#.to_string(),
        ]
    );

    assert!(store.last_played(ids[0]).await.unwrap().is_some());
    assert_eq!(store.play_history().await.unwrap().len(), 1);

    match events.recv().await.unwrap() {
        AutomationEvent::ClipStarted { media_id, artist, title, .. } => {
            assert_eq!(media_id, ids[0]);
            assert_eq!(artist, "Led Zeppelin");
            assert_eq!(title, "Kashmir");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_play_fails_the_cycle() {
    let server = MockServer::start().await;
    server.reject("PLAY", "404 PLAY FAILED");
    let (_dir, store) = temp_store().await;
    let ids = seed(&store, &["ROCK MUSIC/DEEP PURPLE-HIGHWAY STAR"]).await;

    let ctx = context(test_config(server.port()), store.clone());
    let mut events = ctx.state.events().subscribe();
    let client = ctx.client();
    let mut rng = StdRng::seed_from_u64(1);

    let err = play_next(&client, &ctx, &mut rng).await.unwrap_err();
    match err {
        Error::Rejected { reply, .. } => assert_eq!(reply, "404 PLAY FAILED"),
        other => panic!("unexpected error {:?}", other),
    }

    assert!(store.play_history().await.unwrap().is_empty());
    assert!(store.last_played(ids[0]).await.unwrap().is_none());
    assert!(server.commands_matching("CG").is_empty());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_scheduler_worker_retries_rejected_play() {
    let server = MockServer::start().await;
    server.reject("PLAY", "404 PLAY FAILED");
    let (_dir, store) = temp_store().await;
    seed(&store, &["ROCK MUSIC/DEEP PURPLE-HIGHWAY STAR"]).await;

    let ctx = context(test_config(server.port()), store.clone());
    let handle = rma_auto::workers::spawn_worker(rma_auto::workers::WorkerKind::Scheduler, &ctx);

    ctx.state.request_play_next();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.commands_matching("PLAY 1-10").len(), 1);
    assert!(store.play_history().await.unwrap().is_empty());

    // No new signal: the failed cycle re-arms itself after empty_retry_secs
    server.accept("PLAY");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(server.commands_matching("PLAY 1-10").len(), 2);
    assert_eq!(store.play_history().await.unwrap().len(), 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_second_cycle_avoids_first_clip() {
    let server = MockServer::start().await;
    let (_dir, store) = temp_store().await;
    seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO", "ROCK MUSIC/C-THREE"]).await;

    let ctx = context(test_config(server.port()), store.clone());
    let client = ctx.client();
    let mut rng = StdRng::seed_from_u64(21);

    let first = play_next(&client, &ctx, &mut rng).await.unwrap();
    let second = play_next(&client, &ctx, &mut rng).await.unwrap();
    let third = play_next(&client, &ctx, &mut rng).await.unwrap();

    let picked: HashSet<_> = [first, second, third]
        .iter()
        .map(|s| s.candidate.media_id)
        .collect();
    assert_eq!(picked.len(), 3);
}

#[tokio::test]
async fn test_logo_and_stinger_sequences() {
    let server = MockServer::start().await;
    let (_dir, store) = temp_store().await;
    let ctx = context(test_config(server.port()), store);
    let client = ctx.client();

    setup_logo(&client, &ctx).await.unwrap();
    run_stinger(&client, &ctx).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        server.commands(),
        vec![
            "MIXER 1-30 FILL 0.04 0.04 0.2 0.19",
            "PLAY 1-30 \"LOGO\" LOOP",
            "PLAY 1-30 EMPTY MIX 30",
            "MIXER 1-20 CHROMA GREEN 0.1 0.2 1",
            "PLAY 1-20 \"STINGER\" AUTO",
            "MIXER 1-30 FILL 0.04 0.04 0.2 0.19",
            "PLAY 1-30 \"LOGO\" MIX 30 LOOP",
        ]
    );
}

#[tokio::test]
async fn test_scheduler_worker_plays_on_signal() {
    let server = MockServer::start().await;
    let (_dir, store) = temp_store().await;
    seed(&store, &["ROCK MUSIC/A-ONE", "ROCK MUSIC/B-TWO"]).await;

    let mut config = test_config(server.port());
    config.playback.stinger_interval = 2;
    let ctx = context(config, store.clone());
    let handle = rma_auto::workers::spawn_worker(rma_auto::workers::WorkerKind::Scheduler, &ctx);

    ctx.state.request_play_next();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.commands_matching("PLAY 1-10").len(), 1);

    ctx.state.request_play_next();
    // Second play triggers the stinger (1s lead-in, no hold)
    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(server.commands_matching("PLAY 1-10").len(), 2);
    assert_eq!(server.commands_matching("PLAY 1-20").len(), 1);
    assert_eq!(store.play_history().await.unwrap().len(), 2);

    handle.stop().await;
}
