//! Sticky routing, scoring and switch damping.

mod support;

use std::time::Duration;
use support::{mesh_with, MockExchange};

#[tokio::test(start_paused = true)]
async fn healthy_current_exchange_is_kept_even_when_outscored() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b")];
    let mesh = mesh_with(&venues, |_| {});
    mesh.selector().set_priority("a", 0);
    mesh.selector().set_priority("b", 100);
    mesh.monitor().run_cycle().await;

    assert!(mesh.selector().score("b") > mesh.selector().score("a"));
    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("a"));
    assert_eq!(mesh.selector().select_best("BTCUSDT", None).await.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn failover_target_is_stable_across_quick_reselection() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b"), MockExchange::quoting("c")];
    venues[0].set_connected(false);
    let mesh = mesh_with(&venues, |c| c.selector.switch_cooldown_secs = 300);
    mesh.selector().set_priority("b", 100);
    mesh.monitor().run_cycle().await;

    let first = mesh.selector().select_best("BTCUSDT", Some("a")).await;
    assert_eq!(first.as_deref(), Some("b"));

    tokio::time::advance(Duration::from_secs(1)).await;
    let second = mesh.selector().select_best("BTCUSDT", first.as_deref()).await;
    assert_eq!(second, first);
}

#[tokio::test(start_paused = true)]
async fn recent_switch_target_is_damped_until_cooldown_expires() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b"), MockExchange::quoting("c")];
    venues[0].set_connected(false);
    let mesh = mesh_with(&venues, |c| c.selector.switch_cooldown_secs = 300);
    mesh.selector().set_priority("b", 100);
    mesh.monitor().run_cycle().await;

    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("b"));
    assert!(mesh.selector().last_switch_to("b").is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("a"));

    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn nothing_selectable_yields_none() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b")];
    venues[0].set_connected(false);
    venues[1].set_connected(false);
    let mesh = mesh_with(&venues, |_| {});

    // Not probed yet: nothing is known to be healthy.
    assert_eq!(mesh.selector().select_best("BTCUSDT", None).await, None);
    assert_eq!(mesh.selector().routable_exchanges("BTCUSDT").await.len(), 2);

    mesh.monitor().run_cycle().await;
    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await, None);
    assert!(mesh.selector().routable_exchanges("BTCUSDT").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_switch_keeps_failed_current() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b")];
    venues[0].set_connected(false);
    let mesh = mesh_with(&venues, |c| c.selector.auto_switch = false);
    mesh.monitor().run_cycle().await;

    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("a"));

    mesh.selector().set_auto_switch(true);
    assert_eq!(mesh.selector().select_best("BTCUSDT", Some("a")).await.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn symbol_lists_and_disabled_exchanges_limit_candidates() {
    let venues = [MockExchange::quoting("spot"), MockExchange::quoting("perp"), MockExchange::quoting("off")];
    let mesh = mesh_with(&venues, |c| {
        c.exchanges[0].symbols = vec!["BTCUSDT".to_string()];
        c.exchanges[1].symbols = vec!["ETHUSDT".to_string()];
        c.exchanges[2].enabled = false;
    });
    mesh.monitor().run_cycle().await;

    assert_eq!(mesh.selector().select_best("btcusdt", None).await.as_deref(), Some("spot"));
    assert_eq!(mesh.selector().select_best("ETHUSDT", None).await.as_deref(), Some("perp"));
    assert_eq!(mesh.selector().select_best("SOLUSDT", None).await, None);

    let scores = mesh.selector().scores("BTCUSDT").await;
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].0, "spot");
}

#[tokio::test(start_paused = true)]
async fn load_balancing_only_picks_selectable_exchanges() {
    let venues = [MockExchange::quoting("a"), MockExchange::quoting("b"), MockExchange::quoting("c")];
    venues[2].set_connected(false);
    let mesh = mesh_with(&venues, |c| c.selector.load_balancing = true);
    mesh.monitor().run_cycle().await;

    for _ in 0..50 {
        let chosen = mesh.selector().select_best("BTCUSDT", None).await.unwrap();
        assert!(chosen == "a" || chosen == "b");
    }
}
