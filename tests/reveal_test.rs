mod common;

use std::time::Duration;

use common::{EagerPacer, Node, StubDriver, CARD};
use listing_scraper::config::{OverlayConfig, RevealConfig};
use listing_scraper::reveal::{RevealController, RevealExit, RevealStrategy};
use listing_scraper::InstantPacer;

fn reveal_config() -> RevealConfig {
    RevealConfig {
        stall_threshold: 3,
        sweep_rounds: 8,
        sweep_stable_repeats: 2,
        ..Default::default()
    }
}

fn page_with_cards(count: usize) -> StubDriver {
    let driver = StubDriver::new();
    for _ in 0..count {
        driver.add_card(Node::default());
    }
    driver
}

#[tokio::test]
async fn test_realized_count_never_decreases() {
    let driver = page_with_cards(30);
    driver.set_schedule(vec![10, 20, 15, 30]);
    let config = reveal_config();
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert!(report
        .count_history
        .windows(2)
        .all(|pair| pair[0] <= pair[1]));
    assert_eq!(report.count_history[..2], [20, 20]);
    assert_eq!(report.state.realized_count, 30);
}

#[tokio::test]
async fn test_constant_count_stalls_then_sweep_finds_end() {
    let driver = page_with_cards(25);
    let config = reveal_config();
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.progressive_cycles, config.stall_threshold);
    assert_eq!(report.exit, RevealExit::EndOfContent);
    assert_eq!(report.sweep_rounds, config.sweep_stable_repeats);
    assert_eq!(report.state.strategy, RevealStrategy::FallbackSweep);
    assert_eq!(report.state.realized_count, 25);
}

#[tokio::test]
async fn test_growing_height_resets_stable_rounds() {
    let driver = page_with_cards(20);
    // 1回目は安定、2回目は伸びて振り出し、3・4回目で安定
    driver.set_height_schedule(vec![4000.0, 4000.0, 4000.0, 4200.0, 4200.0]);
    let config = reveal_config();
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.exit, RevealExit::EndOfContent);
    assert_eq!(report.sweep_rounds, 4);
    assert_eq!(report.state.stagnant_cycles, config.sweep_stable_repeats);
    assert_eq!(report.state.realized_count, 20);
}

#[tokio::test]
async fn test_unstable_height_runs_sweep_to_round_ceiling() {
    let driver = page_with_cards(12);
    driver.set_scroll_height(None);
    let config = reveal_config();
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.exit, RevealExit::RoundCeiling);
    assert_eq!(report.sweep_rounds, config.sweep_rounds);
    // 段階的スクロール3回 + スイープ8回
    assert_eq!(driver.scrolls(), 11);
}

#[tokio::test]
async fn test_safety_cap_skips_sweep() {
    let driver = page_with_cards(60);
    driver.set_schedule(vec![20, 40, 60]);
    let config = RevealConfig {
        max_records: 40,
        ..reveal_config()
    };
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.exit, RevealExit::SafetyCap);
    assert_eq!(report.sweep_rounds, 0);
    assert_eq!(report.progressive_cycles, 1);
    assert_eq!(report.state.strategy, RevealStrategy::Progressive);
}

#[tokio::test]
async fn test_time_ceiling_ends_reveal() {
    let driver = page_with_cards(50);
    driver.set_schedule(vec![5, 10, 15, 20, 25, 30, 35, 40, 45, 50]);
    let config = RevealConfig {
        max_duration: Duration::ZERO,
        ..reveal_config()
    };
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.exit, RevealExit::TimeCeiling);
    assert_eq!(report.progressive_cycles, 1);
    assert_eq!(report.sweep_rounds, 0);
}

#[tokio::test]
async fn test_empty_page_terminates() {
    let driver = page_with_cards(0);
    let config = reveal_config();
    let overlay = OverlayConfig::default();

    let report = RevealController::new(&driver, &InstantPacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    assert_eq!(report.state.realized_count, 0);
    assert_eq!(report.exit, RevealExit::EndOfContent);
}

#[tokio::test]
async fn test_humanized_branches_keep_count_monotonic() {
    let driver = page_with_cards(15);
    driver.set_schedule(vec![5, 10, 15]);
    let config = RevealConfig {
        stall_threshold: 2,
        ..reveal_config()
    };
    let overlay = OverlayConfig::default();
    let pacer = EagerPacer::default();

    let report = RevealController::new(&driver, &pacer, &config, CARD, &overlay)
        .reveal_all()
        .await;

    // 5 → 10 → 15 → 15 → 15 で停滞
    assert_eq!(report.progressive_cycles, 4);
    let cycles = report.progressive_cycles as usize;

    let upward = driver
        .scroll_scripts()
        .iter()
        .filter(|s| s.starts_with("window.scrollBy") && s.contains("* -"))
        .count();
    assert_eq!(upward, cycles);

    let expected = (1366.0 * 0.2, 768.0 * 0.2);
    assert_eq!(driver.pointer_moves(), vec![expected; cycles]);
    assert_eq!(driver.hovers().len(), cycles);

    assert!(pacer.sleeps().contains(&Duration::from_secs(3)));
    assert!(report
        .count_history
        .windows(2)
        .all(|pair| pair[0] <= pair[1]));
    assert_eq!(report.state.realized_count, 15);
}
