#![allow(non_snake_case)]
use seven_up_down::{
    bet::{
        Bet,
        BetOption,
        DiceFaces,
        Outcome,
    },
    controller::{
        BetError,
        DEFAULT_SETTLE_ATTEMPTS,
        DEFAULT_SETTLE_DELAY,
        Phase,
        ViewState,
    },
    test_helpers::{
        ALICE,
        FakeWallet,
        TestContext,
    },
};
use std::time::Duration;

async fn with_pending_bet(option: BetOption) -> TestContext {
    let wallet = FakeWallet::connected();
    wallet.set_bet(Bet::pending(option));
    let mut ctx = TestContext::new(wallet);
    ctx.controller.sync_account();
    ctx.settle().await;
    ctx
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__win_reaches_result_after_settle_delay() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    ctx.wallet.script_rolls([5]);

    // when
    ctx.controller.resolve_bet().unwrap();

    // then
    assert_eq!(ctx.controller.phase(), Phase::Resolving);
    assert!(ctx.controller.animation_active());
    ctx.drive_until(|c| c.phase() == Phase::Result).await;
    let snapshot = ctx.controller.snapshot();
    assert_eq!(snapshot.outcome, Some(Outcome::Win));
    assert_eq!(snapshot.payout, 2);
    assert_eq!(snapshot.dice_faces, DiceFaces::new(2, 3));
    assert_eq!(snapshot.dice_sum, 5);
    assert_eq!(snapshot.active_bet, Some(Bet::resolved(BetOption::Under, 5)));
    assert!(snapshot.transaction_hash.is_some());
    assert!(snapshot.can_reset);
    assert!(!snapshot.rolling);
    assert!(!ctx.controller.animation_active());
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__loss_pays_nothing() {
    // given
    let mut ctx = with_pending_bet(BetOption::Exact).await;
    ctx.wallet.script_rolls([12]);

    // when
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() == Phase::Result).await;

    // then
    let view = ctx.controller.view();
    assert_eq!(view.outcome, Some(Outcome::Lose));
    assert_eq!(view.payout, 0);
    assert_eq!(view.dice_faces, DiceFaces::new(6, 6));
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__reconstructed_faces_match_every_sum() {
    for sum in 2..=12u8 {
        // given
        let mut ctx = with_pending_bet(BetOption::Over).await;
        ctx.wallet.script_rolls([sum]);

        // when
        ctx.controller.resolve_bet().unwrap();
        ctx.drive_until(|c| c.phase() == Phase::Result).await;

        // then
        let faces = ctx.controller.view().dice_faces;
        assert_eq!(faces.sum(), sum, "faces {faces:?} for sum {sum}");
        assert!((1..=6).contains(&faces.first));
        assert!((1..=6).contains(&faces.second));
    }
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__second_resolution_rejected_while_rolling() {
    // given
    let mut ctx = with_pending_bet(BetOption::Over).await;
    ctx.controller.resolve_bet().unwrap();

    // when
    let again = ctx.controller.resolve_bet();
    let place = ctx.controller.place_bet(BetOption::Under);

    // then
    assert_eq!(again, Err(BetError::OperationInFlight));
    assert_eq!(place, Err(BetError::OperationInFlight));
    assert!(ctx.controller.animation_active());
    ctx.drive_until(|c| c.phase() == Phase::Result).await;
    assert_eq!(ctx.wallet.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__animation_stops_once_confirmed() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    ctx.controller.resolve_bet().unwrap();

    // when
    ctx.advance(FakeWallet::LATENCY * 2).await;

    // then
    assert_eq!(ctx.controller.phase(), Phase::Resolving);
    assert!(!ctx.controller.animation_active());
    let frozen = ctx.controller.view().dice_faces;
    ctx.advance(Duration::from_millis(500)).await;
    assert_eq!(ctx.controller.view().dice_faces, frozen);
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__waits_settle_delay_before_reading() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    let reads_before = ctx.wallet.read_count();

    // when
    ctx.controller.resolve_bet().unwrap();
    ctx.advance(DEFAULT_SETTLE_DELAY - Duration::from_millis(100)).await;

    // then
    assert_eq!(ctx.wallet.read_count(), reads_before);
    ctx.drive_until(|c| c.phase() == Phase::Result).await;
    assert_eq!(ctx.wallet.read_count(), reads_before + 1);
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__polls_again_while_chain_lags() {
    // given
    let mut ctx = with_pending_bet(BetOption::Over).await;
    ctx.wallet.script_rolls([9]);
    ctx.wallet.lag_resolution(2);
    let reads_before = ctx.wallet.read_count();

    // when
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() == Phase::Result).await;

    // then
    assert_eq!(ctx.wallet.read_count(), reads_before + 3);
    assert_eq!(ctx.controller.view().outcome, Some(Outcome::Win));
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__gives_up_polling_and_returns_to_betting() {
    // given
    let mut ctx = with_pending_bet(BetOption::Over).await;
    ctx.wallet.lag_resolution(usize::MAX);
    let reads_before = ctx.wallet.read_count();

    // when
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() != Phase::Resolving).await;

    // then
    assert_eq!(ctx.controller.phase(), Phase::Betting);
    assert_eq!(
        ctx.wallet.read_count(),
        reads_before + DEFAULT_SETTLE_ATTEMPTS as usize
    );
    assert!(ctx.controller.snapshot().can_resolve);
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__failed_read_after_resolution_returns_to_betting() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    ctx.controller.resolve_bet().unwrap();
    ctx.wallet.fail_reads(true);

    // when
    ctx.drive_until(|c| c.phase() != Phase::Resolving).await;

    // then
    assert_eq!(ctx.controller.phase(), Phase::Betting);
    assert_eq!(
        ctx.controller.cached_bet(),
        Some(Bet::pending(BetOption::Under))
    );
    assert!(!ctx.controller.animation_active());
}

#[tokio::test(start_paused = true)]
async fn resolve_bet__failure_stops_animation_and_reports() {
    // given
    let mut ctx = with_pending_bet(BetOption::Exact).await;
    ctx.wallet.fail_next_submit("execution reverted: out of gas");

    // when
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() == Phase::Betting).await;

    // then
    assert!(!ctx.controller.animation_active());
    assert_eq!(
        ctx.controller.view().last_error.as_deref(),
        Some("operation rejected: execution reverted: out of gas")
    );
    assert_eq!(ctx.wallet.bet_of(ALICE), Some(Bet::pending(BetOption::Exact)));
}

#[tokio::test(start_paused = true)]
async fn reset__clears_round_but_keeps_cached_bet() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    ctx.wallet.script_rolls([3]);
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() == Phase::Result).await;

    // when
    ctx.controller.reset().unwrap();

    // then
    assert_eq!(ctx.controller.view(), &ViewState::default());
    assert_eq!(
        ctx.controller.cached_bet(),
        Some(Bet::resolved(BetOption::Under, 3))
    );
    assert!(ctx.controller.snapshot().can_place);
}

#[tokio::test(start_paused = true)]
async fn place_bet__rejected_until_result_is_dismissed() {
    // given
    let mut ctx = with_pending_bet(BetOption::Under).await;
    ctx.controller.resolve_bet().unwrap();
    ctx.drive_until(|c| c.phase() == Phase::Result).await;

    // when
    let result = ctx.controller.place_bet(BetOption::Over);

    // then
    assert_eq!(result, Err(BetError::RoundFinished));
    assert_eq!(ctx.controller.phase(), Phase::Result);
}
