use crate::{
    animation::DiceAnimation,
    bet::{
        Bet,
        BetOption,
        DiceFaces,
        Outcome,
        display_payout,
        outcome,
    },
    contract::{
        self,
        OperationRequest,
    },
    wallet::WalletClient,
};
use alloy_primitives::{
    Address,
    TxHash,
    U256,
};
use color_eyre::eyre::{
    self,
    Report,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

/// Shown instead of the raw revert when the contract refuses a second open bet.
pub const RESOLVE_FIRST_MESSAGE: &str = "You have an active bet. Please resolve it first!";

pub const DEFAULT_ROLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_SETTLE_ATTEMPTS: u32 = 5;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    #[default]
    Betting,
    Placing,
    Resolving,
    Result,
}

/// Everything the front end renders. Owned by [`BetController`] and never persisted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ViewState {
    pub phase: Phase,
    pub selected_option: Option<BetOption>,
    pub dice_faces: DiceFaces,
    pub outcome: Option<Outcome>,
    pub payout: u8,
    pub last_error: Option<String>,
    pub transaction_hash: Option<TxHash>,
}

#[derive(Clone, Debug)]
pub struct ControllerSettings {
    pub roll_interval: Duration,
    /// Wait after a confirmed resolution before reading the bet back.
    pub settle_delay: Duration,
    /// Reads after a resolution before giving up on seeing it resolved.
    pub settle_attempts: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            roll_interval: DEFAULT_ROLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            settle_attempts: DEFAULT_SETTLE_ATTEMPTS,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BetError {
    #[error("Game contract not deployed")]
    ContractNotConfigured,
    #[error("Connect a wallet first")]
    WalletDisconnected,
    #[error("Another operation is still in flight")]
    OperationInFlight,
    #[error("{RESOLVE_FIRST_MESSAGE}")]
    UnresolvedBet,
    #[error("There is no active bet to resolve")]
    NoPendingBet,
    #[error("Press play again to start a new round")]
    RoundFinished,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FetchReason {
    Connect,
    Manual,
    AfterPlacement,
    Resync,
    AfterResolve,
}

#[derive(Debug)]
pub struct ControllerEvent {
    epoch: u64,
    kind: EventKind,
}

impl ControllerEvent {
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}

#[derive(Debug)]
pub enum EventKind {
    PlaceFinished(Result<TxHash, String>),
    ResolveFinished(Result<TxHash, String>),
    BetFetched {
        seq: u64,
        reason: FetchReason,
        result: Result<Option<Bet>, String>,
    },
    HouseBalanceFetched(Result<U256, String>),
    DiceRolled(DiceFaces),
}

pub type EventReceiver = mpsc::UnboundedReceiver<ControllerEvent>;

/// Render-ready copy of the controller state.
#[derive(Clone, Debug)]
pub struct GameSnapshot {
    pub phase: Phase,
    pub selected_option: Option<BetOption>,
    pub dice_faces: DiceFaces,
    pub dice_sum: u8,
    pub outcome: Option<Outcome>,
    pub payout: u8,
    pub last_error: Option<String>,
    pub transaction_hash: Option<TxHash>,
    pub transaction_url: Option<String>,
    pub active_bet: Option<Bet>,
    pub account: Option<Address>,
    pub contract: Option<Address>,
    pub house_balance: Option<U256>,
    pub rolling: bool,
    pub can_place: bool,
    pub can_resolve: bool,
    pub can_reset: bool,
}

/// Drives one player's bet through placement, resolution and result display.
///
/// Every asynchronous step runs as a spawned task and reports back through the
/// [`EventReceiver`] returned by [`BetController::new`]; the owner feeds those events into
/// [`BetController::apply`]. Only one write is ever in flight, and a bet read that follows
/// a write is only issued after the write confirmed.
pub struct BetController<W> {
    wallet: Arc<W>,
    contract: Option<Address>,
    settings: ControllerSettings,
    view: ViewState,
    cached_bet: Option<Bet>,
    account: Option<Address>,
    house_balance: Option<U256>,
    animation: Option<DiceAnimation>,
    epoch: u64,
    fetch_seq: u64,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl<W: WalletClient> BetController<W> {
    pub fn new(
        wallet: W,
        contract: Option<Address>,
        settings: ControllerSettings,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            wallet: Arc::new(wallet),
            contract,
            settings,
            view: ViewState::default(),
            cached_bet: None,
            account: None,
            house_balance: None,
            animation: None,
            epoch: 0,
            fetch_seq: 0,
            events,
        };
        (controller, receiver)
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn phase(&self) -> Phase {
        self.view.phase
    }

    pub fn cached_bet(&self) -> Option<Bet> {
        self.cached_bet
    }

    pub fn house_balance(&self) -> Option<U256> {
        self.house_balance
    }

    pub fn animation_active(&self) -> bool {
        self.animation.as_ref().is_some_and(DiceAnimation::is_running)
    }

    fn has_pending_bet(&self) -> bool {
        self.cached_bet.is_some_and(|bet| bet.is_pending())
    }

    fn operation_in_flight(&self) -> bool {
        matches!(self.view.phase, Phase::Placing | Phase::Resolving)
    }

    /// Adopts the wallet's current account. A change wipes all view state and the cached
    /// bet, drops results still in flight for the old account, and loads the new one.
    /// Returns whether the account changed.
    pub fn sync_account(&mut self) -> bool {
        let current = self.wallet.account();
        if current == self.account {
            return false;
        }
        info!(previous = ?self.account, ?current, "account changed");
        self.account = current;
        self.epoch += 1;
        self.stop_animation();
        self.view = ViewState::default();
        self.cached_bet = None;
        if current.is_some() {
            self.fetch_bet(FetchReason::Connect);
            self.refresh_house_balance();
        }
        true
    }

    pub fn place_bet(&mut self, option: BetOption) -> Result<(), BetError> {
        self.sync_account();
        let contract = self.ready_contract()?;
        match self.view.phase {
            Phase::Betting => {}
            Phase::Placing | Phase::Resolving => {
                return self.reject(BetError::OperationInFlight);
            }
            Phase::Result => return self.reject(BetError::RoundFinished),
        }
        if self.has_pending_bet() {
            return self.reject(BetError::UnresolvedBet);
        }

        info!(%option, "placing bet");
        self.view.last_error = None;
        self.view.selected_option = Some(option);
        self.view.phase = Phase::Placing;
        self.submit(
            contract::place_bet_operation(contract, option),
            EventKind::PlaceFinished,
        );
        Ok(())
    }

    pub fn resolve_bet(&mut self) -> Result<(), BetError> {
        self.sync_account();
        let contract = self.ready_contract()?;
        match self.view.phase {
            Phase::Betting => {}
            Phase::Placing | Phase::Resolving => {
                return self.reject(BetError::OperationInFlight);
            }
            Phase::Result => return self.reject(BetError::RoundFinished),
        }
        if !self.has_pending_bet() {
            return self.reject(BetError::NoPendingBet);
        }

        info!("resolving bet");
        self.view.last_error = None;
        self.view.phase = Phase::Resolving;
        self.start_animation();
        self.submit(
            contract::resolve_bet_operation(contract),
            EventKind::ResolveFinished,
        );
        Ok(())
    }

    /// Re-reads the bet from the contract. Skipped while a write is in flight.
    pub fn refresh_bet(&mut self) {
        if self.sync_account() {
            return;
        }
        if self.operation_in_flight() {
            debug!(phase = ?self.view.phase, "refresh skipped while an operation is in flight");
            return;
        }
        self.fetch_bet(FetchReason::Manual);
    }

    pub fn refresh_house_balance(&mut self) {
        let Some(contract) = self.contract else {
            return;
        };
        let wallet = Arc::clone(&self.wallet);
        let events = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = wallet
                .house_balance(contract)
                .await
                .map_err(|err| error_message(&err));
            let _ = events.send(ControllerEvent {
                epoch,
                kind: EventKind::HouseBalanceFetched(result),
            });
        });
    }

    /// Starts a new round. The cached bet stays until the next read replaces it.
    pub fn reset(&mut self) -> Result<(), BetError> {
        if self.operation_in_flight() {
            return self.reject(BetError::OperationInFlight);
        }
        self.stop_animation();
        self.view = ViewState::default();
        info!("round reset");
        Ok(())
    }

    /// Stops the animation timer. Writes already submitted are left to finish on their own.
    pub fn shutdown(&mut self) {
        self.stop_animation();
    }

    pub fn apply(&mut self, event: ControllerEvent) {
        if event.epoch != self.epoch {
            debug!(kind = ?event.kind, "ignoring event for a previous account");
            return;
        }
        match event.kind {
            EventKind::PlaceFinished(Ok(hash)) => {
                info!(%hash, "bet placed");
                self.view.transaction_hash = Some(hash);
                self.view.last_error = None;
                self.view.phase = Phase::Betting;
                self.fetch_bet(FetchReason::AfterPlacement);
            }
            EventKind::PlaceFinished(Err(message)) => {
                error!(%message, "placing bet failed");
                if contract::is_resolve_first_error(&message) {
                    self.view.last_error = Some(RESOLVE_FIRST_MESSAGE.to_string());
                    self.fetch_bet(FetchReason::Resync);
                } else {
                    self.view.last_error = Some(message);
                }
                self.view.phase = Phase::Betting;
            }
            EventKind::ResolveFinished(Ok(hash)) => {
                info!(%hash, "resolution confirmed");
                self.view.transaction_hash = Some(hash);
                self.stop_animation();
                self.fetch_bet(FetchReason::AfterResolve);
            }
            EventKind::ResolveFinished(Err(message)) => {
                error!(%message, "resolving bet failed");
                self.stop_animation();
                self.view.last_error = Some(message);
                self.view.phase = Phase::Betting;
            }
            EventKind::BetFetched {
                seq,
                reason,
                result,
            } => self.apply_fetch(seq, reason, result),
            EventKind::HouseBalanceFetched(Ok(balance)) => {
                self.house_balance = Some(balance);
            }
            EventKind::HouseBalanceFetched(Err(message)) => {
                warn!(%message, "failed to load house balance");
            }
            EventKind::DiceRolled(faces) => {
                if self.view.phase == Phase::Resolving && self.animation.is_some() {
                    self.view.dice_faces = faces;
                }
            }
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let connected = self.account.is_some() && self.contract.is_some();
        let betting = self.view.phase == Phase::Betting;
        let pending = self.has_pending_bet();
        let explorer_url = self.wallet.explorer_url();
        GameSnapshot {
            phase: self.view.phase,
            selected_option: self.view.selected_option,
            dice_faces: self.view.dice_faces,
            dice_sum: self.view.dice_faces.sum(),
            outcome: self.view.outcome,
            payout: self.view.payout,
            last_error: self.view.last_error.clone(),
            transaction_hash: self.view.transaction_hash,
            transaction_url: self.view.transaction_hash.and_then(|hash| {
                contract::transaction_url(explorer_url.as_deref(), &hash)
            }),
            active_bet: self.cached_bet,
            account: self.account,
            contract: self.contract,
            house_balance: self.house_balance,
            rolling: self.animation.is_some(),
            can_place: connected && betting && !pending,
            can_resolve: connected && betting && pending,
            can_reset: self.view.phase == Phase::Result,
        }
    }

    fn ready_contract(&mut self) -> Result<Address, BetError> {
        match (self.account, self.contract) {
            (None, _) => self.reject(BetError::WalletDisconnected),
            (Some(_), None) => self.reject(BetError::ContractNotConfigured),
            (Some(_), Some(contract)) => Ok(contract),
        }
    }

    fn reject<T>(&mut self, error: BetError) -> Result<T, BetError> {
        warn!(%error, phase = ?self.view.phase, "action rejected");
        self.view.last_error = Some(error.to_string());
        Err(error)
    }

    fn apply_fetch(
        &mut self,
        seq: u64,
        reason: FetchReason,
        result: Result<Option<Bet>, String>,
    ) {
        if seq != self.fetch_seq {
            debug!(seq, latest = self.fetch_seq, ?reason, "ignoring superseded bet read");
            return;
        }
        let settles_resolution =
            reason == FetchReason::AfterResolve && self.view.phase == Phase::Resolving;
        match result {
            Err(message) => {
                warn!(%message, ?reason, "failed to load bet");
                if settles_resolution {
                    self.view.phase = Phase::Betting;
                }
            }
            Ok(bet) => {
                let bet = bet.or_else(|| inferred_blank_bet(reason));
                debug!(?bet, ?reason, "bet loaded");
                self.cached_bet = bet;
                if self.operation_in_flight() && !settles_resolution {
                    return;
                }
                self.derive_phase();
            }
        }
    }

    fn derive_phase(&mut self) {
        let settled = self
            .cached_bet
            .and_then(|bet| bet.settled_sum().map(|sum| (bet.option, sum)));
        match settled {
            Some((option, sum)) => {
                let result = outcome(sum, option);
                info!(sum, %option, ?result, "bet settled");
                self.view.dice_faces = DiceFaces::from_sum(sum);
                self.view.outcome = Some(result);
                self.view.payout = display_payout(sum, option);
                self.view.phase = Phase::Result;
            }
            None => {
                self.view.dice_faces = DiceFaces::default();
                self.view.outcome = None;
                self.view.payout = 0;
                self.view.phase = Phase::Betting;
            }
        }
    }

    fn submit(
        &self,
        operation: OperationRequest,
        finished: fn(Result<TxHash, String>) -> EventKind,
    ) {
        let wallet = Arc::clone(&self.wallet);
        let events = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = wallet
                .submit_operation(operation)
                .await
                .map_err(|err| error_message(&err));
            let _ = events.send(ControllerEvent {
                epoch,
                kind: finished(result),
            });
        });
    }

    fn fetch_bet(&mut self, reason: FetchReason) {
        let (Some(contract), Some(player)) = (self.contract, self.account) else {
            debug!(?reason, "bet read skipped without contract or account");
            return;
        };
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let (delay, attempts) = match reason {
            FetchReason::AfterResolve => (
                self.settings.settle_delay,
                self.settings.settle_attempts.max(1),
            ),
            _ => (Duration::ZERO, 1),
        };
        let wallet = Arc::clone(&self.wallet);
        let events = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = read_until_settled(&*wallet, contract, player, delay, attempts)
                .await
                .map_err(|err| error_message(&err));
            let _ = events.send(ControllerEvent {
                epoch,
                kind: EventKind::BetFetched {
                    seq,
                    reason,
                    result,
                },
            });
        });
    }

    fn start_animation(&mut self) {
        self.stop_animation();
        let events = self.events.clone();
        let epoch = self.epoch;
        self.animation = Some(DiceAnimation::start(
            self.settings.roll_interval,
            move |faces| {
                events
                    .send(ControllerEvent {
                        epoch,
                        kind: EventKind::DiceRolled(faces),
                    })
                    .is_ok()
            },
        ));
    }

    fn stop_animation(&mut self) {
        if let Some(animation) = self.animation.take() {
            animation.stop();
        }
    }
}

/// A placement just confirmed, or the contract just refused one because a bet is pending,
/// yet the read found no bet. The only pending bet that reads as absent is the all-zero
/// Under slot whose `BetPlaced` log the node no longer serves.
fn inferred_blank_bet(reason: FetchReason) -> Option<Bet> {
    match reason {
        FetchReason::AfterPlacement | FetchReason::Resync => {
            warn!(?reason, "bet read as absent; assuming a pending Under bet");
            Some(Bet::pending(BetOption::Under))
        }
        _ => None,
    }
}

/// Reads the bet, waiting `delay` before each read, until it shows a settled sum or
/// `attempts` reads were made. Returns the last read.
async fn read_until_settled<W: WalletClient>(
    wallet: &W,
    contract: Address,
    player: Address,
    delay: Duration,
    attempts: u32,
) -> eyre::Result<Option<Bet>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        let bet = wallet.read_bet(contract, player).await?;
        let settled = bet.is_some_and(|bet| bet.settled_sum().is_some());
        if settled || attempt >= attempts {
            return Ok(bet);
        }
        debug!(attempt, attempts, "bet not resolved yet");
    }
}

/// Flattens an error chain into one line, outermost context first.
pub fn error_message(err: &Report) -> String {
    err.chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeWallet,
        TestContext,
    };
    use alloy_primitives::B256;
    use color_eyre::eyre::{
        WrapErr,
        eyre,
    };

    #[test]
    fn error_message__joins_chain_outermost_first() {
        let err: Report = Err::<(), _>(eyre!("execution reverted: Resolve previous bet first"))
            .wrap_err("operation rejected")
            .unwrap_err();

        assert_eq!(
            error_message(&err),
            "operation rejected: execution reverted: Resolve previous bet first"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn place_bet__rejected_without_contract() {
        // given
        let wallet = FakeWallet::connected();
        let (mut controller, _events) =
            BetController::new(wallet.clone(), None, ControllerSettings::default());

        // when
        let result = controller.place_bet(BetOption::Over);

        // then
        assert_eq!(result, Err(BetError::ContractNotConfigured));
        assert_eq!(controller.phase(), Phase::Betting);
        assert_eq!(
            controller.view().last_error.as_deref(),
            Some("Game contract not deployed")
        );
        assert!(wallet.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_bet__rejected_without_pending_bet() {
        // given
        let mut ctx = TestContext::connected().await;

        // when
        let result = ctx.controller.resolve_bet();

        // then
        assert_eq!(result, Err(BetError::NoPendingBet));
        assert!(!ctx.controller.animation_active());
        assert!(ctx.wallet.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn apply__ignores_events_from_previous_account() {
        // given
        let mut ctx = TestContext::connected().await;
        let stale = ControllerEvent {
            epoch: ctx.controller.epoch - 1,
            kind: EventKind::PlaceFinished(Err("boom".to_string())),
        };

        // when
        ctx.controller.apply(stale);

        // then
        assert_eq!(ctx.controller.view().last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn apply__ignores_superseded_bet_reads() {
        // given
        let mut ctx = TestContext::connected().await;
        let seq = ctx.controller.fetch_seq;
        let stale = ControllerEvent {
            epoch: ctx.controller.epoch,
            kind: EventKind::BetFetched {
                seq: seq - 1,
                reason: FetchReason::Manual,
                result: Ok(Some(Bet::pending(BetOption::Exact))),
            },
        };

        // when
        ctx.controller.apply(stale);

        // then
        assert_eq!(ctx.controller.cached_bet(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn apply__failed_read_keeps_cached_bet() {
        // given
        let mut ctx = TestContext::connected().await;
        ctx.wallet.set_bet(Bet::pending(BetOption::Under));
        ctx.controller.refresh_bet();
        ctx.settle().await;
        ctx.wallet.fail_reads(true);

        // when
        ctx.controller.refresh_bet();
        ctx.settle().await;

        // then
        assert_eq!(
            ctx.controller.cached_bet(),
            Some(Bet::pending(BetOption::Under))
        );
        assert_eq!(ctx.controller.phase(), Phase::Betting);
    }

    #[tokio::test(start_paused = true)]
    async fn apply__dice_ticks_ignored_outside_resolution() {
        // given
        let mut ctx = TestContext::connected().await;
        let tick = ControllerEvent {
            epoch: ctx.controller.epoch,
            kind: EventKind::DiceRolled(DiceFaces::new(6, 5)),
        };

        // when
        ctx.controller.apply(tick);

        // then
        assert_eq!(ctx.controller.view().dice_faces, DiceFaces::default());
    }

    #[tokio::test(start_paused = true)]
    async fn reset__rejected_while_placing() {
        // given
        let mut ctx = TestContext::connected().await;
        ctx.controller.place_bet(BetOption::Under).unwrap();

        // when
        let result = ctx.controller.reset();

        // then
        assert_eq!(result, Err(BetError::OperationInFlight));
        assert_eq!(ctx.controller.phase(), Phase::Placing);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown__stops_rolling_mid_resolution() {
        // given
        let mut ctx = TestContext::connected().await;
        ctx.wallet.set_bet(Bet::pending(BetOption::Over));
        ctx.controller.refresh_bet();
        ctx.settle().await;
        ctx.controller.resolve_bet().unwrap();
        assert!(ctx.controller.animation_active());

        // when
        ctx.controller.shutdown();
        ctx.step().await;

        // then
        assert!(!ctx.controller.animation_active());
        assert_eq!(ctx.controller.phase(), Phase::Resolving);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot__links_transaction_through_explorer() {
        // given
        let mut ctx = TestContext::connected().await;
        let hash = B256::with_last_byte(1);
        ctx.controller.view.transaction_hash = Some(hash);

        // when
        let snapshot = ctx.controller.snapshot();

        // then
        assert_eq!(
            snapshot.transaction_url,
            Some(format!("{}/tx/{hash:#x}", FakeWallet::EXPLORER_URL))
        );
        assert!(snapshot.can_place);
        assert!(!snapshot.can_resolve);
        assert!(!snapshot.can_reset);
    }
}
