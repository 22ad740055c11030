use crate::{
    bet::{
        Bet,
        BetOption,
        MAX_SUM,
        MIN_SUM,
    },
    contract::{
        self,
        ISevenUpDown::{
            self,
            ISevenUpDownCalls,
        },
        OperationRequest,
        RESOLVE_FIRST_SIGNAL,
    },
    controller::{
        BetController,
        ControllerSettings,
        EventReceiver,
    },
    wallet::WalletClient,
};
use alloy_primitives::{
    Address,
    B256,
    TxHash,
    U256,
    address,
};
use alloy_sol_types::{
    SolInterface,
    SolType,
    sol_data,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    collections::{
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::time;

pub const CONTRACT: Address = address!("0xB6B9918C5880f7a1A4C65c4C4B6297956B4c39AD");
pub const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
pub const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

const STEP: Duration = Duration::from_millis(10);
const MAX_STEPS: usize = 10_000;

/// What the fake saw, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletCall {
    SubmitStarted(Address),
    SubmitConfirmed(TxHash),
    SubmitFailed,
    ReadBet(Address),
}

#[derive(Default)]
struct FakeChain {
    account: Option<Address>,
    bets: HashMap<Address, Bet>,
    /// Players with a `BetPlaced` log.
    placed: HashSet<Address>,
    rolls: VecDeque<u8>,
    next_submit_error: Option<String>,
    fail_reads: bool,
    stale_reads: usize,
    read_delays: VecDeque<Duration>,
    house_balance: U256,
    tx_count: u64,
    calls: Vec<WalletCall>,
    submitted: Vec<OperationRequest>,
}

impl FakeChain {
    fn execute(&mut self, player: Address, operation: &OperationRequest) -> Result<()> {
        if operation.target != CONTRACT {
            return Err(eyre!("execution reverted: no contract at {}", operation.target));
        }
        let call = ISevenUpDownCalls::abi_decode(&operation.data)?;
        match call {
            ISevenUpDownCalls::placeBet(ISevenUpDown::placeBetCall { _option }) => {
                if self.bets.get(&player).is_some_and(Bet::is_pending) {
                    return Err(eyre!("execution reverted: {RESOLVE_FIRST_SIGNAL}"));
                }
                let option = BetOption::from_u8(_option)?;
                self.bets.insert(player, Bet::pending(option));
                self.placed.insert(player);
            }
            ISevenUpDownCalls::resolveBet(_) => {
                let bet = self
                    .bets
                    .get_mut(&player)
                    .filter(|bet| bet.is_pending())
                    .ok_or_else(|| eyre!("execution reverted: No active bet"))?;
                let sum = self.rolls.pop_front().unwrap_or(7);
                *bet = Bet::resolved(bet.option, sum);
            }
            _ => return Err(eyre!("view functions cannot be submitted")),
        }
        Ok(())
    }
}

/// In-memory stand-in for a connected wallet and the game contract.
///
/// Writes take [`FakeWallet::LATENCY`] of (paused) time to confirm and reads take the same
/// unless a delay was queued with [`FakeWallet::delay_next_read`].
#[derive(Clone, Default)]
pub struct FakeWallet {
    chain: Arc<Mutex<FakeChain>>,
}

impl FakeWallet {
    pub const LATENCY: Duration = Duration::from_millis(50);
    pub const EXPLORER_URL: &'static str = "https://testnet.monadexplorer.com";

    pub fn disconnected() -> Self {
        let wallet = Self::default();
        wallet.chain.lock().unwrap().house_balance = U256::from(10u64).pow(U256::from(18));
        wallet
    }

    pub fn connected() -> Self {
        let wallet = Self::disconnected();
        wallet.connect(ALICE);
        wallet
    }

    pub fn connect(&self, account: Address) {
        self.chain.lock().unwrap().account = Some(account);
    }

    pub fn disconnect(&self) {
        self.chain.lock().unwrap().account = None;
    }

    /// Stores `bet` for the connected account, bypassing the contract rules.
    pub fn set_bet(&self, bet: Bet) {
        let mut chain = self.chain.lock().unwrap();
        let account = chain.account.unwrap_or(ALICE);
        chain.bets.insert(account, bet);
        chain.placed.insert(account);
    }

    pub fn set_bet_for(&self, player: Address, bet: Bet) {
        let mut chain = self.chain.lock().unwrap();
        chain.bets.insert(player, bet);
        chain.placed.insert(player);
    }

    /// Drops every `BetPlaced` log, as a node with pruned history would.
    pub fn forget_placements(&self) {
        self.chain.lock().unwrap().placed.clear();
    }

    pub fn bet_of(&self, player: Address) -> Option<Bet> {
        self.chain.lock().unwrap().bets.get(&player).copied()
    }

    /// Dice sums the next resolutions will roll, in order. Defaults to 7 once exhausted.
    pub fn script_rolls(&self, sums: impl IntoIterator<Item = u8>) {
        let mut chain = self.chain.lock().unwrap();
        for sum in sums {
            assert!((MIN_SUM..=MAX_SUM).contains(&sum), "impossible dice sum {sum}");
            chain.rolls.push_back(sum);
        }
    }

    pub fn fail_next_submit(&self, message: &str) {
        self.chain.lock().unwrap().next_submit_error = Some(message.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.chain.lock().unwrap().fail_reads = fail;
    }

    /// The next `count` reads of a resolved bet still show it unresolved.
    pub fn lag_resolution(&self, count: usize) {
        self.chain.lock().unwrap().stale_reads = count;
    }

    pub fn delay_next_read(&self, delay: Duration) {
        self.chain.lock().unwrap().read_delays.push_back(delay);
    }

    pub fn calls(&self) -> Vec<WalletCall> {
        self.chain.lock().unwrap().calls.clone()
    }

    pub fn submitted(&self) -> Vec<OperationRequest> {
        self.chain.lock().unwrap().submitted.clone()
    }

    pub fn read_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, WalletCall::ReadBet(_)))
            .count()
    }
}

impl WalletClient for FakeWallet {
    fn account(&self) -> Option<Address> {
        self.chain.lock().unwrap().account
    }

    fn explorer_url(&self) -> Option<String> {
        Some(Self::EXPLORER_URL.to_string())
    }

    async fn submit_operation(&self, operation: OperationRequest) -> Result<TxHash> {
        let player = {
            let mut chain = self.chain.lock().unwrap();
            let player = chain.account.ok_or_else(|| eyre!("wallet disconnected"))?;
            chain.calls.push(WalletCall::SubmitStarted(player));
            chain.submitted.push(operation.clone());
            player
        };
        time::sleep(Self::LATENCY).await;

        let mut chain = self.chain.lock().unwrap();
        let outcome = match chain.next_submit_error.take() {
            Some(message) => Err(eyre!(message)),
            None => chain.execute(player, &operation),
        };
        match outcome {
            Ok(()) => {
                chain.tx_count += 1;
                let hash = B256::from(U256::from(chain.tx_count));
                chain.calls.push(WalletCall::SubmitConfirmed(hash));
                Ok(hash)
            }
            Err(err) => {
                chain.calls.push(WalletCall::SubmitFailed);
                Err(err.wrap_err("operation rejected"))
            }
        }
    }

    async fn read_bet(&self, contract: Address, player: Address) -> Result<Option<Bet>> {
        // reads observe the chain as it was when issued
        let (delay, output, has_placed) = {
            let mut chain = self.chain.lock().unwrap();
            chain.calls.push(WalletCall::ReadBet(player));
            let output = if contract == CONTRACT {
                // unknown players read as the zero tuple, like the contract's mapping
                let mut slot = chain
                    .bets
                    .get(&player)
                    .copied()
                    .unwrap_or(Bet::pending(BetOption::Under));
                if chain.stale_reads > 0 && slot.resolved {
                    chain.stale_reads -= 1;
                    slot = Bet::pending(slot.option);
                }
                <(sol_data::Uint<8>, sol_data::Bool, sol_data::Uint<8>) as SolType>::abi_encode_params(
                    &(slot.option.as_u8(), slot.resolved, slot.dice_sum),
                )
            } else {
                Vec::new()
            };
            let delay = chain.read_delays.pop_front().unwrap_or(Self::LATENCY);
            (delay, output, chain.placed.contains(&player))
        };
        time::sleep(delay).await;

        if self.chain.lock().unwrap().fail_reads {
            return Err(eyre!("connection refused"));
        }
        if output.is_empty() {
            return Ok(None);
        }
        let bet = contract::decode_bet(&output)?;
        Ok(contract::stored_bet(bet, has_placed))
    }

    async fn house_balance(&self, _contract: Address) -> Result<U256> {
        time::sleep(Self::LATENCY).await;
        Ok(self.chain.lock().unwrap().house_balance)
    }
}

/// A controller wired to a [`FakeWallet`], with helpers to pump its events on a paused clock.
pub struct TestContext {
    pub wallet: FakeWallet,
    pub controller: BetController<FakeWallet>,
    events: EventReceiver,
}

impl TestContext {
    pub fn new(wallet: FakeWallet) -> Self {
        let (controller, events) = BetController::new(
            wallet.clone(),
            Some(CONTRACT),
            ControllerSettings::default(),
        );
        Self {
            wallet,
            controller,
            events,
        }
    }

    /// Alice connected, initial reads done.
    pub async fn connected() -> Self {
        let mut ctx = Self::new(FakeWallet::connected());
        ctx.controller.sync_account();
        ctx.settle().await;
        ctx
    }

    /// Advances the clock by one step and applies every event that arrived.
    pub async fn step(&mut self) {
        time::sleep(STEP).await;
        while let Ok(event) = self.events.try_recv() {
            self.controller.apply(event);
        }
    }

    pub async fn advance(&mut self, duration: Duration) {
        let steps = duration.as_millis().div_ceil(STEP.as_millis());
        for _ in 0..steps {
            self.step().await;
        }
    }

    /// Runs long enough for in-flight reads and writes to land.
    pub async fn settle(&mut self) {
        self.advance(FakeWallet::LATENCY * 3).await;
    }

    pub async fn drive_until(&mut self, done: impl Fn(&BetController<FakeWallet>) -> bool) {
        for _ in 0..MAX_STEPS {
            if done(&self.controller) {
                return;
            }
            self.step().await;
        }
        panic!(
            "controller never reached the expected state: {:?}",
            self.controller.view()
        );
    }
}
