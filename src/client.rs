use crate::{
    bet::{
        Outcome,
        display_payout,
        outcome,
    },
    chain,
    config::{
        AppConfig,
        Command,
        NetworkTarget,
        SignerSource,
        TESTNET_CHAIN_ID,
    },
    controller::{
        BetController,
        BetError,
        EventReceiver,
        Phase,
    },
    deployment::{
        DeploymentRecord,
        DeploymentStore,
    },
    ui,
    wallet::WalletClient,
    wallets,
};
use alloy_primitives::{
    Address,
    utils::format_ether,
};
use alloy_signer_local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use tracing::{
    info,
    warn,
};

pub async fn run(config: AppConfig) -> Result<()> {
    match config.command.clone() {
        Command::Play => run_app(config).await,
        Command::Status => run_status(config).await,
        Command::RecordDeployment { address, tx_hash } => {
            record_deployment(&config, address, tx_hash)
        }
    }
}

fn load_signer(config: &AppConfig) -> Result<PrivateKeySigner> {
    match &config.signer {
        Some(SignerSource::Keystore { name, dir }) => {
            let descriptor =
                wallets::find_keystore(dir, name).wrap_err("locating keystore")?;
            wallets::unlock_keystore(&descriptor).wrap_err("unlocking keystore")
        }
        Some(SignerSource::PrivateKey(key)) => wallets::signer_from_private_key(key),
        None => Err(eyre!(
            "Specify --keystore <name> or --private-key to sign bets"
        )),
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let contract = config.resolve_contract()?;
    if contract.is_none() {
        warn!(network = %config.network.env(), "no game contract configured");
    }
    // unlock before the terminal goes raw so the password prompt is usable
    let signer = load_signer(&config)?;
    let wallet = chain::connect(
        config.network.url().clone(),
        signer,
        config.explorer_url.clone(),
    )
    .await?;

    let (mut controller, mut events) =
        BetController::new(wallet, contract, config.settings.clone());
    controller.sync_account();

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        &mut controller,
        &mut events,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    controller.shutdown();
    ui::terminal_exit()?;
    info!("UI closed");
    res
}

async fn run_loop<W: WalletClient>(
    controller: &mut BetController<W>,
    events: &mut EventReceiver,
    ui_state: &mut ui::UiState,
    input_events: &mut EventStream,
) -> Result<()> {
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("controller event channel closed");
                    break;
                };
                controller.apply(event);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(ev) = ui::interpret_event(raw_ev?) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::PlaceBet(option) => {
                        let _ = controller.place_bet(option);
                    }
                    ui::UserEvent::Resolve => {
                        let _ = controller.resolve_bet();
                    }
                    ui::UserEvent::Refresh => {
                        controller.refresh_bet();
                        controller.refresh_house_balance();
                    }
                    ui::UserEvent::PlayAgain => {
                        if controller.phase() == Phase::Result {
                            let _ = controller.reset();
                        }
                    }
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
    }
    Ok(())
}

pub async fn run_status(config: AppConfig) -> Result<()> {
    let contract = config
        .resolve_contract()?
        .ok_or(BetError::ContractNotConfigured)?;
    let signer = load_signer(&config)?;
    let wallet = chain::connect(
        config.network.url().clone(),
        signer,
        config.explorer_url.clone(),
    )
    .await?;
    let account = wallet.account().ok_or(BetError::WalletDisconnected)?;

    let bet = wallet
        .read_bet(contract, account)
        .await
        .wrap_err("reading bet")?;
    let house_balance = wallet
        .house_balance(contract)
        .await
        .wrap_err("reading house balance")?;

    println!("Network:  {}", config.network.env());
    println!("Contract: {contract}");
    println!("Account:  {account}");
    println!("House:    {} MON", format_ether(house_balance));
    match bet {
        None => println!("Bet:      none"),
        Some(bet) if bet.is_pending() => {
            println!("Bet:      {} (waiting to be rolled)", bet.option)
        }
        Some(bet) => match bet.settled_sum() {
            Some(sum) => {
                let verdict = match outcome(sum, bet.option) {
                    Outcome::Win => {
                        format!("won, payout {}x", display_payout(sum, bet.option))
                    }
                    Outcome::Lose => "lost".to_string(),
                };
                println!("Bet:      {} rolled {sum}, {verdict}", bet.option);
            }
            None => println!("Bet:      {} (resolved, no roll recorded)", bet.option),
        },
    }
    Ok(())
}

pub fn record_deployment(
    config: &AppConfig,
    address: Address,
    tx_hash: Option<String>,
) -> Result<()> {
    let env = config.network.env();
    let store = DeploymentStore::new(env).wrap_err("opening deployment store")?;
    let mut record = DeploymentRecord::new(address, config.network.url().as_str());
    record.tx_hash = tx_hash;
    record.chain_id = match config.network {
        NetworkTarget::Testnet { .. } => Some(TESTNET_CHAIN_ID),
        NetworkTarget::Local { .. } => None,
    };
    store.append(record)?;
    info!(%address, %env, "deployment recorded");
    println!(
        "Recorded {address} for {env} in {}",
        store.path().display()
    );
    Ok(())
}
