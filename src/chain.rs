use crate::{
    bet::Bet,
    contract::{
        self,
        OperationRequest,
    },
    wallet::WalletClient,
};
use alloy_network::{
    EthereumWallet,
    ReceiptResponse,
    TransactionBuilder,
};
use alloy_primitives::{
    Address,
    B256,
    Bytes,
    TxHash,
    U256,
};
use alloy_provider::{
    Provider,
    ProviderBuilder,
};
use alloy_rpc_types_eth::{
    BlockNumberOrTag,
    Filter,
    TransactionRequest,
};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolEvent;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use tracing::{
    debug,
    info,
};
use url::Url;

/// [`WalletClient`] backed by a JSON-RPC node and a local signer.
pub struct ChainWallet<P> {
    provider: P,
    account: Address,
    explorer_url: Option<String>,
}

pub async fn connect(
    rpc_url: Url,
    signer: PrivateKeySigner,
    explorer_url: Option<String>,
) -> Result<ChainWallet<impl Provider + 'static>> {
    let account = signer.address();
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url.clone());
    let chain_id = provider
        .get_chain_id()
        .await
        .wrap_err_with(|| format!("failed to reach RPC endpoint {rpc_url}"))?;
    info!(%account, chain_id, "wallet connected");
    Ok(ChainWallet {
        provider,
        account,
        explorer_url,
    })
}

impl<P: Provider> ChainWallet<P> {
    async fn eth_call(&self, to: Address, input: Bytes) -> Result<Vec<u8>> {
        let request = TransactionRequest::default()
            .with_from(self.account)
            .with_to(to)
            .with_input(input);
        let output = self
            .provider
            .call(request)
            .await
            .wrap_err_with(|| format!("eth_call to {to} failed"))?;
        Ok(output.to_vec())
    }

    /// Whether `player` ever emitted `BetPlaced` on `contract`.
    async fn has_placed_bet(&self, contract: Address, player: Address) -> Result<bool> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(contract::ISevenUpDown::BetPlaced::SIGNATURE_HASH)
            .topic1(B256::from(player.into_word()))
            .from_block(BlockNumberOrTag::Earliest);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .wrap_err_with(|| format!("failed to query BetPlaced logs for {player}"))?;
        Ok(!logs.is_empty())
    }
}

impl<P: Provider + 'static> WalletClient for ChainWallet<P> {
    fn account(&self) -> Option<Address> {
        Some(self.account)
    }

    fn explorer_url(&self) -> Option<String> {
        self.explorer_url.clone()
    }

    async fn submit_operation(&self, operation: OperationRequest) -> Result<TxHash> {
        let request = TransactionRequest::default()
            .with_from(self.account)
            .with_to(operation.target)
            .with_input(operation.data)
            .with_value(operation.value);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .wrap_err("operation rejected")?;
        let hash = *pending.tx_hash();
        debug!(%hash, "operation submitted; waiting for receipt");
        let receipt = pending
            .get_receipt()
            .await
            .wrap_err_with(|| format!("operation {hash:#x} was not confirmed"))?;
        if !ReceiptResponse::status(&receipt) {
            return Err(eyre!("operation {hash:#x} reverted"));
        }
        Ok(hash)
    }

    async fn read_bet(&self, contract: Address, player: Address) -> Result<Option<Bet>> {
        let output = self
            .eth_call(contract, contract::bets_calldata(player))
            .await?;
        if output.is_empty() {
            // no code at `contract`
            return Ok(None);
        }
        let bet = contract::decode_bet(&output)?;
        if !contract::is_blank_slot(&bet) {
            return Ok(Some(bet));
        }
        let has_placed = self.has_placed_bet(contract, player).await?;
        debug!(%player, has_placed, "bet slot reads all zeros");
        Ok(contract::stored_bet(bet, has_placed))
    }

    async fn house_balance(&self, contract: Address) -> Result<U256> {
        let output = self
            .eth_call(contract, contract::house_balance_calldata())
            .await?;
        contract::decode_house_balance(&output)
    }
}
