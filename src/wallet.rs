use crate::{
    bet::Bet,
    contract::OperationRequest,
};
use alloy_primitives::{
    Address,
    TxHash,
    U256,
};
use color_eyre::eyre::Result;
use std::future::Future;

/// The wallet/account collaborator the bet controller talks to.
///
/// Operations are submitted one at a time and `submit_operation` resolves only once the
/// operation is confirmed on chain, so a read issued afterwards never races the write.
pub trait WalletClient: Send + Sync + 'static {
    /// The connected account, `None` while disconnected.
    fn account(&self) -> Option<Address>;

    /// Block explorer base URL of the connected chain, if it has one.
    fn explorer_url(&self) -> Option<String>;

    fn submit_operation(
        &self,
        operation: OperationRequest,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// `Ok(None)` means `player` never placed a bet. An all-zero `bets(player)` slot only
    /// counts as a pending Under bet once a `BetPlaced` log for the player exists.
    fn read_bet(
        &self,
        contract: Address,
        player: Address,
    ) -> impl Future<Output = Result<Option<Bet>>> + Send;

    fn house_balance(&self, contract: Address) -> impl Future<Output = Result<U256>> + Send;
}
