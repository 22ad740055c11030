use crate::bet::{
    Bet,
    BetOption,
};
use alloy_primitives::{
    Address,
    Bytes,
    TxHash,
    U256,
};
use alloy_sol_types::{
    SolCall,
    sol,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};

sol! {
    /// On-chain side of the game. Mirrors the deployed `SevenUpDown` contract.
    interface ISevenUpDown {
        function placeBet(uint8 _option) external;
        function resolveBet() external;
        function bets(address) external view returns (uint8 option, bool resolved, uint8 diceSum);
        function getBalance() external view returns (uint256);

        event BetPlaced(address indexed player, uint8 option);
        event BetResolved(address indexed player, uint8 diceSum, uint256 payout);
    }
}

/// Revert reason the contract uses when the caller still has an unresolved bet.
pub const RESOLVE_FIRST_SIGNAL: &str = "Resolve previous bet first";

/// A write to submit through the wallet collaborator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationRequest {
    pub target: Address,
    pub data: Bytes,
    pub value: U256,
}

pub fn place_bet_operation(contract: Address, option: BetOption) -> OperationRequest {
    let call = ISevenUpDown::placeBetCall {
        _option: option.as_u8(),
    };
    OperationRequest {
        target: contract,
        data: call.abi_encode().into(),
        value: U256::ZERO,
    }
}

pub fn resolve_bet_operation(contract: Address) -> OperationRequest {
    OperationRequest {
        target: contract,
        data: ISevenUpDown::resolveBetCall {}.abi_encode().into(),
        value: U256::ZERO,
    }
}

pub fn bets_calldata(player: Address) -> Bytes {
    ISevenUpDown::betsCall(player).abi_encode().into()
}

pub fn decode_bet(data: &[u8]) -> Result<Bet> {
    let ret = ISevenUpDown::betsCall::abi_decode_returns(data)
        .wrap_err("failed to decode bets(address) return data")?;
    Ok(Bet {
        option: BetOption::from_u8(ret.option)?,
        resolved: ret.resolved,
        dice_sum: ret.diceSum,
    })
}

/// `bets(player)` reads all zeros both for a player who never bet and for a pending Under
/// bet. `has_placed` (a `BetPlaced` log exists for the player) tells the two apart.
pub fn stored_bet(bet: Bet, has_placed: bool) -> Option<Bet> {
    (has_placed || !is_blank_slot(&bet)).then_some(bet)
}

pub fn is_blank_slot(bet: &Bet) -> bool {
    *bet == Bet::pending(BetOption::Under)
}

pub fn house_balance_calldata() -> Bytes {
    ISevenUpDown::getBalanceCall {}.abi_encode().into()
}

pub fn decode_house_balance(data: &[u8]) -> Result<U256> {
    ISevenUpDown::getBalanceCall::abi_decode_returns(data)
        .wrap_err("failed to decode getBalance() return data")
}

pub fn is_resolve_first_error(message: &str) -> bool {
    message.contains(RESOLVE_FIRST_SIGNAL)
}

pub fn transaction_url(explorer_url: Option<&str>, hash: &TxHash) -> Option<String> {
    let base = explorer_url?.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    Some(format!("{base}/tx/{hash:#x}"))
}
