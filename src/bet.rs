use color_eyre::eyre::{
    Result,
    eyre,
};
use rand::Rng;
use std::fmt;

/// The sum every option is measured against.
pub const PIVOT: u8 = 7;
pub const MIN_SUM: u8 = 2;
pub const MAX_SUM: u8 = 12;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BetOption {
    Under,
    Exact,
    Over,
}

impl BetOption {
    pub const ALL: [BetOption; 3] = [BetOption::Under, BetOption::Exact, BetOption::Over];

    /// Wire encoding used by `placeBet(uint8)` and `bets(address)`.
    pub fn as_u8(self) -> u8 {
        match self {
            BetOption::Under => 0,
            BetOption::Exact => 1,
            BetOption::Over => 2,
        }
    }

    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(BetOption::Under),
            1 => Ok(BetOption::Exact),
            2 => Ok(BetOption::Over),
            other => Err(eyre!("unknown bet option {other}")),
        }
    }

    /// Display-only multiplier; settlement happens in the contract.
    pub fn payout_multiplier(self) -> u8 {
        match self {
            BetOption::Exact => 5,
            BetOption::Under | BetOption::Over => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BetOption::Under => "Under 7",
            BetOption::Exact => "Exactly 7",
            BetOption::Over => "Over 7",
        }
    }
}

impl fmt::Display for BetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-through copy of the player's bet as stored by the contract.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Bet {
    pub option: BetOption,
    pub resolved: bool,
    /// Only meaningful once `resolved` is set.
    pub dice_sum: u8,
}

impl Bet {
    pub fn pending(option: BetOption) -> Self {
        Self {
            option,
            resolved: false,
            dice_sum: 0,
        }
    }

    pub fn resolved(option: BetOption, dice_sum: u8) -> Self {
        Self {
            option,
            resolved: true,
            dice_sum,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.resolved
    }

    /// The rolled sum, if the bet is resolved with a sum two dice can produce.
    pub fn settled_sum(&self) -> Option<u8> {
        (self.resolved && (MIN_SUM..=MAX_SUM).contains(&self.dice_sum))
            .then_some(self.dice_sum)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Win,
    Lose,
}

pub fn outcome(dice_sum: u8, option: BetOption) -> Outcome {
    let won = match option {
        BetOption::Under => dice_sum < PIVOT,
        BetOption::Exact => dice_sum == PIVOT,
        BetOption::Over => dice_sum > PIVOT,
    };
    if won { Outcome::Win } else { Outcome::Lose }
}

/// Multiplier shown for a settled bet: the option's multiplier on a win, zero otherwise.
pub fn display_payout(dice_sum: u8, option: BetOption) -> u8 {
    match outcome(dice_sum, option) {
        Outcome::Win => option.payout_multiplier(),
        Outcome::Lose => 0,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DiceFaces {
    pub first: u8,
    pub second: u8,
}

impl Default for DiceFaces {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl DiceFaces {
    pub fn new(first: u8, second: u8) -> Self {
        Self { first, second }
    }

    pub fn sum(&self) -> u8 {
        self.first + self.second
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.random_range(1..=6), rng.random_range(1..=6))
    }

    /// Cosmetic split of a stored sum into two faces. The contract keeps only the
    /// sum, so this picks one pair out of several and is not the real roll.
    pub fn from_sum(sum: u8) -> Self {
        let first = (sum / 2).clamp(1, 6);
        let second = sum.saturating_sub(first).clamp(1, 6);
        Self::new(first, second)
    }
}
