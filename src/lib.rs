pub mod animation;
pub mod bet;
pub mod chain;
pub mod client;
pub mod config;
pub mod contract;
pub mod controller;
pub mod deployment;
pub mod ui;
pub mod wallet;
pub mod wallets;

pub mod test_helpers;
