use crate::bet::DiceFaces;
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};

/// Owned handle to the dice-rolling timer. Stopping or dropping the handle aborts the timer.
#[derive(Debug)]
pub struct DiceAnimation {
    task: JoinHandle<()>,
}

impl DiceAnimation {
    /// Calls `on_tick` with fresh random faces every `interval` until it returns `false`
    /// or the handle goes away.
    pub fn start<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(DiceFaces) -> bool + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !on_tick(random_faces()) {
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for DiceAnimation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn random_faces() -> DiceFaces {
    DiceFaces::random(&mut rand::rng())
}
