pub mod fsm;

#[cfg(test)]
mod fsm_tests;

pub use fsm::*;
