pub mod cover;
pub mod flanking;
pub mod fsm;
pub mod movement;
pub mod reactions;
pub mod searching;
