//! Agent core: prompts, structured output and the prediction cycle.
//!
//! The entry point is [`cycle::PredictionCycle`], which the binary runs once
//! per round.

pub mod cycle;
pub mod output;
pub mod prompt;
