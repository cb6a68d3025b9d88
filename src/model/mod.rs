//! Tokenization model
//!
//! This module keeps the tokens of a text buffer up to date:
//! - Per-line start states, cached tokens and dirty flags
//! - A background worker re-tokenizing dirty lines under a time budget
//! - Change events for subscribed listeners

mod event;
mod lines;
mod tokenization;
mod worker;

pub use event::{LineRange, Listener, ModelTokensChangedEvent, ModelTokensChangedListener};
pub use lines::ModelLines;
pub use tokenization::TokenizationModel;
pub use worker::CancellationToken;
