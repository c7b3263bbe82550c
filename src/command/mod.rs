//! Voice command parsing and dispatch
//!
//! A final transcript becomes a [`ParsedCommand`] either through a
//! generative-AI live session ([`parser::CommandParser`]) or through local
//! pattern matching ([`parser::parse_fallback`]), then
//! [`dispatcher::dispatch`] maps the command onto REST calls and produces
//! the spoken confirmation.

pub mod dispatcher;
pub mod parser;
pub mod types;

pub use dispatcher::{dispatch, Backend, Dispatched, OFFLINE_MESSAGE, UNKNOWN_MESSAGE};
pub use parser::{parse_fallback, CommandParser, TokenProvider};
pub use types::{
    CommandAction, ParsedCommand, SaleItem, SalePayload, SocialPostPayload, StockPayload,
    UnknownPayload,
};
