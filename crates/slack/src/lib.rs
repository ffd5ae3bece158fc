//! Slack slash command handling.
//!
//! - **Signatures** (`signature`) - `v0` HMAC verification over the bytes the form parser reads
//! - **Payload** (`payload`) - form-encoded slash command body
//! - **Tokenizer** (`tokenize`) - shell-style splitting of the command text
//! - **Commands** (`commands`) - handler trait, registry, per-invocation flag parsing
//! - **Dispatch** (`dispatch`) - runs a handler and picks the response
//! - **Replies** (`blocks`) - response bodies and `MessageBuilder`
//!
//! # Architecture
//!
//! ```text
//! POST body → SignatureVerifier::tee → SlashCommand → Dispatcher → CommandHandler
//!                                                         ↓
//!                                       SlashResponse ← synthesize
//! ```

pub mod blocks;
pub mod builtin;
pub mod commands;
pub mod dispatch;
pub mod payload;
pub mod signature;
pub mod tokenize;

pub use blocks::{MessageBuilder, Reply, ResponseType};
pub use builtin::default_registry;
pub use commands::{CommandContext, CommandError, CommandHandler, CommandRegistry, FlagSet};
pub use dispatch::{synthesize, DispatchError, Dispatcher, Invocation, SlashResponse};
pub use payload::SlashCommand;
pub use signature::SignatureVerifier;
