//! Discord Integration - gateway bot interface
//!
//! This crate wires the pin policy from `pinbot-core` to Discord:
//! - **Gateway** (`gateway`) - event loop over a gateway transport with reconnection logic
//! - **Events** (`events`) - reaction added/removed and ready handlers
//! - **Platform** (`platform`) - channel/thread and message abstractions
//! - **Executor** (`executor`) - turns a policy decision into pin/unpin/notify calls
//! - **Notifications** (`notifications`) - unpin notice builders
//! - **Serenity adapter** (`serenity_adapter`) - live Discord implementation
//!
//! # Architecture
//!
//! ```text
//! Discord Gateway → GatewayRunner → EventDispatcher → PinPolicyService
//!                                                        ↓
//!                              evaluate (core) → execute → PlatformClient
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - gateway event loop with reconnection logic
//! - `EventDispatcher` - routes events to registered handlers
//! - `PlatformClient` / `MessageContainer` / `MessageHandle` - platform seams
//! - `PolicyExecutor` - applies decisions against a resolved message

pub mod events;
pub mod executor;
pub mod gateway;
pub mod notifications;
pub mod platform;
pub mod serenity_adapter;

#[cfg(test)]
pub(crate) mod fakes;
