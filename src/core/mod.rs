//! # Core Session Logic
//!
//! This module contains Parley's chat session logic.
//! It knows nothing about terminals, HTTP, or rendering.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Session (state)      │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • Viewport (follow)    │
//!                    │                         │
//!                    │  No network. No UI.     │
//!                    └───────────┬─────────────┘
//!                                │ Effect
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │ Transport  │      │ Attachment │      │    CLI     │
//!     │  (spawn /  │      │  encoding  │      │  (prints,  │
//!     │   abort)   │      │  (tokio)   │      │   reads)   │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`]: canonical `Message` and its parts
//! - [`normalize`]: legacy/canonical history → canonical messages
//! - [`attachment`]: file → embedded attachment
//! - [`tool_call`]: tool call status machine
//! - [`state`]: the `Session` struct, all session state in one place
//! - [`action`]: the `Action` enum and the `update()` reducer
//! - [`viewport`]: auto-follow scroll policy
//! - [`transcript`]: loading and saving conversation files
//! - [`config`]: settings resolution

pub mod action;
pub mod attachment;
pub mod config;
pub mod message;
pub mod normalize;
pub mod state;
pub mod tool_call;
pub mod transcript;
pub mod viewport;
