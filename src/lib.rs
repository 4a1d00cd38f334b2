//! actionctl - run admin actions and follow their live logs
//!
//! The [`controller::ActionController`] triggers a server-side action through
//! the [`invoker`], follows its log over a WebSocket [`streams`] connection
//! keyed by a one-time correlation token, drives a [`presentation`] adapter
//! while it runs and reports the outcome once through result callbacks.

pub mod action;
pub mod config;
pub mod controller;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod presentation;
pub mod streams;
