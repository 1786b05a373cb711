//! perevod - selection translator daemon.
//!
//! A running instance owns a tray/popup frontend and a local control socket.
//! Short-lived CLI invocations send named actions to that socket instead of
//! spawning a second instance.

pub mod action;
pub mod app;
pub mod config;
pub mod control;
pub mod frontend;
pub mod translate;
