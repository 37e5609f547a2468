//! HTTP and WebSocket handlers, grouped by the role that calls them.

pub mod admin;
pub mod customer;
pub mod merchant;
pub mod orders;
pub mod rider;
pub mod websocket;
