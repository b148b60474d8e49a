// ABOUTME: Library crate for rancherssh exposing session negotiation and the terminal bridge
// The binary in main.rs wires these together; tests drive them directly

pub mod config;
pub mod rancher;
pub mod terminal;
