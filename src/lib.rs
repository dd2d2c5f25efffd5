//! Bidirectional serial protocol engine for a Toshiba Estia R32 heat pump's
//! proprietary half-duplex UART link (2400 baud, 8E1).
//!
//! This crate is the frame codec, repair heuristics, command constructors,
//! status/response decoders, and tick-driven [`engine::Engine`] state
//! machine a firmware binary wires to a real UART. It owns no hardware
//! itself: every module that needs bytes in or out takes them through
//! [`sniffer::UartPort`], so the same core runs under `cargo test` on a
//! desktop and on an RP2040/RP235x target.
#![cfg_attr(not(test), no_std)]

pub mod commands;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod frame;
pub mod known_frames;
pub mod repair;
pub mod sniffer;
pub mod status;

pub use engine::{Engine, EngineStatus, SensorReading};
pub use error::{FrameCheck, SensorError};
pub use sniffer::UartPort;
