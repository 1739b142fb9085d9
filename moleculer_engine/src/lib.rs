//! Scenario engine for load testing Moleculer brokers.
//!
//! A scenario is an ordered `flow` of step descriptors (`log`, `think`,
//! `spawn`, `stop`). [`Engine`] compiles each scenario into a
//! [`ScenarioRunner`] that a load-test harness invokes once per virtual user.
//! Timing and error metrics leave the engine through an [`EventSink`].

pub mod engine;
pub mod error;
pub mod events;
pub mod helpers;
pub mod runtime;
pub mod script;
pub mod template;
pub mod think;

pub use engine::{Context, Engine, ScenarioFailure, ScenarioRunner};
pub use error::EngineError;
pub use events::{EngineEvent, EventSink};
