//! Paper Broker (C9): sole writer to the canonical trade log.

pub mod paper;

pub use paper::PaperBroker;
