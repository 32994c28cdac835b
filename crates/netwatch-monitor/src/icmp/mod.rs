//! ICMP echo probing engine
//!
//! One [`Controller`] owns the raw socket and the list of in-flight
//! probes; each monitored host is driven through a [`Worker`], which
//! receives exactly one [`Outcome`] per probe cycle.

mod controller;
mod probe;
mod status;
mod worker;

pub use controller::{Controller, ControllerOptions, SocketFactory};
pub use probe::{Outcome, ProbeReport, Timings, WorkerId};
pub use worker::Worker;
