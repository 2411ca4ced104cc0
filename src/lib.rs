//! Polling adapter for the Nature Remo cloud API: fetches appliances and devices,
//! keeps the latest snapshot, and reads sensor values out of it.

pub mod models {
    pub mod remo;
}

pub mod client;
pub mod config;
pub mod snapshot;
pub mod utils;
pub mod services {
    pub mod poller;
    pub mod sensors;
    pub mod setup;
}

