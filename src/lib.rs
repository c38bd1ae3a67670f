// Library for tests to access modules

pub mod aggregator;
pub mod channel;
pub mod config;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod probe;
pub mod sink;
pub mod stress;
pub mod version;
