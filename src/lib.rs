pub mod capture;
pub mod config;
pub mod dataset;
pub mod egress;
pub mod error;
pub mod fairness;
pub mod ingress;
pub mod interval;
pub mod logs;
pub mod pass;
pub mod series;
pub mod sync;
pub mod tcp;

#[cfg(test)]
mod test;

pub use capture::{PacketSource, PcapReader};
pub use config::{Config, Inputs};
pub use dataset::{analyze, Dataset};
pub use error::{Error, Result};
