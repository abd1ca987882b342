mod oms_world;
mod setups;
mod steps;

pub use oms_world::OmsWorld;
