//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the vendor
//! protocols. They are defined here (in `app`) so that both the router and
//! the adapter crates can depend on them without creating circular
//! dependencies.

pub mod capabilities;
pub mod connector;

pub use capabilities::{
    Capability, DeviceClient, Dimmable, IrControllable, PurifierControllable, Switchable,
    VacuumControllable,
};
pub use connector::DeviceConnector;
