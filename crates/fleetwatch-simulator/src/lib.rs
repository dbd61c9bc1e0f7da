//! Vehicle simulator for Fleetwatch.
//!
//! Generates random positions inside a configured rectangle and publishes
//! them on the coordinates topic, either one at a time or in a continuous
//! loop, driven over a small REST control surface.
//!
//! - [`generator`] -- random coordinates within bounds
//! - [`controller`] -- the [`PublishController`] and its single publish loop
//! - [`routes`] -- `POST /vehicle/{publish,start,stop}`

pub mod controller;
pub mod error;
pub mod generator;
pub mod routes;

pub use controller::PublishController;
pub use error::SimulatorError;
pub use generator::CoordinateGenerator;
pub use routes::build_router;
