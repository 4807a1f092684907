//! Entity models, one module per domain.

mod controller;
mod fabric;
mod machine;
mod pod;
mod space;
mod subnet;
mod tag;

pub use controller::Controller;
pub use fabric::Fabric;
pub use machine::{Machine, MachineOperation};
pub use pod::{Pod, PodOperation};
pub use space::Space;
pub use subnet::Subnet;
pub use tag::Tag;
