//! Sink workers: each consumes the frame ring independently, applies
//! geometry-adaptive scaling and format conversion for its device, and
//! pushes through its driver. Drivers themselves are external collaborators
//! behind the traits defined in the submodules.

pub mod dump;
pub mod hardware;
pub mod secondary;
pub mod virt;
