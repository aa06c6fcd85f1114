mod registry;

pub use registry::{BackendDescriptor, BackendKind, BackendRegistry};
