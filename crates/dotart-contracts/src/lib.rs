pub mod attempts;
pub mod backends;
pub mod events;
pub mod runs;
