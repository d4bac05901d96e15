pub mod group;
pub mod session;
