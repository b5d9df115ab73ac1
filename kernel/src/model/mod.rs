pub mod booking;
pub mod id;
pub mod pricing;
pub mod role;
pub mod slot;
