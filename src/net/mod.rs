pub mod authority;
pub mod observer;
pub mod owner;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod transport;
