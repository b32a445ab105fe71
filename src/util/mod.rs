pub mod quat;
