pub mod body;
pub mod clock;
pub mod constants;
pub mod history;
pub mod input_buffer;
pub mod locomotion;
pub mod rig;
