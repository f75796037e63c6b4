pub mod pitch;
pub mod quantizer;
pub mod rational;
