pub mod audio;
pub mod device;
pub mod player;
