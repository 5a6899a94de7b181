pub mod net;
pub mod player;
pub mod world;
