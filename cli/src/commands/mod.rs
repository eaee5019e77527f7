pub mod health;
pub mod info;
pub mod params;
pub mod pool;
pub mod quote;
pub mod secrets;
pub mod stats;
pub mod status;
pub mod swap;
pub mod verify;
pub mod watch;
