pub mod error;
pub mod exchange_rate;
pub mod open_meteo;
pub mod provider;
pub mod types;
pub mod world_time;
