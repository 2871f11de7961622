/* Modules */
pub mod car;
pub mod config;
pub mod floor;
pub mod protocol;
pub mod shared;
pub mod shm;
