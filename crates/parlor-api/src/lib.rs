pub mod channel;
pub mod contacts;
pub mod error;
pub mod friends;
pub mod groups;
pub mod middleware;
pub mod profile;
pub mod stargate;
pub mod state;
