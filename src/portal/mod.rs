mod client;
pub mod feed;

pub use client::Client;
