pub mod client;

pub use client::LoopbackClient;
