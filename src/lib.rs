#![doc = include_str!("../README.md")]

pub mod capability;
pub mod database;
pub mod definition;
pub mod handler;
pub mod handlers;
pub mod identifier;
pub mod instance;
pub mod inventory;
pub mod loot;
pub mod manager;
pub mod plugin;
