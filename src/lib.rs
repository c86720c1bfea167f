//! # Shop Bot
//!
//! A Telegram ordering bot for a small retail chain. Customers walk through a
//! step-by-step wizard (pickup or delivery, store or address, product type,
//! collection, flavor); the bot checks stock, applies referral discounts,
//! records the order and notifies the responsible operator.

pub mod bot;
pub mod catalog;
pub mod db;
pub mod dialogue;
pub mod engine;
pub mod errors;
pub mod events;
pub mod finalizer;
pub mod inventory;
pub mod localization;
pub mod menu;
pub mod notify;
pub mod order;
pub mod referral;
pub mod shop_config;
pub mod store;
