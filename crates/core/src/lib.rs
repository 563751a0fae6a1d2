//! GoMarket Core - Shared domain types.
//!
//! This crate provides the types a shopping cart is made of:
//! - [`ProductId`] - Non-empty product identifier
//! - [`Price`] - Non-negative unit price
//! - [`Quantity`] - Line quantity that can never be zero
//! - [`LineItem`] / [`NewLineItem`] - A product entry with and without its quantity
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no persistence, no async
//! runtime. Cart state management lives in `go-market-cart`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
