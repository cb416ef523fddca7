//! # IO Module
//!
//! Interface layer exposing the registry over HTTP.

pub mod rest;
