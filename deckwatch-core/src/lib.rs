//! Deckwatch Core
//!
//! Core types for the Deckwatch analysis tracking client.
//!
//! This crate contains:
//! - Domain types: the tracked job (a submitted pitch deck) and its analysis
//! - DTOs: wire shapes returned by the analysis service

pub mod domain;
pub mod dto;
