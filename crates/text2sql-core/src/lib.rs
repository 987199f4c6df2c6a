// ABOUTME: Core types and constants for the text-to-SQL analytics server
// ABOUTME: Foundation crate with error handling, pipeline value models, and defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Text2SQL Core
//!
//! Foundation crate providing shared types and constants for the text-to-SQL
//! analytics server. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Request-scoped values flowing through the pipeline
//! - **constants**: Tunable defaults shared by configuration and tests

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Pipeline value models (languages, formats, validation and execution results)
pub mod models;

/// Default limits and budgets for the query pipeline
pub mod constants;
