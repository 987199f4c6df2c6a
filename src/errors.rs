// ABOUTME: Re-export of the unified error types from the core crate
// ABOUTME: Keeps crate::errors paths stable for every server module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Unified error handling.
//!
//! The types live in `text2sql-core` so that conversions for `sqlx`,
//! `reqwest` and `redis` errors can be feature-gated next to the type
//! definition. This module re-exports them under the familiar path.

pub use text2sql_core::errors::{
    AppError, AppResult, ErrorCode, ErrorContext, ErrorResponse, ErrorResponseDetails,
};
