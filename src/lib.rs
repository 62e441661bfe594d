// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Slumber Server - modular REST API server
//!
//! Resources, context middlewares and an Ed25519 session-token authority
//! composed into one request pipeline.
//!
//! ## Modules
//!
//! - `api` - Sessions, users and books resources, health checks, OpenAPI
//! - `auth` - Signing keys, token authority, authenticator, access control
//! - `pipeline` - Request context, middleware chain, router, server assembly
//! - `storage` - redb database capability, repositories, session sweeper

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
