// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod consumer;
mod otel;

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod handler;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod worker;
