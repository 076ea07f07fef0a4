// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure layer: concrete adapters binding domain ports to real
//! I/O (filesystem chunkers, DEFLATE/AES-GCM, HTTP sink, state stores), plus
//! the ambient concerns -- configuration, logging, and the worker/pipeline
//! runtime -- that sit outside the domain.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod runtime;
pub mod security_gate;
