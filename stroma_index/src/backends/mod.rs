// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial backend implementations.

pub mod flatvec;
pub mod rtree;
