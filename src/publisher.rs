// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Position publication.

use serde::Serialize;

/// Wire format for an estimated tag position, published as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn to_json_bytes(self) -> Vec<u8> {
        // Infallible: `Position` has no types that can fail to serialize.
        serde_json::to_vec(&self).expect("Position always serializes")
    }
}
