// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Compile-time configuration options for the MPU code.
//!
//! Options live in a typed `const` object rather than being scattered across
//! `#[cfg]` attributes, so every code path is type-checked regardless of which
//! Cargo features are enabled and disabled paths fold away after constant
//! propagation.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether every region written by a map apply is logged at debug level.
    ///
    /// Useful when bringing up a new memory map: each descriptor is printed in
    /// the same format as `RegionMap`'s `Display` output right before it is
    /// written to the hardware slot.
    pub(crate) trace_regions: bool,
}

/// The single instance of `Config`. This is the only place in the crate where
/// Cargo features are allowed to influence code.
pub(crate) const CONFIG: Config = Config {
    trace_regions: cfg!(feature = "trace_mpu_regions"),
};
