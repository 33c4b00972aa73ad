// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic support for the ARMv7-M memory protection unit.
//!
//! The crate is split the same way the hardware is:
//!
//! - [`region`] holds the value types describing one protection region and
//!   their packing into the `MPU_RASR` register layout.
//! - [`mpu`] holds the register definitions and the [`mpu::Mpu`] programmer
//!   that installs regions and turns protection on and off.
//! - [`emulated`] is an in-memory register file with the same interface as
//!   the real hardware, used to exercise region maps off-target.

#![crate_name = "cortexm"]
#![crate_type = "rlib"]
#![no_std]

mod config;

pub mod emulated;
pub mod mpu;
pub mod region;
pub mod scb;
pub mod support;
