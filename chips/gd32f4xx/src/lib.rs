// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Memory protection setup for the GD32F4xx MCU family.
//!
//! GD32F450: <https://www.gigadevice.com/product/mcu/arm-cortex-m4/gd32f450>

#![crate_name = "gd32f4xx"]
#![crate_type = "rlib"]
#![no_std]

pub mod memory_map;
pub mod mpu;
