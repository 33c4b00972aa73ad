// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Address windows of the GD32F4xx memory map protected by the MPU.

/// Flash bank 0 (1 MB).
pub const FLASH0_BASE: u32 = 0x0800_0000;
/// Flash bank 1 (2 MB), directly after bank 0.
pub const FLASH1_BASE: u32 = 0x0810_0000;
pub const FLASH1_END: u32 = 0x0830_0000;

/// First 128 KB of on-chip SRAM.
pub const RAM0_BASE: u32 = 0x2000_0000;
/// The 64 KB SRAM block that follows RAM0.
pub const RAM1_BASE: u32 = 0x2002_0000;

pub const PERIPH_BASE: u32 = 0x4000_0000;
pub const SYSCFG_BASE: u32 = 0x4001_3800;
pub const AHB1_PERIPH_BASE: u32 = 0x4002_0000;
/// DMA0 at 0x4002_6000, DMA1 at 0x4002_6400.
pub const DMA_BASE: u32 = 0x4002_6000;
