// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! MPU region maps for the GD32F4xx.
//!
//! Two maps exist. [`BOOT_MAP`] is installed by the bootloader: it opens the
//! whole address space and only fences off execution from peripherals and
//! all access to the DMA controllers. [`FIRM_MAP`] is installed by the
//! firmware image and only grants the flash, RAM and peripheral windows it
//! uses, with SYSCFG read-only.
//!
//! Both maps run with the MPU inactive in HardFault and NMI handlers and
//! with the default memory map as background for privileged code. Regions
//! overlap on purpose: where they do, the higher-numbered region wins.

use cortexm::mpu::{ControlPolicy, Mpu, MpuRegisterFile, RegionMap};
use cortexm::region::{AccessPermission, RegionDescriptor, RegionSize};
use log::error;

use crate::memory_map::{
    AHB1_PERIPH_BASE, DMA_BASE, FLASH0_BASE, PERIPH_BASE, RAM0_BASE, RAM1_BASE, SYSCFG_BASE,
};

/// Subregions 0, 1, 6 and 7 of the 4 MB window at `FLASH0_BASE` lie outside
/// flash bank 1.
const FLASH1_SUBREGIONS_DISABLED: u8 = 0b1100_0011;

const BOOT_REGIONS: [RegionDescriptor; 6] = [
    RegionDescriptor::new(0, 0x0000_0000, RegionSize::Size4GB)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(1, RAM0_BASE, RegionSize::Size128KB)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(2, RAM1_BASE, RegionSize::Size64KB)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(3, PERIPH_BASE, RegionSize::Size128MB)
        .with_access(AccessPermission::ReadWrite)
        .with_execute_never(),
    RegionDescriptor::new(4, AHB1_PERIPH_BASE, RegionSize::Size16KB)
        .with_access(AccessPermission::ReadWrite)
        .with_execute_never(),
    RegionDescriptor::new(5, DMA_BASE, RegionSize::Size8KB)
        .with_access(AccessPermission::NoAccess)
        .with_execute_never(),
];

const FIRM_REGIONS: [RegionDescriptor; 7] = [
    RegionDescriptor::new(0, RAM0_BASE, RegionSize::Size128KB)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(1, FLASH0_BASE, RegionSize::Size1MB)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(2, RAM1_BASE, RegionSize::Size64KB)
        .with_access(AccessPermission::ReadWrite),
    // Flash bank 1 is 2 MB at 0x0810_0000, which no single region can be
    // aligned to.
    RegionDescriptor::new(3, FLASH0_BASE, RegionSize::Size4MB)
        .with_subregions_disabled(FLASH1_SUBREGIONS_DISABLED)
        .with_access(AccessPermission::ReadWrite),
    RegionDescriptor::new(4, PERIPH_BASE, RegionSize::Size512MB)
        .with_access(AccessPermission::ReadWrite)
        .with_execute_never(),
    RegionDescriptor::new(5, DMA_BASE, RegionSize::Size8KB)
        .with_access(AccessPermission::NoAccess)
        .with_execute_never(),
    RegionDescriptor::new(6, SYSCFG_BASE, RegionSize::Size1KB)
        .with_access(AccessPermission::ReadOnly)
        .with_execute_never(),
];

/// Map installed by the bootloader.
pub const BOOT_MAP: RegionMap = RegionMap::new(
    "boot",
    &BOOT_REGIONS,
    ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE,
);

/// Map installed by the firmware image.
pub const FIRM_MAP: RegionMap = RegionMap::new(
    "firm",
    &FIRM_REGIONS,
    ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE,
);

const _: () = assert!(BOOT_MAP.validate().is_ok());
const _: () = assert!(FIRM_MAP.validate().is_ok());

fn setup_map<R: MpuRegisterFile>(mpu: &Mpu<R>, map: &RegionMap) {
    if let Err(error) = mpu.apply_map(map) {
        error!("{} MPU map not applied: {}", map.name(), error);
    }
}

/// Installs [`BOOT_MAP`]. Does nothing on a core without an MPU.
pub fn setup_boot_region<R: MpuRegisterFile>(mpu: &Mpu<R>) {
    setup_map(mpu, &BOOT_MAP);
}

/// Installs [`FIRM_MAP`], clearing every slot it does not use. Does nothing
/// on a core without an MPU.
pub fn setup_firm_region<R: MpuRegisterFile>(mpu: &Mpu<R>) {
    setup_map(mpu, &FIRM_MAP);
}

/// Installs [`BOOT_MAP`] on the running core.
///
/// # Safety
///
/// No other code may access the MPU or `SHCSR` while this runs.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub unsafe fn setup_boot_region_hw() {
    setup_boot_region(&Mpu::new(cortexm::mpu::CortexMRegisters::new()));
}

/// Installs [`FIRM_MAP`] on the running core.
///
/// # Safety
///
/// No other code may access the MPU or `SHCSR` while this runs.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub unsafe fn setup_firm_region_hw() {
    setup_firm_region(&Mpu::new(cortexm::mpu::CortexMRegisters::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::{FLASH1_BASE, FLASH1_END};

    #[test]
    fn region_numbers_follow_table_order() {
        for (index, region) in BOOT_REGIONS.iter().enumerate() {
            assert_eq!(region.region_number as usize, index);
        }
        for (index, region) in FIRM_REGIONS.iter().enumerate() {
            assert_eq!(region.region_number as usize, index);
        }
        assert_eq!(BOOT_MAP.owned_slots(), 0b0011_1111);
        assert_eq!(FIRM_MAP.owned_slots(), 0b0111_1111);
    }

    #[test]
    fn boot_region_attributes() {
        // AP=RW | SIZE=0x1F | ENABLE
        assert_eq!(BOOT_REGIONS[0].attributes().value, 0x0300_003F);
        // XN | AP=none | SIZE=0x0C | ENABLE
        assert_eq!(BOOT_REGIONS[5].attributes().value, 0x1000_0019);
    }

    #[test]
    fn firm_syscfg_is_read_only_and_not_executable() {
        let syscfg = FIRM_REGIONS[6];
        // XN | AP=0b110 | SIZE=0x09 | ENABLE
        assert_eq!(syscfg.attributes().value, 0x1600_0013);
        assert!(syscfg.access_permission.privileged_readable());
        assert!(syscfg.access_permission.unprivileged_readable());
        assert!(!syscfg.access_permission.privileged_writable());
    }

    #[test]
    fn flash1_window_covers_exactly_bank_one() {
        let flash1 = FIRM_REGIONS[3];
        assert!(!flash1.contains(FLASH0_BASE));
        assert!(!flash1.contains(FLASH1_BASE - 1));
        assert!(flash1.contains(FLASH1_BASE));
        assert!(flash1.contains(FLASH1_END - 1));
        assert!(!flash1.contains(FLASH1_END));
    }

    #[test]
    fn maps_run_with_default_background_for_privileged_code() {
        for map in [BOOT_MAP, FIRM_MAP] {
            assert_eq!(map.policy(), ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE);
        }
    }
}
