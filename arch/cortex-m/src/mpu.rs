// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Implementation of the memory protection unit for the Cortex-M3, Cortex-M4
//! and Cortex-M7.
//!
//! [`Mpu`] programs the unit through an [`MpuRegisterFile`]. On hardware that
//! is [`CortexMRegisters`]; off-target it is
//! [`EmulatedMpu`](crate::emulated::EmulatedMpu). Whole memory maps are
//! described as `const` [`RegionMap`] tables and installed with
//! [`Mpu::apply_map`], which always brackets the region writes between a
//! disable and an enable of the unit.

use core::fmt;

use log::{debug, info};
use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

use crate::config::CONFIG;
use crate::region::{RegionDescriptor, RegionError, NUM_REGIONS};
use crate::scb::{ScbRegisters, SystemHandlerControlAndState, SCB_BASE};
use crate::support;

/// Address of the MPU register block.
pub const MPU_BASE: usize = 0xE000_ED90;

register_structs! {
    /// MPU Registers for the Cortex-M3, Cortex-M4 and Cortex-M7 families
    /// Described in section 4.5 of
    /// <http://infocenter.arm.com/help/topic/com.arm.doc.dui0553a/DUI0553A_cortex_m4_dgug.pdf>
    pub MpuRegisters {
        /// Indicates whether the MPU is present and, if so, how many regions it
        /// supports.
        (0x00 => pub mpu_type: ReadOnly<u32, Type::Register>),

        /// The control register:
        ///   * Enables the MPU (bit 0).
        ///   * Enables MPU in hard-fault, non-maskable interrupt (NMI).
        ///   * Enables the default memory map background region in privileged mode.
        (0x04 => pub ctrl: ReadWrite<u32, Control::Register>),

        /// Selects the region number (zero-indexed) referenced by the region base
        /// address and region attribute and size registers.
        (0x08 => pub rnr: ReadWrite<u32, RegionNumber::Register>),

        /// Defines the base address of the currently selected MPU region.
        (0x0c => pub rbar: ReadWrite<u32, RegionBaseAddress::Register>),

        /// Defines the region size and memory attributes of the selected MPU
        /// region. The bits are defined as in 4.5.5 of the Cortex-M4 user guide.
        (0x10 => pub rasr: ReadWrite<u32, RegionAttributes::Register>),

        (0x14 => @END),
    }
}

register_bitfields![u32,
    pub Type [
        /// The number of MPU instructions regions supported. Always reads 0.
        IREGION OFFSET(16) NUMBITS(8) [],
        /// The number of data regions supported. If this field reads-as-zero the
        /// processor does not implement an MPU
        DREGION OFFSET(8) NUMBITS(8) [],
        /// Indicates whether the processor support unified (0) or separate
        /// (1) instruction and data regions. Always reads 0 on the
        /// Cortex-M4.
        SEPARATE OFFSET(0) NUMBITS(1) []
    ],

    pub Control [
        /// Enables privileged software access to the default
        /// memory map
        PRIVDEFENA OFFSET(2) NUMBITS(1) [],
        /// Enables the operation of MPU during hard fault, NMI,
        /// and FAULTMASK handlers
        HFNMIENA OFFSET(1) NUMBITS(1) [],
        /// Enables the MPU
        ENABLE OFFSET(0) NUMBITS(1) []
    ],

    pub RegionNumber [
        /// Region indicating the MPU region referenced by the MPU_RBAR and
        /// MPU_RASR registers. Range 0-7 corresponding to the MPU regions.
        REGION OFFSET(0) NUMBITS(8) []
    ],

    pub RegionBaseAddress [
        /// Base address of the currently selected MPU region.
        ADDR OFFSET(5) NUMBITS(27) [],
        /// MPU Region Number valid bit.
        VALID OFFSET(4) NUMBITS(1) [
            /// Use the base address specified in Region Number Register (RNR)
            UseRNR = 0,
            /// Use the value of the REGION field in this register (RBAR)
            UseRBAR = 1
        ],
        /// Specifies which MPU region to set if VALID is set to 1.
        REGION OFFSET(0) NUMBITS(4) []
    ],

    pub RegionAttributes [
        /// Instruction access disable (execute never)
        XN OFFSET(28) NUMBITS(1) [],
        /// Defines access permissions
        AP OFFSET(24) NUMBITS(3) [
            //                                 Privileged  Unprivileged
            //                                 Access      Access
            NoAccess = 0b000,               // --          --
            PrivilegedOnly = 0b001,         // RW          --
            UnprivilegedReadOnly = 0b010,   // RW          R-
            ReadWrite = 0b011,              // RW          RW
            Reserved = 0b100,               // undef       undef
            PrivilegedOnlyReadOnly = 0b101, // R-          --
            ReadOnly = 0b110,               // R-          R-
            ReadOnlyAlias = 0b111           // R-          R-
        ],
        /// Type extension field
        TEX OFFSET(19) NUMBITS(3) [],
        /// Shareable
        S OFFSET(18) NUMBITS(1) [],
        /// Cacheable
        C OFFSET(17) NUMBITS(1) [],
        /// Bufferable
        B OFFSET(16) NUMBITS(1) [],
        /// Subregion disable bits
        SRD OFFSET(8) NUMBITS(8) [],
        /// Specifies the region size, being 2^(SIZE+1) (minimum 3)
        SIZE OFFSET(1) NUMBITS(5) [],
        /// Enables the region
        ENABLE OFFSET(0) NUMBITS(1) []
    ]
];

/// Policy bits written to `MPU_CTRL` together with `ENABLE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlPolicy {
    /// Keep the MPU active while HardFault, NMI and FAULTMASK handlers run
    /// (`HFNMIENA`).
    pub hfnmi_enabled: bool,
    /// Let privileged code use the default memory map wherever no region
    /// matches (`PRIVDEFENA`).
    pub privileged_default_map: bool,
}

impl ControlPolicy {
    pub const HFNMI_DISABLE_PRIVDEF_DISABLE: ControlPolicy = ControlPolicy {
        hfnmi_enabled: false,
        privileged_default_map: false,
    };
    pub const HFNMI_ENABLE_PRIVDEF_DISABLE: ControlPolicy = ControlPolicy {
        hfnmi_enabled: true,
        privileged_default_map: false,
    };
    pub const HFNMI_DISABLE_PRIVDEF_ENABLE: ControlPolicy = ControlPolicy {
        hfnmi_enabled: false,
        privileged_default_map: true,
    };
    pub const HFNMI_ENABLE_PRIVDEF_ENABLE: ControlPolicy = ControlPolicy {
        hfnmi_enabled: true,
        privileged_default_map: true,
    };

    /// The complete `MPU_CTRL` value that enables the unit under this policy.
    pub fn enabled_control(self) -> FieldValue<u32, Control::Register> {
        let mut control = Control::ENABLE::SET;
        if self.hfnmi_enabled {
            control += Control::HFNMIENA::SET;
        }
        if self.privileged_default_map {
            control += Control::PRIVDEFENA::SET;
        }
        control
    }
}

/// A named set of regions installed as one unit.
#[derive(Copy, Clone, Debug)]
pub struct RegionMap {
    name: &'static str,
    regions: &'static [RegionDescriptor],
    policy: ControlPolicy,
}

impl RegionMap {
    pub const fn new(
        name: &'static str,
        regions: &'static [RegionDescriptor],
        policy: ControlPolicy,
    ) -> Self {
        RegionMap {
            name,
            regions,
            policy,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn regions(&self) -> &'static [RegionDescriptor] {
        self.regions
    }

    pub const fn policy(&self) -> ControlPolicy {
        self.policy
    }

    /// Bitmask of the slots this map writes.
    pub const fn owned_slots(&self) -> u8 {
        let mut owned = 0u8;
        let mut i = 0;
        while i < self.regions.len() {
            let number = self.regions[i].region_number;
            if (number as usize) < NUM_REGIONS {
                owned |= 1 << number;
            }
            i += 1;
        }
        owned
    }

    /// Checks every descriptor and that no two of them share a slot.
    ///
    /// `const` so that built-in maps can be checked at compile time.
    pub const fn validate(&self) -> Result<(), RegionError> {
        if self.regions.is_empty() {
            return Err(RegionError::EmptyMap);
        }
        if self.regions.len() > NUM_REGIONS {
            return Err(RegionError::TooManyRegions);
        }

        let mut seen = 0u8;
        let mut i = 0;
        while i < self.regions.len() {
            let region = &self.regions[i];
            if let Err(error) = region.validate() {
                return Err(error);
            }
            let slot = 1u8 << region.region_number;
            if seen & slot != 0 {
                return Err(RegionError::DuplicateRegionNumber(region.region_number));
            }
            seen |= slot;
            i += 1;
        }
        Ok(())
    }

    /// The region whose attributes apply to `address`: the highest-numbered
    /// enabled region that covers it.
    pub fn effective_region(&self, address: u32) -> Option<&'static RegionDescriptor> {
        self.regions
            .iter()
            .filter(|region| region.contains(address))
            .max_by_key(|region| region.region_number)
    }
}

impl fmt::Display for RegionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\r\n Cortex-M MPU map \"{}\"", self.name)?;
        for region in self.regions {
            write!(f, "{}", region)?;
        }
        write!(
            f,
            "\r\n  HFNMIENA: {}, PRIVDEFENA: {}\r\n",
            self.policy.hfnmi_enabled, self.policy.privileged_default_map
        )
    }
}

/// Access to the registers an [`Mpu`] drives.
///
/// Region registers are reached through the select-then-write indirection of
/// the hardware: `select_region` sets `MPU_RNR`, after which the base address
/// and attribute accessors refer to that slot.
pub trait MpuRegisterFile {
    fn mpu_type(&self) -> LocalRegisterCopy<u32, Type::Register>;

    fn control(&self) -> LocalRegisterCopy<u32, Control::Register>;
    fn write_control(&self, control: FieldValue<u32, Control::Register>);

    fn select_region(&self, region_number: u32);
    fn base_address(&self) -> LocalRegisterCopy<u32, RegionBaseAddress::Register>;
    fn set_base_address(&self, base_address: u32);
    fn attributes(&self) -> LocalRegisterCopy<u32, RegionAttributes::Register>;
    fn write_attributes(&self, attributes: FieldValue<u32, RegionAttributes::Register>);

    /// Masks or unmasks the MemManage exception (`SHCSR.MEMFAULTENA`).
    fn set_memory_fault_enabled(&self, enabled: bool);
    fn memory_fault_enabled(&self) -> bool;

    fn data_memory_barrier(&self);
    fn data_synchronization_barrier(&self);
    fn instruction_synchronization_barrier(&self);
}

impl<R: MpuRegisterFile + ?Sized> MpuRegisterFile for &R {
    fn mpu_type(&self) -> LocalRegisterCopy<u32, Type::Register> {
        (**self).mpu_type()
    }

    fn control(&self) -> LocalRegisterCopy<u32, Control::Register> {
        (**self).control()
    }

    fn write_control(&self, control: FieldValue<u32, Control::Register>) {
        (**self).write_control(control)
    }

    fn select_region(&self, region_number: u32) {
        (**self).select_region(region_number)
    }

    fn base_address(&self) -> LocalRegisterCopy<u32, RegionBaseAddress::Register> {
        (**self).base_address()
    }

    fn set_base_address(&self, base_address: u32) {
        (**self).set_base_address(base_address)
    }

    fn attributes(&self) -> LocalRegisterCopy<u32, RegionAttributes::Register> {
        (**self).attributes()
    }

    fn write_attributes(&self, attributes: FieldValue<u32, RegionAttributes::Register>) {
        (**self).write_attributes(attributes)
    }

    fn set_memory_fault_enabled(&self, enabled: bool) {
        (**self).set_memory_fault_enabled(enabled)
    }

    fn memory_fault_enabled(&self) -> bool {
        (**self).memory_fault_enabled()
    }

    fn data_memory_barrier(&self) {
        (**self).data_memory_barrier()
    }

    fn data_synchronization_barrier(&self) {
        (**self).data_synchronization_barrier()
    }

    fn instruction_synchronization_barrier(&self) {
        (**self).instruction_synchronization_barrier()
    }
}

/// The memory-mapped MPU and SCB of the running core.
///
/// There should only be one instantiation of this object as it represents
/// real hardware.
pub struct CortexMRegisters {
    mpu: &'static MpuRegisters,
    scb: &'static ScbRegisters,
}

impl CortexMRegisters {
    /// # Safety
    ///
    /// Must only be called on a Cortex-M core, and the returned handle must
    /// be the only code touching the MPU and `SHCSR` while it is in use.
    pub unsafe fn new() -> Self {
        CortexMRegisters {
            mpu: &*(MPU_BASE as *const MpuRegisters),
            scb: &*(SCB_BASE as *const ScbRegisters),
        }
    }
}

impl MpuRegisterFile for CortexMRegisters {
    fn mpu_type(&self) -> LocalRegisterCopy<u32, Type::Register> {
        self.mpu.mpu_type.extract()
    }

    fn control(&self) -> LocalRegisterCopy<u32, Control::Register> {
        self.mpu.ctrl.extract()
    }

    fn write_control(&self, control: FieldValue<u32, Control::Register>) {
        self.mpu.ctrl.write(control);
    }

    fn select_region(&self, region_number: u32) {
        self.mpu.rnr.write(RegionNumber::REGION.val(region_number));
    }

    fn base_address(&self) -> LocalRegisterCopy<u32, RegionBaseAddress::Register> {
        self.mpu.rbar.extract()
    }

    fn set_base_address(&self, base_address: u32) {
        self.mpu.rbar.set(base_address);
    }

    fn attributes(&self) -> LocalRegisterCopy<u32, RegionAttributes::Register> {
        self.mpu.rasr.extract()
    }

    fn write_attributes(&self, attributes: FieldValue<u32, RegionAttributes::Register>) {
        self.mpu.rasr.write(attributes);
    }

    fn set_memory_fault_enabled(&self, enabled: bool) {
        if enabled {
            self.scb
                .shcsr
                .modify(SystemHandlerControlAndState::MEMFAULTENA::SET);
        } else {
            self.scb
                .shcsr
                .modify(SystemHandlerControlAndState::MEMFAULTENA::CLEAR);
        }
    }

    fn memory_fault_enabled(&self) -> bool {
        self.scb
            .shcsr
            .is_set(SystemHandlerControlAndState::MEMFAULTENA)
    }

    fn data_memory_barrier(&self) {
        support::dmb();
    }

    fn data_synchronization_barrier(&self) {
        support::dsb();
    }

    fn instruction_synchronization_barrier(&self) {
        support::isb();
    }
}

/// Programs MPU regions and switches the unit on and off.
///
/// None of the single-register operations validate their input: an unaligned
/// base address or an out-of-range slot number is written as given. Use
/// [`Mpu::apply_map`] to get validation.
pub struct Mpu<R: MpuRegisterFile> {
    registers: R,
}

impl<R: MpuRegisterFile> Mpu<R> {
    pub const fn new(registers: R) -> Self {
        Mpu { registers }
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    /// Whether this core implements an MPU at all.
    pub fn probe_unit(&self) -> bool {
        self.registers.mpu_type().read(Type::DREGION) != 0
    }

    pub fn number_total_regions(&self) -> usize {
        self.registers.mpu_type().read(Type::DREGION) as usize
    }

    pub fn is_enabled(&self) -> bool {
        self.registers.control().is_set(Control::ENABLE)
    }

    /// Turns protection on under `policy` and unmasks MemManage faults.
    ///
    /// Nothing after this call executes under the previous protection state.
    pub fn enable_unit(&self, policy: ControlPolicy) {
        self.registers.write_control(policy.enabled_control());
        self.registers.set_memory_fault_enabled(true);

        self.registers.data_synchronization_barrier();
        self.registers.instruction_synchronization_barrier();
    }

    /// Turns protection off, masks MemManage faults and zeroes `MPU_CTRL`.
    ///
    /// Outstanding transfers complete under the old settings before the
    /// control register changes.
    pub fn disable_unit(&self) {
        self.registers.data_memory_barrier();
        self.registers.set_memory_fault_enabled(false);
        self.registers.write_control(Control::ENABLE::CLEAR);
    }

    /// Writes `region` into the slot it names, overwriting whatever was there.
    ///
    /// A disabled descriptor zeroes both the base address and the attribute
    /// register of the slot.
    pub fn configure_region(&self, region: &RegionDescriptor) {
        self.registers.select_region(region.region_number as u32);

        if region.enabled {
            self.registers.set_base_address(region.base_address);
            self.registers.write_attributes(region.attributes());
        } else {
            self.registers.set_base_address(0);
            self.registers.write_attributes(RegionAttributes::ENABLE::CLEAR);
        }
    }

    /// Reads back slot `region_number`.
    pub fn read_region(&self, region_number: u8) -> Result<RegionDescriptor, RegionError> {
        self.registers.select_region(region_number as u32);
        RegionDescriptor::from_registers(
            region_number,
            self.registers.base_address(),
            self.registers.attributes(),
        )
    }

    /// Reads back every slot.
    pub fn snapshot(&self) -> Result<[RegionDescriptor; NUM_REGIONS], RegionError> {
        let mut regions = [RegionDescriptor::disabled(0); NUM_REGIONS];
        for number in 0..NUM_REGIONS {
            regions[number] = self.read_region(number as u8)?;
        }
        Ok(regions)
    }

    /// Installs `map`: disable, program every region of the map, clear every
    /// slot the map does not own, enable with the map's policy.
    ///
    /// Returns `Ok(())` without touching any register when the core has no
    /// MPU. The map is validated before the first write, so an invalid map
    /// leaves the unit exactly as it was.
    pub fn apply_map(&self, map: &RegionMap) -> Result<(), RegionError> {
        if !self.probe_unit() {
            info!("no MPU present, {} map not applied", map.name());
            return Ok(());
        }

        map.validate()?;
        let slots = self.number_total_regions().min(NUM_REGIONS);
        if let Some(region) = map
            .regions()
            .iter()
            .find(|region| region.region_number as usize >= slots)
        {
            return Err(RegionError::InvalidRegionNumber(region.region_number));
        }

        debug!(
            "applying {} MPU map: {} regions, {} slots",
            map.name(),
            map.regions().len(),
            slots
        );

        self.disable_unit();

        for region in map.regions() {
            if CONFIG.trace_regions {
                debug!("{}", region);
            }
            self.configure_region(region);
        }

        let owned = map.owned_slots();
        for number in 0..slots {
            if owned & (1 << number) == 0 {
                self.configure_region(&RegionDescriptor::disabled(number as u8));
            }
        }

        self.enable_unit(map.policy());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::emulated::{Access, EmulatedMpu};
    use crate::region::{AccessPermission, RegionSize};

    const PERMISSIVE: [RegionDescriptor; 2] = [
        RegionDescriptor::new(0, 0x0000_0000, RegionSize::Size4GB)
            .with_access(AccessPermission::ReadWrite),
        RegionDescriptor::new(1, 0x4000_0000, RegionSize::Size512MB)
            .with_access(AccessPermission::ReadWrite)
            .with_execute_never(),
    ];

    const DUPLICATED: [RegionDescriptor; 2] = [
        RegionDescriptor::new(2, 0x2000_0000, RegionSize::Size64KB),
        RegionDescriptor::new(2, 0x2001_0000, RegionSize::Size64KB),
    ];

    const MISALIGNED: [RegionDescriptor; 1] =
        [RegionDescriptor::new(0, 0x0810_0000, RegionSize::Size2MB)];

    const PERMISSIVE_MAP: RegionMap = RegionMap::new(
        "permissive",
        &PERMISSIVE,
        ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE,
    );

    fn writes(mpu: &EmulatedMpu) -> Vec<Access> {
        mpu.trace().filter(|access| access.is_write()).collect()
    }

    #[test]
    fn probe_reports_missing_unit() {
        assert!(Mpu::new(EmulatedMpu::new()).probe_unit());
        assert!(!Mpu::new(EmulatedMpu::absent()).probe_unit());
        assert_eq!(Mpu::new(EmulatedMpu::new()).number_total_regions(), 8);
    }

    #[test]
    fn disabled_region_zeroes_slot() {
        let emulated = EmulatedMpu::new();
        emulated.preload_region(4, 0xDEAD_BEE0, 0xFFFF_FFFF);
        let mpu = Mpu::new(&emulated);

        mpu.configure_region(&RegionDescriptor::disabled(4));

        assert_eq!(emulated.region_registers(4), (0, 0));
    }

    #[test]
    fn enabled_region_writes_base_verbatim_and_packed_attributes() {
        let emulated = EmulatedMpu::new();
        let mpu = Mpu::new(&emulated);
        let region = PERMISSIVE[1];

        mpu.configure_region(&region);

        assert_eq!(
            emulated.region_registers(1),
            (0x4000_0000, region.attributes().value)
        );
        assert_eq!(
            writes(&emulated),
            [
                Access::SelectRegion(1),
                Access::WriteBaseAddress(0x4000_0000),
                Access::WriteAttributes(region.attributes().value),
            ]
        );
        assert_eq!(mpu.read_region(1), Ok(region));
    }

    #[test]
    fn configuring_a_slot_replaces_previous_contents() {
        let emulated = EmulatedMpu::new();
        let mpu = Mpu::new(&emulated);

        mpu.configure_region(&PERMISSIVE[1]);
        let replacement = RegionDescriptor::new(1, 0x2000_0000, RegionSize::Size128KB)
            .with_access(AccessPermission::PrivilegedReadWrite);
        mpu.configure_region(&replacement);

        assert_eq!(mpu.read_region(1), Ok(replacement));
    }

    #[test]
    fn enable_sets_only_requested_bits() {
        let policies = [
            (ControlPolicy::HFNMI_DISABLE_PRIVDEF_DISABLE, 0b001),
            (ControlPolicy::HFNMI_ENABLE_PRIVDEF_DISABLE, 0b011),
            (ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE, 0b101),
            (ControlPolicy::HFNMI_ENABLE_PRIVDEF_ENABLE, 0b111),
        ];

        for (policy, expected) in policies {
            let emulated = EmulatedMpu::new();
            let mpu = Mpu::new(&emulated);
            mpu.enable_unit(policy);

            assert_eq!(emulated.control_value(), expected);
            assert!(mpu.is_enabled());
            assert!(emulated.memory_fault_enabled());
        }
    }

    #[test]
    fn enable_synchronizes_after_control_write() {
        let emulated = EmulatedMpu::new();
        Mpu::new(&emulated).enable_unit(ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE);

        let trace: Vec<Access> = emulated.trace().collect();
        assert_eq!(
            trace,
            [
                Access::WriteControl(0b101),
                Access::MemoryFaultEnable(true),
                Access::DataSynchronizationBarrier,
                Access::InstructionSynchronizationBarrier,
            ]
        );
    }

    #[test]
    fn disable_drains_before_clearing_control() {
        let emulated = EmulatedMpu::new();
        let mpu = Mpu::new(&emulated);
        mpu.enable_unit(ControlPolicy::HFNMI_ENABLE_PRIVDEF_ENABLE);
        emulated.clear_trace();

        mpu.disable_unit();

        let trace: Vec<Access> = emulated.trace().collect();
        assert_eq!(
            trace,
            [
                Access::DataMemoryBarrier,
                Access::MemoryFaultEnable(false),
                Access::WriteControl(0),
            ]
        );
        assert_eq!(emulated.control_value(), 0);
        assert!(!emulated.memory_fault_enabled());
        assert!(!mpu.is_enabled());
    }

    #[test]
    fn apply_map_brackets_region_writes() {
        let emulated = EmulatedMpu::new();
        let mpu = Mpu::new(&emulated);

        assert_eq!(mpu.apply_map(&PERMISSIVE_MAP), Ok(()));

        let trace: Vec<Access> = emulated.trace().collect();
        let disable = trace
            .iter()
            .position(|access| *access == Access::WriteControl(0))
            .unwrap();
        let enable = trace
            .iter()
            .position(|access| *access == Access::WriteControl(0b101))
            .unwrap();
        let first_region = trace
            .iter()
            .position(|access| matches!(access, Access::SelectRegion(_)))
            .unwrap();
        let last_region = trace
            .iter()
            .rposition(|access| matches!(access, Access::WriteAttributes(_)))
            .unwrap();
        assert!(disable < first_region);
        assert!(last_region < enable);

        let snapshot = mpu.snapshot().unwrap();
        assert_eq!(snapshot[0], PERMISSIVE[0]);
        assert_eq!(snapshot[1], PERMISSIVE[1]);
        for number in 2..NUM_REGIONS {
            assert_eq!(snapshot[number], RegionDescriptor::disabled(number as u8));
        }
    }

    #[test]
    fn apply_map_clears_slots_it_does_not_own() {
        let emulated = EmulatedMpu::new();
        for number in 0..NUM_REGIONS as u8 {
            emulated.preload_region(number, 0x2000_0000, 0x0300_0021);
        }

        Mpu::new(&emulated).apply_map(&PERMISSIVE_MAP).unwrap();

        for number in 2..NUM_REGIONS as u8 {
            assert_eq!(emulated.region_registers(number), (0, 0));
        }
    }

    #[test]
    fn absent_unit_is_left_untouched() {
        let emulated = EmulatedMpu::absent();

        assert_eq!(Mpu::new(&emulated).apply_map(&PERMISSIVE_MAP), Ok(()));

        assert_eq!(emulated.register_writes(), 0);
        assert!(writes(&emulated).is_empty());
    }

    #[test]
    fn invalid_map_is_rejected_before_any_write() {
        let emulated = EmulatedMpu::new();
        let mpu = Mpu::new(&emulated);
        mpu.enable_unit(ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE);
        emulated.clear_trace();

        let duplicated = RegionMap::new(
            "duplicated",
            &DUPLICATED,
            ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE,
        );
        assert_eq!(
            mpu.apply_map(&duplicated),
            Err(RegionError::DuplicateRegionNumber(2))
        );

        let misaligned = RegionMap::new(
            "misaligned",
            &MISALIGNED,
            ControlPolicy::HFNMI_DISABLE_PRIVDEF_ENABLE,
        );
        assert_eq!(
            mpu.apply_map(&misaligned),
            Err(RegionError::MisalignedBaseAddress(0))
        );

        assert_eq!(emulated.register_writes(), 0);
        assert!(mpu.is_enabled());
    }

    #[test]
    fn map_rejects_slots_beyond_implemented_regions() {
        let emulated = EmulatedMpu::with_regions(1);
        let mpu = Mpu::new(&emulated);

        assert_eq!(
            mpu.apply_map(&PERMISSIVE_MAP),
            Err(RegionError::InvalidRegionNumber(1))
        );
        assert_eq!(emulated.register_writes(), 0);
    }

    #[test]
    fn empty_map_is_invalid() {
        let empty = RegionMap::new("empty", &[], ControlPolicy::HFNMI_DISABLE_PRIVDEF_DISABLE);
        assert_eq!(empty.validate(), Err(RegionError::EmptyMap));
    }

    #[test]
    fn effective_region_prefers_higher_number() {
        assert_eq!(PERMISSIVE_MAP.effective_region(0x2000_0000), Some(&PERMISSIVE[0]));
        assert_eq!(PERMISSIVE_MAP.effective_region(0x4001_0000), Some(&PERMISSIVE[1]));
        assert_eq!(PERMISSIVE_MAP.owned_slots(), 0b11);
    }
}
