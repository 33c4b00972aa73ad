// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! In-memory MPU register file.
//!
//! [`EmulatedMpu`] models the MPU the way software sees it: a `TYPE` register,
//! a `CTRL` register, and eight region slots reached through `RNR`. Register
//! contents are stored exactly as written. Every side effect (register writes
//! and barriers) is appended to a fixed-capacity trace so that the order of
//! operations can be checked off-target.

use core::cell::Cell;

use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::LocalRegisterCopy;

use crate::mpu::{
    Control, MpuRegisterFile, RegionAttributes, RegionBaseAddress, RegionNumber, Type,
};
use crate::region::NUM_REGIONS;
use crate::scb::SystemHandlerControlAndState;

/// Number of side effects kept in the trace. Later ones are counted but not
/// recorded.
pub const TRACE_CAPACITY: usize = 128;

/// One observable side effect on the register file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    WriteControl(u32),
    SelectRegion(u32),
    WriteBaseAddress(u32),
    WriteAttributes(u32),
    MemoryFaultEnable(bool),
    DataMemoryBarrier,
    DataSynchronizationBarrier,
    InstructionSynchronizationBarrier,
}

impl Access {
    /// Whether this access changed a register, as opposed to a barrier.
    pub const fn is_write(&self) -> bool {
        !matches!(
            self,
            Access::DataMemoryBarrier
                | Access::DataSynchronizationBarrier
                | Access::InstructionSynchronizationBarrier
        )
    }
}

pub struct EmulatedMpu {
    mpu_type: InMemoryRegister<u32, Type::Register>,
    ctrl: InMemoryRegister<u32, Control::Register>,
    rnr: InMemoryRegister<u32, RegionNumber::Register>,
    rbar: [InMemoryRegister<u32, RegionBaseAddress::Register>; NUM_REGIONS],
    rasr: [InMemoryRegister<u32, RegionAttributes::Register>; NUM_REGIONS],
    shcsr: InMemoryRegister<u32, SystemHandlerControlAndState::Register>,
    trace: [Cell<Option<Access>>; TRACE_CAPACITY],
    trace_len: Cell<usize>,
    writes: Cell<usize>,
}

impl EmulatedMpu {
    /// A Cortex-M4 MPU with eight unified regions, disabled, all slots zero.
    pub fn new() -> Self {
        Self::with_regions(NUM_REGIONS as u32)
    }

    /// A core without an MPU: `TYPE` reads as zero.
    pub fn absent() -> Self {
        Self::with_regions(0)
    }

    /// An MPU reporting `regions` data regions in `TYPE.DREGION`.
    pub fn with_regions(regions: u32) -> Self {
        EmulatedMpu {
            mpu_type: InMemoryRegister::new(Type::DREGION.val(regions).value),
            ctrl: InMemoryRegister::new(0),
            rnr: InMemoryRegister::new(0),
            rbar: core::array::from_fn(|_| InMemoryRegister::new(0)),
            rasr: core::array::from_fn(|_| InMemoryRegister::new(0)),
            shcsr: InMemoryRegister::new(0),
            trace: core::array::from_fn(|_| Cell::new(None)),
            trace_len: Cell::new(0),
            writes: Cell::new(0),
        }
    }

    /// Fills a slot directly, without going through `RNR` and without
    /// recording anything.
    pub fn preload_region(&self, region_number: u8, base_address: u32, attributes: u32) {
        let slot = region_number as usize;
        self.rbar[slot].set(base_address);
        self.rasr[slot].set(attributes);
    }

    /// Raw `(RBAR, RASR)` contents of a slot.
    pub fn region_registers(&self, region_number: u8) -> (u32, u32) {
        let slot = region_number as usize;
        (self.rbar[slot].get(), self.rasr[slot].get())
    }

    pub fn control_value(&self) -> u32 {
        self.ctrl.get()
    }

    /// Number of register writes since creation or the last `clear_trace`.
    pub fn register_writes(&self) -> usize {
        self.writes.get()
    }

    pub fn trace(&self) -> impl Iterator<Item = Access> + '_ {
        self.trace[..self.trace_len.get()]
            .iter()
            .filter_map(|entry| entry.get())
    }

    pub fn clear_trace(&self) {
        for entry in self.trace.iter() {
            entry.set(None);
        }
        self.trace_len.set(0);
        self.writes.set(0);
    }

    fn record(&self, access: Access) {
        if access.is_write() {
            self.writes.set(self.writes.get() + 1);
        }
        let len = self.trace_len.get();
        if let Some(entry) = self.trace.get(len) {
            entry.set(Some(access));
            self.trace_len.set(len + 1);
        }
    }

    fn selected_slot(&self) -> Option<usize> {
        let slot = self.rnr.read(RegionNumber::REGION) as usize;
        if slot < NUM_REGIONS {
            Some(slot)
        } else {
            None
        }
    }
}

impl Default for EmulatedMpu {
    fn default() -> Self {
        Self::new()
    }
}

impl MpuRegisterFile for EmulatedMpu {
    fn mpu_type(&self) -> LocalRegisterCopy<u32, Type::Register> {
        self.mpu_type.extract()
    }

    fn control(&self) -> LocalRegisterCopy<u32, Control::Register> {
        self.ctrl.extract()
    }

    fn write_control(&self, control: FieldValue<u32, Control::Register>) {
        self.record(Access::WriteControl(control.value));
        self.ctrl.write(control);
    }

    fn select_region(&self, region_number: u32) {
        self.record(Access::SelectRegion(region_number));
        self.rnr.write(RegionNumber::REGION.val(region_number));
    }

    fn base_address(&self) -> LocalRegisterCopy<u32, RegionBaseAddress::Register> {
        let value = self.selected_slot().map_or(0, |slot| self.rbar[slot].get());
        LocalRegisterCopy::new(value)
    }

    fn set_base_address(&self, base_address: u32) {
        self.record(Access::WriteBaseAddress(base_address));
        if let Some(slot) = self.selected_slot() {
            self.rbar[slot].set(base_address);
        }
    }

    fn attributes(&self) -> LocalRegisterCopy<u32, RegionAttributes::Register> {
        let value = self.selected_slot().map_or(0, |slot| self.rasr[slot].get());
        LocalRegisterCopy::new(value)
    }

    fn write_attributes(&self, attributes: FieldValue<u32, RegionAttributes::Register>) {
        self.record(Access::WriteAttributes(attributes.value));
        if let Some(slot) = self.selected_slot() {
            self.rasr[slot].write(attributes);
        }
    }

    fn set_memory_fault_enabled(&self, enabled: bool) {
        self.record(Access::MemoryFaultEnable(enabled));
        if enabled {
            self.shcsr
                .modify(SystemHandlerControlAndState::MEMFAULTENA::SET);
        } else {
            self.shcsr
                .modify(SystemHandlerControlAndState::MEMFAULTENA::CLEAR);
        }
    }

    fn memory_fault_enabled(&self) -> bool {
        self.shcsr.is_set(SystemHandlerControlAndState::MEMFAULTENA)
    }

    fn data_memory_barrier(&self) {
        self.record(Access::DataMemoryBarrier);
    }

    fn data_synchronization_barrier(&self) {
        self.record(Access::DataSynchronizationBarrier);
    }

    fn instruction_synchronization_barrier(&self) {
        self.record(Access::InstructionSynchronizationBarrier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_registers_follow_selection() {
        let mpu = EmulatedMpu::new();

        mpu.select_region(3);
        mpu.set_base_address(0x2000_0000);
        mpu.write_attributes(RegionAttributes::ENABLE::SET + RegionAttributes::SIZE.val(0x10));

        assert_eq!(mpu.region_registers(3), (0x2000_0000, 0x21));
        assert_eq!(mpu.region_registers(2), (0, 0));

        mpu.select_region(2);
        assert_eq!(mpu.base_address().get(), 0);
        mpu.select_region(3);
        assert_eq!(mpu.attributes().get(), 0x21);
    }

    #[test]
    fn writes_to_unimplemented_slot_are_dropped() {
        let mpu = EmulatedMpu::new();

        mpu.select_region(9);
        mpu.set_base_address(0x2000_0000);

        for slot in 0..NUM_REGIONS as u8 {
            assert_eq!(mpu.region_registers(slot), (0, 0));
        }
        assert_eq!(mpu.register_writes(), 2);
    }

    #[test]
    fn trace_stops_at_capacity_but_keeps_counting() {
        let mpu = EmulatedMpu::new();

        for _ in 0..TRACE_CAPACITY + 10 {
            mpu.select_region(0);
        }
        mpu.data_memory_barrier();

        assert_eq!(mpu.trace().count(), TRACE_CAPACITY);
        assert_eq!(mpu.register_writes(), TRACE_CAPACITY + 10);

        mpu.clear_trace();
        assert_eq!(mpu.trace().count(), 0);
        assert_eq!(mpu.register_writes(), 0);
    }

    #[test]
    fn type_register_reports_region_count() {
        assert_eq!(EmulatedMpu::new().mpu_type().read(Type::DREGION), 8);
        assert_eq!(EmulatedMpu::absent().mpu_type().get(), 0);
        assert_eq!(EmulatedMpu::with_regions(16).mpu_type().get(), 16 << 8);
    }
}
