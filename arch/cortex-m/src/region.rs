// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Description of a single ARMv7-M MPU region.
//!
//! A [`RegionDescriptor`] is a plain `Copy` value: it is built (usually in a
//! `const` table), handed to [`Mpu::configure_region`](crate::mpu::Mpu), and
//! discarded. The attribute fields are packed into, and unpacked from, the
//! `MPU_RASR` layout described in section 4.5.5 of the Cortex-M4 Devices
//! Generic User Guide:
//!
//! ```text
//!  31   28 27  24 23   19 18 17 16 15     8 7  6 5    1 0
//! +--+--+--+--+--+------+--+--+--+--------+----+------+--+
//! |  |XN|  | AP  |  |TEX|S |C |B |  SRD   |    | SIZE |EN|
//! +--+--+--+--+--+------+--+--+--+--------+----+------+--+
//! ```

use core::fmt;

use tock_registers::fields::FieldValue;
use tock_registers::LocalRegisterCopy;

use crate::mpu::{RegionAttributes, RegionBaseAddress};

/// Number of region slots implemented by the Cortex-M4 MPU.
pub const NUM_REGIONS: usize = 8;

/// Number of subregions every region of 256 bytes or more is split into.
pub const NUM_SUBREGIONS: usize = 8;

/// Region sizes supported by the `SIZE` field.
///
/// The discriminant is the raw field encoding; the region spans
/// `2^(encoding + 1)` bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RegionSize {
    Size32B = 0x04,
    Size64B = 0x05,
    Size128B = 0x06,
    Size256B = 0x07,
    Size512B = 0x08,
    Size1KB = 0x09,
    Size2KB = 0x0A,
    Size4KB = 0x0B,
    Size8KB = 0x0C,
    Size16KB = 0x0D,
    Size32KB = 0x0E,
    Size64KB = 0x0F,
    Size128KB = 0x10,
    Size256KB = 0x11,
    Size512KB = 0x12,
    Size1MB = 0x13,
    Size2MB = 0x14,
    Size4MB = 0x15,
    Size8MB = 0x16,
    Size16MB = 0x17,
    Size32MB = 0x18,
    Size64MB = 0x19,
    Size128MB = 0x1A,
    Size256MB = 0x1B,
    Size512MB = 0x1C,
    Size1GB = 0x1D,
    Size2GB = 0x1E,
    Size4GB = 0x1F,
}

const REGION_SIZES: [RegionSize; 28] = [
    RegionSize::Size32B,
    RegionSize::Size64B,
    RegionSize::Size128B,
    RegionSize::Size256B,
    RegionSize::Size512B,
    RegionSize::Size1KB,
    RegionSize::Size2KB,
    RegionSize::Size4KB,
    RegionSize::Size8KB,
    RegionSize::Size16KB,
    RegionSize::Size32KB,
    RegionSize::Size64KB,
    RegionSize::Size128KB,
    RegionSize::Size256KB,
    RegionSize::Size512KB,
    RegionSize::Size1MB,
    RegionSize::Size2MB,
    RegionSize::Size4MB,
    RegionSize::Size8MB,
    RegionSize::Size16MB,
    RegionSize::Size32MB,
    RegionSize::Size64MB,
    RegionSize::Size128MB,
    RegionSize::Size256MB,
    RegionSize::Size512MB,
    RegionSize::Size1GB,
    RegionSize::Size2GB,
    RegionSize::Size4GB,
];

impl RegionSize {
    /// Raw value of the `SIZE` field.
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    /// Decodes a `SIZE` field value. Encodings below 4 are reserved.
    pub const fn from_encoding(encoding: u8) -> Option<RegionSize> {
        let first = RegionSize::Size32B as u8;
        if encoding < first || encoding > RegionSize::Size4GB as u8 {
            None
        } else {
            Some(REGION_SIZES[(encoding - first) as usize])
        }
    }

    /// Region length in bytes. A 4 GB region does not fit in a `u32`.
    pub const fn bytes(self) -> u64 {
        1 << (self as u32 + 1)
    }

    /// Subregions exist only for regions of 256 bytes or more.
    pub const fn supports_subregions(self) -> bool {
        self as u8 >= RegionSize::Size256B as u8
    }
}

/// Data access permissions (`AP` field).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessPermission {
    //                                            Privileged  Unprivileged
    //                                            Access      Access
    NoAccess = 0b000,                          // --          --
    PrivilegedReadWrite = 0b001,               // RW          --
    PrivilegedReadWriteUnprivilegedReadOnly = 0b010, // RW    R-
    ReadWrite = 0b011,                         // RW          RW
    PrivilegedReadOnly = 0b101,                // R-          --
    ReadOnly = 0b110,                          // R-          R-
}

impl AccessPermission {
    /// Decodes an `AP` field value. `0b100` is reserved; `0b111` is an alias
    /// of `0b110`.
    pub const fn from_bits(bits: u8) -> Option<AccessPermission> {
        match bits & 0b111 {
            0b000 => Some(AccessPermission::NoAccess),
            0b001 => Some(AccessPermission::PrivilegedReadWrite),
            0b010 => Some(AccessPermission::PrivilegedReadWriteUnprivilegedReadOnly),
            0b011 => Some(AccessPermission::ReadWrite),
            0b101 => Some(AccessPermission::PrivilegedReadOnly),
            0b110 | 0b111 => Some(AccessPermission::ReadOnly),
            _ => None,
        }
    }

    pub const fn privileged_readable(self) -> bool {
        !matches!(self, AccessPermission::NoAccess)
    }

    pub const fn privileged_writable(self) -> bool {
        matches!(
            self,
            AccessPermission::PrivilegedReadWrite
                | AccessPermission::PrivilegedReadWriteUnprivilegedReadOnly
                | AccessPermission::ReadWrite
        )
    }

    pub const fn unprivileged_readable(self) -> bool {
        matches!(
            self,
            AccessPermission::PrivilegedReadWriteUnprivilegedReadOnly
                | AccessPermission::ReadWrite
                | AccessPermission::ReadOnly
        )
    }

    pub const fn unprivileged_writable(self) -> bool {
        matches!(self, AccessPermission::ReadWrite)
    }
}

/// Type extension (`TEX` field). Combined with the C and B bits it selects
/// the memory type and cache policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeExtension {
    Level0 = 0b000,
    Level1 = 0b001,
    Level2 = 0b010,
}

impl TypeExtension {
    pub const fn from_bits(bits: u8) -> Option<TypeExtension> {
        match bits {
            0b000 => Some(TypeExtension::Level0),
            0b001 => Some(TypeExtension::Level1),
            0b010 => Some(TypeExtension::Level2),
            _ => None,
        }
    }
}

/// Reasons a region or a region map is rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionError {
    /// The region number does not name an implemented slot.
    InvalidRegionNumber(u8),
    /// The base address is not a multiple of the region size.
    MisalignedBaseAddress(u8),
    /// A subregion disable mask was given for a region under 256 bytes.
    SubregionsUnsupported(u8),
    /// Two descriptors of one map target the same slot.
    DuplicateRegionNumber(u8),
    /// The map holds no descriptors.
    EmptyMap,
    /// The map holds more descriptors than the MPU has slots.
    TooManyRegions,
    /// A register read back from a slot holds a reserved encoding.
    UnsupportedAttributes(u8),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RegionError::InvalidRegionNumber(n) => write!(f, "region {}: no such slot", n),
            RegionError::MisalignedBaseAddress(n) => {
                write!(f, "region {}: base address not aligned to region size", n)
            }
            RegionError::SubregionsUnsupported(n) => {
                write!(f, "region {}: subregions need a size of at least 256 bytes", n)
            }
            RegionError::DuplicateRegionNumber(n) => {
                write!(f, "region {}: configured more than once", n)
            }
            RegionError::EmptyMap => write!(f, "map has no regions"),
            RegionError::TooManyRegions => write!(f, "map has more regions than slots"),
            RegionError::UnsupportedAttributes(n) => {
                write!(f, "region {}: reserved attribute encoding", n)
            }
        }
    }
}

/// Geometry and attributes of one MPU region.
///
/// When `enabled` is false every other field is ignored and the slot named by
/// `region_number` is cleared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub enabled: bool,
    pub region_size: RegionSize,
    /// Bit `n` set disables subregion `n`.
    pub sub_region_disable: u8,
    pub bufferable: bool,
    pub cacheable: bool,
    pub shareable: bool,
    pub type_extension: TypeExtension,
    pub access_permission: AccessPermission,
    /// Execute-never.
    pub instruction_access_disabled: bool,
    pub base_address: u32,
    pub region_number: u8,
}

impl RegionDescriptor {
    /// An enabled region with no data access, instruction fetch allowed,
    /// strongly-ordered memory type and all subregions enabled.
    pub const fn new(region_number: u8, base_address: u32, region_size: RegionSize) -> Self {
        RegionDescriptor {
            enabled: true,
            region_size,
            sub_region_disable: 0,
            bufferable: false,
            cacheable: false,
            shareable: false,
            type_extension: TypeExtension::Level0,
            access_permission: AccessPermission::NoAccess,
            instruction_access_disabled: false,
            base_address,
            region_number,
        }
    }

    /// A descriptor that tears down slot `region_number`.
    pub const fn disabled(region_number: u8) -> Self {
        RegionDescriptor {
            enabled: false,
            region_size: RegionSize::Size32B,
            sub_region_disable: 0,
            bufferable: false,
            cacheable: false,
            shareable: false,
            type_extension: TypeExtension::Level0,
            access_permission: AccessPermission::NoAccess,
            instruction_access_disabled: false,
            base_address: 0,
            region_number,
        }
    }

    pub const fn with_access(mut self, access_permission: AccessPermission) -> Self {
        self.access_permission = access_permission;
        self
    }

    pub const fn with_execute_never(mut self) -> Self {
        self.instruction_access_disabled = true;
        self
    }

    pub const fn with_subregions_disabled(mut self, mask: u8) -> Self {
        self.sub_region_disable = mask;
        self
    }

    pub const fn with_memory_type(
        mut self,
        type_extension: TypeExtension,
        cacheable: bool,
        bufferable: bool,
        shareable: bool,
    ) -> Self {
        self.type_extension = type_extension;
        self.cacheable = cacheable;
        self.bufferable = bufferable;
        self.shareable = shareable;
        self
    }

    /// Checks the geometry the hardware silently assumes.
    ///
    /// Disabled descriptors only need a valid slot number.
    pub const fn validate(&self) -> Result<(), RegionError> {
        if self.region_number as usize >= NUM_REGIONS {
            return Err(RegionError::InvalidRegionNumber(self.region_number));
        }
        if !self.enabled {
            return Ok(());
        }
        if self.sub_region_disable != 0 && !self.region_size.supports_subregions() {
            return Err(RegionError::SubregionsUnsupported(self.region_number));
        }
        if self.base_address as u64 % self.region_size.bytes() != 0 {
            return Err(RegionError::MisalignedBaseAddress(self.region_number));
        }
        Ok(())
    }

    /// First address past the region.
    pub const fn end_address(&self) -> u64 {
        self.base_address as u64 + self.region_size.bytes()
    }

    /// Whether an access to `address` is governed by this region, taking
    /// disabled subregions into account.
    pub const fn contains(&self, address: u32) -> bool {
        let address = address as u64;
        if !self.enabled || address < self.base_address as u64 || address >= self.end_address() {
            return false;
        }
        if !self.region_size.supports_subregions() {
            return true;
        }
        let subregion_size = self.region_size.bytes() / NUM_SUBREGIONS as u64;
        let subregion = (address - self.base_address as u64) / subregion_size;
        self.sub_region_disable & (1 << subregion) == 0
    }

    /// Packs the attribute fields into an `MPU_RASR` value.
    pub fn attributes(&self) -> FieldValue<u32, RegionAttributes::Register> {
        if !self.enabled {
            return RegionAttributes::ENABLE::CLEAR;
        }

        RegionAttributes::XN.val(self.instruction_access_disabled as u32)
            + RegionAttributes::AP.val(self.access_permission as u32)
            + RegionAttributes::TEX.val(self.type_extension as u32)
            + RegionAttributes::S.val(self.shareable as u32)
            + RegionAttributes::C.val(self.cacheable as u32)
            + RegionAttributes::B.val(self.bufferable as u32)
            + RegionAttributes::SRD.val(self.sub_region_disable as u32)
            + RegionAttributes::SIZE.val(self.region_size.encoding() as u32)
            + RegionAttributes::ENABLE::SET
    }

    /// Rebuilds a descriptor from the registers of slot `region_number`.
    ///
    /// A clear `ENABLE` bit yields [`RegionDescriptor::disabled`].
    pub fn from_registers(
        region_number: u8,
        base_address: LocalRegisterCopy<u32, RegionBaseAddress::Register>,
        attributes: LocalRegisterCopy<u32, RegionAttributes::Register>,
    ) -> Result<RegionDescriptor, RegionError> {
        if !attributes.is_set(RegionAttributes::ENABLE) {
            return Ok(RegionDescriptor::disabled(region_number));
        }

        let unsupported = RegionError::UnsupportedAttributes(region_number);
        let region_size = RegionSize::from_encoding(attributes.read(RegionAttributes::SIZE) as u8)
            .ok_or(unsupported)?;
        let access_permission =
            AccessPermission::from_bits(attributes.read(RegionAttributes::AP) as u8)
                .ok_or(unsupported)?;
        let type_extension = TypeExtension::from_bits(attributes.read(RegionAttributes::TEX) as u8)
            .ok_or(unsupported)?;

        Ok(RegionDescriptor {
            enabled: true,
            region_size,
            sub_region_disable: attributes.read(RegionAttributes::SRD) as u8,
            bufferable: attributes.is_set(RegionAttributes::B),
            cacheable: attributes.is_set(RegionAttributes::C),
            shareable: attributes.is_set(RegionAttributes::S),
            type_extension,
            access_permission,
            instruction_access_disabled: attributes.is_set(RegionAttributes::XN),
            base_address: base_address.read(RegionBaseAddress::ADDR) << 5,
            region_number,
        })
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "\r\n  Region {}: Unused", self.region_number);
        }

        let start = self.base_address as u64;
        let length = self.region_size.bytes();
        write!(
            f,
            "\
             \r\n  Region {}: [{:#010X}:{:#010X}], length: {} bytes; {:?}{}",
            self.region_number,
            start,
            start + length,
            length,
            self.access_permission,
            if self.instruction_access_disabled {
                ", XN"
            } else {
                ""
            },
        )?;

        if self.sub_region_disable != 0 {
            let subregion_size = length / NUM_SUBREGIONS as u64;
            for j in 0..NUM_SUBREGIONS as u64 {
                write!(
                    f,
                    "\
                     \r\n    Sub-region {}: [{:#010X}:{:#010X}], {}",
                    j,
                    start + j * subregion_size,
                    start + (j + 1) * subregion_size,
                    if (self.sub_region_disable >> j) & 1 == 0 {
                        "Enabled"
                    } else {
                        "Disabled"
                    },
                )?;
            }
        }
        Ok(())
    }
}
