// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARM System Control Block
//!
//! Only the part of the SCB the MPU code depends on is described here: the
//! System Handler Control and State Register, which masks or unmasks the
//! MemManage fault raised on protection violations.
//!
//! <http://infocenter.arm.com/help/index.jsp?topic=/com.arm.doc.dui0553a/CIHFDJCA.html>

use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

/// Address of the System Control Block.
pub const SCB_BASE: usize = 0xE000_ED00;

register_structs! {
    /// In an ARMv7-M processor, a System Control Block (SCB) in the SCS
    /// provides key status information and control features for the processor.
    pub ScbRegisters {
        /// CPUID through the System Handler Priority Registers.
        (0x00 => _reserved0),

        /// System Handler Control and State Register
        (0x24 => pub shcsr: ReadWrite<u32, SystemHandlerControlAndState::Register>),

        (0x28 => @END),
    }
}

register_bitfields![u32,
    pub SystemHandlerControlAndState [
        USGFAULTENA     OFFSET(18)  NUMBITS(1),
        BUSFAULTENA     OFFSET(17)  NUMBITS(1),
        /// Enables the MemManage exception. While clear, an MPU violation
        /// escalates to HardFault.
        MEMFAULTENA     OFFSET(16)  NUMBITS(1),
        SVCALLPENDED    OFFSET(15)  NUMBITS(1),
        BUSFAULTPENDED  OFFSET(14)  NUMBITS(1),
        MEMFAULTPENDED  OFFSET(13)  NUMBITS(1),
        USGFAULTPENDED  OFFSET(12)  NUMBITS(1),
        SYSTICKACT      OFFSET(11)  NUMBITS(1),
        PENDSVACT       OFFSET(10)  NUMBITS(1),
        MONITORACT      OFFSET(8)   NUMBITS(1),
        SVCALLACT       OFFSET(7)   NUMBITS(1),
        USGFAULTACT     OFFSET(3)   NUMBITS(1),
        BUSFAULTACT     OFFSET(1)   NUMBITS(1),
        MEMFAULTACT     OFFSET(0)   NUMBITS(1)
    ]
];
