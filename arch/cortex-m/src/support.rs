// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Memory barrier instructions for the Cortex-M architecture.

/// DMB instruction.
///
/// Completes all explicit memory accesses issued before the barrier before
/// any explicit access issued after it.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn dmb() {
    use core::arch::asm;
    unsafe {
        asm!("dmb 0xF", options(nostack, preserves_flags));
    }
}

/// DSB instruction.
///
/// No instruction after the barrier executes until every memory access
/// before it has completed.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn dsb() {
    use core::arch::asm;
    unsafe {
        asm!("dsb 0xF", options(nostack, preserves_flags));
    }
}

/// ISB instruction.
///
/// Flushes the pipeline so instructions after the barrier are fetched under
/// the current context, including MPU settings.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn isb() {
    use core::arch::asm;
    unsafe {
        asm!("isb 0xF", options(nostack, preserves_flags));
    }
}

// Mock implementations for tests on the host.

/// DMB instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn dmb() {
    unimplemented!()
}

/// DSB instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn dsb() {
    unimplemented!()
}

/// ISB instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn isb() {
    unimplemented!()
}
