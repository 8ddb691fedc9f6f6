//! # Typed IA-32 Control Registers
//!
//! Bitfield models of the control registers the paging code touches:
//! [`cr0::Cr0`] (paging enable), [`cr2::Cr2`] (faulting linear address) and
//! [`cr3::Cr3`] (page-directory base).
//!
//! Actual register access is only compiled with the `asm` feature on 32-bit
//! x86; everywhere else the types are plain values, which keeps them usable
//! from host-side tests.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register changes how every subsequent memory access
    /// is translated; the new value must describe a valid configuration.
    unsafe fn store_unsafe(self);
}
