//! # Kernel Memory Configuration
//!
//! This crate is the single source of truth for the physical memory layout
//! the memory manager is brought up with: which frames form the kernel pool,
//! which form the process pool, which range is a hole that must never be
//! handed out, and how much of the low address space is shared,
//! identity-mapped kernel memory.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Low memory, kernel image       │  identity mapped,
//! 0x0020_0000 ├─────────────────────────────────┤  shared by every
//!             │  Kernel frame pool (2 MiB)      │  address space
//! 0x0040_0000 ├─────────────────────────────────┤
//!             │  Process frame pool             │
//! 0x00F0_0000 │  ┌───────────────────────────┐  │
//!             │  │  Memory hole (1 MiB)      │  │
//! 0x0100_0000 │  └───────────────────────────┘  │
//!             │                                 │
//! 0x0200_0000 └─────────────────────────────────┘
//! ```
//!
//! The layout is a `const` value; [`memory::MemoryLayout::DEFAULT`] is
//! checked at compile time so a broken configuration fails the build rather
//! than the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
