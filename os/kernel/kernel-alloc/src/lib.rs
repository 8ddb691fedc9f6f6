//! # Physical Frame Allocation
//!
//! This crate manages physical memory in units of 4 KiB frames. It is the
//! allocation substrate for everything else in the memory manager: page
//! directories, page tables and the frames backing process memory all come
//! from here.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              FramePoolRegistry                      │
//! │    • Owns every live pool, newest first             │
//! │    • Resolves the owner of a bare frame number      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ 1..=MAX_FRAME_POOLS
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 FramePool                           │
//! │    • Fixed range of frames                          │
//! │    • Contiguous runs, first fit                     │
//! │    • 2-bit-per-frame bitmap in physical memory      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                PhysMapper                           │
//! │    • Physical address → usable reference            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_alloc::frame_pool::BitmapPlacement;
//! use kernel_alloc::registry::FramePoolRegistry;
//! use kernel_alloc::testing::TestPhys;
//! use kernel_memory_addresses::FrameNumber;
//!
//! let phys = TestPhys::with_frames(64);
//! let mut frames = FramePoolRegistry::new();
//! let pool = frames.create(&phys, FrameNumber::new(0), 64, BitmapPlacement::InPool);
//!
//! let run = frames.get_frames(pool, 4).unwrap();
//! assert_eq!(frames.pool(pool).free_frames(), 59);
//!
//! // Released by frame number alone.
//! frames.release_frames(run);
//! assert_eq!(frames.pool(pool).free_frames(), 63);
//! ```
//!
//! The example uses the `test-support` memory; a kernel passes
//! [`IdentityPhysMapper`](phys_mapper::IdentityPhysMapper) instead.
//!
//! ## Concurrency
//!
//! There is no internal locking. Pools and the registry are plain values
//! accessed through `&mut`; a kernel serialises access the same way it
//! serialises the rest of its memory manager (interrupts off on one CPU).

#![cfg_attr(not(any(test, doctest)), no_std)]

#[cfg(any(test, feature = "test-support"))]
extern crate alloc;

pub mod frame_pool;
pub mod frame_state;
pub mod phys_mapper;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
