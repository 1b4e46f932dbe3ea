//! Block storage on SD cards over SPI.
//!
//! [`SdCard`] brings an SDHC/SDXC card up in SPI mode and exposes byte-addressed
//! reads and writes on top of the card's 512-byte blocks. The bus, chip select
//! and delay are taken as `embedded-hal` traits.

#![cfg_attr(not(test), no_std)]

pub mod sdcard;

pub use sdcard::{
    InitError,
    SdCard,
    SdCardError,
    SdCardOptions,
};
