//! Shared primitives for genomic file formats.
//!
//! Everything in indextools speaks **0-based, half-open** coordinates
//! `[start, end)`, matching the BED format and the BAI linear index.

pub mod genomic;

pub use genomic::GenomicInterval;
