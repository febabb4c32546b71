// lib.rs
pub mod alignment;
pub mod annotation;
pub mod bam;
pub mod config;
pub mod error;
pub mod gtf;
pub mod pipeline;
pub mod region;
pub mod render;
pub mod track;
