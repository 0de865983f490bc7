// Library exports for cactus-testkit
pub mod binary_paths;
pub mod capture;
pub mod cigar;
pub mod config;
pub mod constraints;
pub mod datasets;
pub mod error;
pub mod experiment;
pub mod fasta;
pub mod harness;
pub mod sampler;
pub mod sequence;
pub mod tree;
pub mod workflow;
