//! Clip loading, source/target pairing and Burn-compatible batching for video
//! domain adaptation.
//!
//! This crate provides utilities for:
//! - Loading RGB and optical-flow clips from frame folders described by a manifest
//! - Train/val/test splits per domain with seeded shuffling
//! - Natural or class-balanced sampling of paired source/target batches
//! - Collating clips into `[N, C, T, H, W]` tensors
//! - Synthetic shifted domains for smoke runs
//! - Image-stack masking, rescaling and landmark registration

pub mod batch;
pub mod image_transform;
pub mod multi_domain;
pub mod source;
pub mod synthetic;
pub mod types;

pub use batch::{collate, load_pair, DomainBatch, ModalBatch};
pub use image_transform::{mask_img_stack, reg_img_stack, rescale_img_stack, ImageStack};
pub use multi_domain::{
    DomainSplits, MultiDomainDatasets, PairedIndices, SizeType, SplitKind, WeightType,
};
pub use source::{ClipDataset, FrameFolderClips, InMemoryClips};
pub use synthetic::SyntheticDomain;
pub use types::*;
