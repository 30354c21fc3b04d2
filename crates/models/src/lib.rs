//! Burn modules for video domain adaptation.
//!
//! - `InceptionI3d`: 3D Inception backbone, truncatable at any named endpoint.
//! - `VideoEncoder`: one backbone per input stream (RGB, optical flow, or both).
//! - `ClassNet` / `DomainNet`: task classifier and domain discriminator/critic heads.
//! - `reverse_gradient`: identity forward, negated gradient backward.
//! - `RandomLayer`: fixed random multilinear projection for conditioning.
//! - `TorchStateDict`: published PyTorch I3D checkpoints, loaded into the backbone.
//!
//! The modules know nothing about training; the `training` crate composes them into
//! adaptation methods.

pub mod encoder;
pub mod error;
pub mod grl;
pub mod heads;
pub mod i3d;
pub mod random_layer;
pub mod torch_weights;

pub use encoder::{EncodedClips, VideoEncoder, VideoEncoderConfig};
pub use error::{ModelError, ModelResult};
pub use grl::reverse_gradient;
pub use heads::{ClassNet, ClassNetConfig, DomainNet, DomainNetConfig, DOMAIN_OUTPUTS};
pub use i3d::{
    compute_pad, i3d_joint, Endpoint, InceptionI3d, InceptionI3dConfig, InceptionModule,
    MaxPool3dSame, PretrainedWeights, Unit3d, Unit3dConfig,
};
pub use random_layer::RandomLayer;
pub use torch_weights::TorchStateDict;

pub mod prelude {
    pub use super::{
        reverse_gradient, ClassNet, ClassNetConfig, DomainNet, DomainNetConfig, Endpoint,
        InceptionI3d, InceptionI3dConfig, ModelError, RandomLayer, VideoEncoder,
        VideoEncoderConfig,
    };
}
