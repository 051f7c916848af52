//! Foundrygen Core Library
//!
//! Clients for a hosted generative-media platform: image generation, image
//! editing with masks and reference images, and asynchronous video generation
//! driven through a submit / poll / fetch job protocol.
//!
//! Every operation is written once as an `async fn` over the
//! [`core::transport::Transport`] trait. The blocking clients in
//! [`core::generative::blocking`] drive the same futures on a private
//! current-thread runtime.

pub mod core;

pub use crate::core::credentials::{Credential, CredentialResolver, TokenProvider};
pub use crate::core::generative::{
    BlockingImageClient, BlockingVideoClient, ImageClient, MediaOutput, VideoClient,
};
pub use crate::core::settings::{ClientSettings, ServiceEndpoint};
pub use crate::core::transport::{ReqwestTransport, Transport};
pub use crate::core::{CoreError, CoreResult};
