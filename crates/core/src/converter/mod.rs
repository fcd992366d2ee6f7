//! Converter kinds and their capability descriptors.
//!
//! The video, audio, document and PDF-protection screens all run the same
//! submit-then-poll lifecycle. A [`ConverterKind`] selects the endpoint
//! paths, field names, default validation rules and retry policy for one of
//! them; [`ConversionParams`] carries the user's choices for a batch.
//!
//! # Example
//!
//! ```ignore
//! use transmute_core::converter::{ConverterKind, ConversionParams};
//!
//! let kind = ConverterKind::Audio;
//! let params = ConversionParams::default().with_target_format("mp3");
//! params.check_required(kind.required_params())?;
//!
//! println!("submitting to {}", kind.endpoint().submit_path);
//! ```

mod capabilities;
mod error;
mod types;

pub use capabilities::{ConverterCapabilities, EndpointDescriptor};
pub use error::ParamsError;
pub use types::{ConversionParams, ConverterKind, ParamKey};
