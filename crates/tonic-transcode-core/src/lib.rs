//! Protobuf descriptor types shared by the `tonic-transcode` crates.
//!
//! Standard `prost_types::MethodOptions` drops the `google.api.http` extension
//! (field 72295728) while decoding because prost doesn't retain unknown fields.
//! The [`descriptor`] module keeps it, so the route builder can read HTTP rules
//! straight out of a serialized `FileDescriptorSet`.
//!
//! The same types are used to author descriptor sets in tests. You should not
//! need to depend on this crate directly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod descriptor;
