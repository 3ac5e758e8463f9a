//! Protobuf types and gRPC service stubs for the store protocol.
//!
//! This crate provides the generated wire types and client/server traits for
//! `store.v1.StoreService`: the three RPCs the harness drives against a
//! cluster under test (`Login`, `Query`, and `Mutate`).
//!
//! Kept separate from the client crate so that anything needing only the
//! wire format (e.g., a mock server) can avoid pulling in session logic.

#![deny(unsafe_code)]
// gRPC services return tonic::Status - standard practice for gRPC error handling
#![allow(clippy::result_large_err)]

/// Generated protobuf types and service traits.
pub mod proto {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    // Use pre-generated code when proto files aren't available
    #[cfg(use_pregenerated_proto)]
    include!("generated/store.v1.rs");

    // Use build-time generated code in development
    #[cfg(not(use_pregenerated_proto))]
    tonic::include_proto!("store.v1");
}
