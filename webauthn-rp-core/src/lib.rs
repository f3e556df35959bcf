//! # webauthn-rp-core
//!
//! Core WebAuthn Level 2 relying-party verification primitives: COSE key
//! handling, authenticator data and client data parsing, the pluggable
//! attestation statement formats, the FIDO Metadata Service processor,
//! and the registration/assertion ceremony verifiers.
//!
//! This crate is synchronous and has no knowledge of how a caller stores
//! pending challenges, credential records, or a metadata registry - it
//! takes those as plain arguments and returns plain results. Persistence,
//! HTTP plumbing, and background refresh tasks belong to a thin wrapper
//! crate built on top of this one.
//!
//! ## Registration
//!
//! [`ceremony::verify_registration_response`] runs the full ordered check
//! list for a `navigator.credentials.create()` response: client data,
//! authenticator data flags, algorithm allow-list, attestation statement
//! dispatch, and trust classification against a [`metadata::registry::MetadataRegistry`].
//!
//! ## Assertion
//!
//! [`ceremony::verify_assertion_response`] runs the equivalent check list
//! for a `navigator.credentials.get()` response and classifies the
//! received signature counter.

#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

pub mod attestation;
pub mod ceremony;
pub mod crypto;
pub mod error;
mod internals;
pub mod metadata;
pub mod proto;

pub use ceremony::{verify_assertion_response, verify_registration_response};
pub use ceremony::{AttestationResult, SignatureCounterResult, TrustType};
pub use error::{WebauthnError, WebauthnResult};
