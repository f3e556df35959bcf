//! Wire and binary data model: COSE keys, client-data JSON, authenticator
//! data, attestation objects, ceremony options, and stored credential
//! records. [MODULE C1] / [MODULE C2].

pub mod attestation_object;
pub mod auth_data;
pub mod client_data;
pub mod cose;
pub mod credential;
pub mod options;
