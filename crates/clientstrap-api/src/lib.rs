mod client;

pub use client::{basic_authorization, ControlApiClient, Endpoint, FailurePolicy, Scheme, USERNAME};
