//! Forward-proxy plumbing: address resolution, header filtering, and
//! streaming the capability's response back to the client.

pub mod correlation;
pub mod forward;
