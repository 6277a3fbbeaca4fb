pub(crate) mod embedding;
mod resolver;

pub use resolver::{IdentityResolver, ResolverConfig, ResolverStats, VisitorKey};
