pub mod echo;
pub mod registry;
pub mod router;
pub mod traits;

pub use registry::ProviderRegistry;
pub use router::Router;
pub use traits::{ModelSpec, Provider};
