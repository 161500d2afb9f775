pub mod compile;
pub mod errors;
pub mod guess;
pub mod hybrid;
pub mod model;
pub mod params;
pub mod plan;
pub mod summary;
pub mod util;

pub use compile::*;
pub use errors::*;
pub use guess::*;
pub use model::*;
pub use params::*;
pub use plan::*;
pub use summary::*;
