pub mod error;
pub mod functions;
pub mod status;
pub mod traits;
pub mod types;

pub use error::*;
pub use functions::*;
pub use status::*;
pub use traits::*;
pub use types::*;
