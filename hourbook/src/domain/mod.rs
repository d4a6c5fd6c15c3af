mod hour;
mod metric;
mod record;
mod scope;

pub use hour::*;
pub use metric::*;
pub use record::*;
pub use scope::*;
