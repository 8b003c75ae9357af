pub mod case;
pub mod playbook;
pub mod report;

pub use case::*;
pub use playbook::*;
pub use report::*;
