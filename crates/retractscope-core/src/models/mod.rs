pub mod organization;
pub mod record;
pub mod work;

pub use organization::OrganizationMatch;
pub use record::Record;
pub use work::{WorkMetadata, WorkStatus};
