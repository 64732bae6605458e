mod delete_streams;
mod erase;
mod get;
mod set;
mod status;
mod streams;

pub use delete_streams::cmd_delete_streams;
pub use erase::cmd_erase;
pub use get::cmd_get;
pub use set::cmd_set;
pub use status::cmd_status;
pub use streams::cmd_streams;
