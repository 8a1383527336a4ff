mod catalog;
mod database;
mod deploy;
mod lifecycle;
mod status;

pub use catalog::{run_images, run_versions};
pub use database::{run_add_user, run_create_db, run_drop_db, run_list_dbs, run_remove_user};
pub use deploy::run_deploy;
pub use lifecycle::{run_decommission, run_start, run_stop};
pub use status::{run_connection_info, run_list, run_status};
