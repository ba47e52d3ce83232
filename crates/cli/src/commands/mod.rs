mod cache;
mod capture;
mod drain;
mod force_sync;
mod import_zones;
mod queue;
mod status;
mod worker;

pub(crate) use cache::{cmd_cache_activate, cmd_cache_install, cmd_cache_list, cmd_cache_show};
pub(crate) use capture::cmd_capture;
pub(crate) use drain::cmd_drain;
pub(crate) use force_sync::cmd_force_sync;
pub(crate) use import_zones::cmd_import_zones;
pub(crate) use queue::cmd_queue_list;
pub(crate) use status::cmd_status;
pub(crate) use worker::cmd_worker;
