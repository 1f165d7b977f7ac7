pub mod reports;


pub use reports::{configure_report_routes, json_config, query_config};
