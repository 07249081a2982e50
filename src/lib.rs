// Library for tests to access modules

pub mod blacklist;
pub mod check;
pub mod clock;
pub mod config;
pub mod diskstats_repo;
pub mod engine;
pub mod history;
pub mod models;
pub mod routes;
pub mod sink;
pub mod worker;
