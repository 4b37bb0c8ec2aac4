pub mod cron;
pub mod user;
