pub mod activity;
pub mod auth;
pub mod authz;
pub mod group_role;
pub mod user;
