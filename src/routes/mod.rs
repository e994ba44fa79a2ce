pub mod activity;
pub mod auth;
pub mod authz;
pub mod group_roles;
pub mod health;
pub mod users;
