pub mod command;
pub mod ledger;
pub mod rating;
pub mod reply;
pub mod track;
pub mod user;
