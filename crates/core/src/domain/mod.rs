pub mod account;
pub mod block;
pub mod dispute;
pub mod evidence;
pub mod rental;
pub mod vehicle;
