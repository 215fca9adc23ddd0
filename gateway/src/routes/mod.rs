pub mod api;
pub mod uniproxy;
