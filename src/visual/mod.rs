pub mod demo;
pub mod event;
pub mod mapper;
pub mod queue;
