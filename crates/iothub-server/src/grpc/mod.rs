mod service;

pub use service::HubServiceImpl;
