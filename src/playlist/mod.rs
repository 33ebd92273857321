pub mod manager;
pub mod model;
pub mod refresh_info;
pub mod window;
