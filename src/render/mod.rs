pub mod enhance;
pub mod fit;
pub mod pipeline;
pub mod plugins;
