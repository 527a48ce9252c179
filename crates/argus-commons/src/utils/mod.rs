pub mod circuit_breaker;
pub mod correlation;
pub mod duration;
pub mod logging;
pub mod settings;
