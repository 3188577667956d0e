pub mod health;
pub mod intercept;
pub mod metrics;
pub mod proxy;
pub mod settings;
