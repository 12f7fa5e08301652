mod connector;
mod driver;

pub use connector::Connector;
pub use driver::DatabaseDriver;
