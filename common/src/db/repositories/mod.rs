// Repository layer for database operations

pub mod page;
pub mod user;

pub use page::PageRepository;
pub use user::UserRepository;
