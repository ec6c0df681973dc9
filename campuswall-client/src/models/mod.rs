pub mod user;

pub use user::UserProfile;
