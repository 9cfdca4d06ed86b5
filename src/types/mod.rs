pub(crate) mod request;
pub(crate) mod response;
mod user;

pub(crate) use user::{AuthenticatedSubject, User, Username};
