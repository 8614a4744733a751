pub(crate) mod answers;
pub(crate) mod auth;
pub(crate) mod documents;
pub(crate) mod errors;
pub(crate) mod evaluations;
pub(crate) mod exams;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod student;
pub(crate) mod users;
pub(crate) mod validation;
