pub(crate) mod documents;
pub(crate) mod evaluations;
pub(crate) mod exams;
pub(crate) mod expected_answers;
pub(crate) mod questions;
pub(crate) mod student_answers;
pub(crate) mod users;
