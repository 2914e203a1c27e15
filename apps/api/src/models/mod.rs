// Shared API models.
// Every endpoint answers with the same envelope, success or not.

pub mod response;
