pub(crate) mod chains;
pub(crate) mod inputs;
pub(crate) mod variants;
