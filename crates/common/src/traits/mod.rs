pub(crate) mod chain;
pub(crate) mod execution;
pub(crate) mod pool;
pub(crate) mod state;
pub(crate) mod stream;
