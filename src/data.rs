pub mod columns;
pub mod commodity;
pub mod dst;
pub(crate) mod frame;
pub mod lags;
pub mod market;
pub mod merge;
pub mod parse;
