pub mod bsig;
pub mod compression;
pub mod convert;
pub mod detect;
pub mod signal;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;
