use failure::Fail;

// RESULT TYPE USED ALL OVER THE CODEBASE
pub type Result<T> = std::result::Result<T, failure::Error>;

/// Failure kinds the validation and mining pipeline distinguishes.
///
/// Any of these raised while checking a single input fails that input's
/// validation and causes the transaction to be skipped; they never abort
/// the pipeline. IO errors on the output file surface through the plain
/// `failure::Error` path and are fatal.
#[derive(Debug, Fail)]
pub enum MinerError {
    #[fail(display = "decode error: {}", _0)]
    Decode(String),

    #[fail(display = "encoding error: {}", _0)]
    Encoding(String),

    #[fail(display = "curve error: {}", _0)]
    Curve(String),

    #[fail(display = "script error: {}", _0)]
    Script(String),

    #[fail(display = "sighash error: {}", _0)]
    Sighash(String),

    #[fail(display = "policy error: {}", _0)]
    Policy(String),
}
