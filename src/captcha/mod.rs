//! CAPTCHA pipeline: fetch an image, hand it to an external solver, verify
//! the answer, return a fresh token. The solver's internals (the ML model)
//! are out of scope, only the [`ImageSolver`] trait boundary is specified.

mod hosted_solver;
mod pipeline;
mod types;

pub use hosted_solver::TwoCaptchaImageSolver;
pub use pipeline::{CaptchaPipeline, SolvedCaptcha};
pub use types::{CaptchaError, CaptchaImage, ImageSolver};
