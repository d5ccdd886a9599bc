//! Login code generation.

use rand::Rng;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Source of login codes for new students.
pub trait CodeSupplier: Send + Sync {
    fn next_code(&self) -> String;
}

/// Six-digit codes drawn uniformly from the thread RNG.
///
/// Uniqueness is not guaranteed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSupplier;

impl CodeSupplier for RandomCodeSupplier {
    fn next_code(&self) -> String {
        rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
    }
}
